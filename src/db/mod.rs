use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;

use crate::config::Config;

pub const MIGRATIONS_DIR: &str = "./migrations";
const CONNECT_ATTEMPTS: u32 = 3;

/// Connects with up to three attempts, backing off 2s then 4s.
pub async fn create_pool(config: &Config) -> anyhow::Result<PgPool> {
    let url = config.require_database_url()?;
    let options = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .min_connections(config.db_min_connections)
        .acquire_timeout(config.db_acquire_timeout);

    let mut attempt = 0;
    loop {
        attempt += 1;
        match options.clone().connect(url).await {
            Ok(pool) => {
                tracing::info!(attempt, "Database connection established");
                return Ok(pool);
            }
            Err(e) if attempt < CONNECT_ATTEMPTS => {
                let backoff = Duration::from_secs(2u64.pow(attempt));
                tracing::warn!(
                    "Connection attempt {} failed: {}. Retrying in {:?}",
                    attempt,
                    e,
                    backoff
                );
                sleep(backoff).await;
            }
            Err(e) => {
                tracing::error!("Failed to establish connection after {} attempts", attempt);
                return Err(e.into());
            }
        }
    }
}

pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    let migrator = Migrator::new(Path::new(MIGRATIONS_DIR)).await?;
    migrator.run(pool).await?;
    tracing::info!("Database migrations completed");
    Ok(())
}
