use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::config::{validate_database_url, Config};

pub struct ValidationReport {
    pub environment: bool,
    pub webhook_secret: bool,
    pub database: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// A missing webhook secret is only a warning: the server still starts
    /// and rejects every webhook.
    pub fn is_valid(&self) -> bool {
        self.environment && self.database
    }

    pub fn print(&self) {
        println!("\n=== Startup Validation Report ===");
        println!("Environment Variables: {}", status(self.environment));
        println!("Webhook Secret:        {}", status(self.webhook_secret));
        println!("Database Connectivity: {}", status(self.database));

        if !self.warnings.is_empty() {
            println!("\nWarnings:");
            for warning in &self.warnings {
                println!("  ⚠️  {}", warning);
            }
        }

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  ❌ {}", error);
            }
        }

        println!(
            "\nOverall Status: {}",
            if self.is_valid() { "✅ PASS" } else { "❌ FAIL" }
        );
        println!("=================================\n");
    }
}

fn status(ok: bool) -> &'static str {
    if ok {
        "✅ OK"
    } else {
        "❌ FAIL"
    }
}

/// `pool` is `None` when serving from memory; the database check is then skipped.
pub async fn validate_environment(config: &Config, pool: Option<&PgPool>) -> ValidationReport {
    let mut report = ValidationReport {
        environment: true,
        webhook_secret: true,
        database: true,
        errors: Vec::new(),
        warnings: Vec::new(),
    };

    if let Err(e) = validate_env_vars(config, pool.is_some()) {
        report.environment = false;
        report.errors.push(format!("Environment: {}", e));
    }

    if config.hmac_secret_key.is_none() {
        report.webhook_secret = false;
        report
            .warnings
            .push("HMAC_SECRET_KEY is not set; all webhooks will be rejected".to_string());
    }

    if config.monitoring_api_key.is_none() {
        report
            .warnings
            .push("MONITORING_API_KEY is not set; /metrics is closed".to_string());
    }

    if let Some(pool) = pool {
        if let Err(e) = validate_database(pool).await {
            report.database = false;
            report.errors.push(format!("Database: {:#}", e));
        }
    }

    report
}

fn validate_env_vars(config: &Config, needs_database: bool) -> Result<()> {
    if needs_database {
        let url = config.require_database_url()?;
        validate_database_url(url)?;
    }
    config.validate()
}

async fn validate_database(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .context("Failed to connect to database")?;

    // Check if migrations are up to date
    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .context("Failed to check migrations table")?;

    if applied == 0 {
        anyhow::bail!("No migrations applied");
    }

    Ok(())
}
