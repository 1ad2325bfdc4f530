use clap::{Parser, Subcommand};
use std::sync::Arc;

use crate::adapters::PostgresTransactionStore;
use crate::config::{mask_password, Config};
use crate::services::RetrievalService;

#[derive(Parser)]
#[command(name = "autopay-core")]
#[command(about = "AutoPay Core - Signed Payment Webhook Ingestion", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve {
        /// Keep transactions in process memory instead of Postgres
        #[arg(long)]
        in_memory: bool,
    },

    /// Transaction inspection commands
    #[command(subcommand)]
    Tx(TxCommands),

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Configuration validation
    Config,

    /// Check environment and database readiness
    Check,
}

#[derive(Subcommand)]
pub enum TxCommands {
    /// Print a stored transaction as JSON
    Show {
        #[arg(value_name = "TX_ID")]
        tx_id: String,
    },
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

pub async fn handle_tx_show(config: &Config, tx_id: &str) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(config).await?;
    let store = Arc::new(PostgresTransactionStore::new(pool));
    let service = RetrievalService::new(store, config.store_policy());

    match service.get_by_id(tx_id).await {
        Ok(tx) => {
            println!("{}", serde_json::to_string_pretty(&tx)?);
            Ok(())
        }
        Err(e) => {
            tracing::warn!("Lookup of transaction {} failed: {}", tx_id, e);
            anyhow::bail!("{}", e.sanitized().message)
        }
    }
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(config).await?;

    tracing::info!("Running database migrations...");
    crate::db::run_migrations(&pool).await?;

    println!("✓ Database migrations completed");

    Ok(())
}

pub fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!(
        "  Database URL: {}",
        config
            .database_url
            .as_deref()
            .map(mask_password)
            .unwrap_or_else(|| "<not set>".to_string())
    );
    println!(
        "  HMAC Secret: {}",
        if config.hmac_secret_key.is_some() {
            "set"
        } else {
            "NOT SET (webhooks will be rejected)"
        }
    );
    println!("  Max Webhook Age: {}s", config.max_webhook_age_seconds);
    println!("  Webhook Rate Limit: {}", config.webhook_rate_limit);
    println!("  API Rate Limit: {}", config.api_rate_limit);
    println!(
        "  Monitoring Key: {}",
        if config.monitoring_api_key.is_some() {
            "set"
        } else {
            "not set (/metrics disabled)"
        }
    );

    config.validate()?;

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");

    Ok(())
}
