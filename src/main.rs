use autopay_core::adapters::{MemoryTransactionStore, PostgresTransactionStore};
use autopay_core::cli::{self, Cli, Commands, DbCommands, TxCommands};
use autopay_core::config::{Config, LogFormat};
use autopay_core::ports::TransactionStore;
use autopay_core::{create_app, db, startup, AppState};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt}; // for .with() on registry

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    let cli = Cli::parse();
    match cli.command {
        None => serve(config, false).await,
        Some(Commands::Serve { in_memory }) => serve(config, in_memory).await,
        Some(Commands::Tx(TxCommands::Show { tx_id })) => cli::handle_tx_show(&config, &tx_id).await,
        Some(Commands::Db(DbCommands::Migrate)) => cli::handle_db_migrate(&config).await,
        Some(Commands::Config) => cli::handle_config_validate(&config),
        Some(Commands::Check) => {
            let pool = db::create_pool(&config).await?;
            let report = startup::validate_environment(&config, Some(&pool)).await;
            report.print();
            if !report.is_valid() {
                anyhow::bail!("Startup validation failed");
            }
            Ok(())
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve(config: Config, in_memory: bool) -> anyhow::Result<()> {
    let store: Arc<dyn TransactionStore> = if in_memory {
        tracing::warn!("Serving from an in-memory store; transactions are lost on exit");
        let report = startup::validate_environment(&config, None).await;
        for warning in &report.warnings {
            tracing::warn!("{}", warning);
        }
        Arc::new(MemoryTransactionStore::new())
    } else {
        // Database pool
        let pool = db::create_pool(&config).await?;

        // Run migrations
        db::run_migrations(&pool).await?;

        let report = startup::validate_environment(&config, Some(&pool)).await;
        for warning in &report.warnings {
            tracing::warn!("{}", warning);
        }
        if !report.is_valid() {
            report.print();
            anyhow::bail!("Startup validation failed");
        }

        Arc::new(PostgresTransactionStore::new(pool))
    };

    tracing::debug!(?config, "Loaded configuration");
    let state = AppState::new(&config, store)?;
    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
