use broadcast_rs::admission::AdmissionController;
use broadcast_rs::api::{ApiServer, AppState};
use broadcast_rs::config::Config;
use broadcast_rs::dispatch::{BatchDispatcher, SystemClock};
use broadcast_rs::gateway::LoggingGateway;
use broadcast_rs::ledger::OperationLedger;
use broadcast_rs::notify::ProgressNotifier;
use broadcast_rs::quota::QuotaTracker;
use broadcast_rs::tiers::TierCatalog;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .pretty()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    info!("Starting broadcast-rs engine");

    // Load configuration
    let config = if std::path::Path::new("config.toml").exists() {
        Config::from_file("config.toml")?
    } else {
        info!("No config file found, using defaults");
        Config::default()
    };

    info!("Configuration loaded");
    info!("  API listening on: {}", config.server.listen_addr);
    info!("  Database: {}", config.storage.database_url);
    info!("  Batch size: {}", config.engine.batch_size);
    info!("  Inter-batch delay: {}ms", config.engine.inter_batch_delay_ms);

    // Tier catalog: file-based when configured, built-ins otherwise
    let catalog = match &config.server.tiers_path {
        Some(path) => Arc::new(TierCatalog::from_file(path)?),
        None => Arc::new(TierCatalog::default()),
    };

    // Persistent store and engine components
    let db = SqlitePool::connect(&config.storage.database_url).await?;
    let quota = Arc::new(QuotaTracker::new(db.clone()).await?);
    let ledger = Arc::new(OperationLedger::new(db).await?);

    // Stand-in transport until a real gateway is wired
    let gateway = Arc::new(LoggingGateway);
    let notifier = Arc::new(ProgressNotifier::new(gateway.clone()));

    let admission = Arc::new(AdmissionController::new(
        Arc::clone(&catalog),
        Arc::clone(&quota),
    ));
    let dispatcher = BatchDispatcher::new(
        gateway,
        Arc::clone(&quota),
        Arc::clone(&ledger),
        notifier,
        Arc::new(SystemClock),
        config.engine.clone(),
    );

    // Housekeeping loop: live-index eviction and stale window purges
    let janitor = dispatcher.clone();
    let janitor_handle = tokio::spawn(async move {
        janitor.start_janitor().await;
    });

    let state = Arc::new(AppState {
        catalog,
        admission,
        dispatcher,
        ledger,
    });
    let server = ApiServer::new(state, config.server.listen_addr.clone());

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("API server error: {}", e);
            }
        }
        _ = janitor_handle => {
            error!("Janitor task exited unexpectedly");
        }
    }

    Ok(())
}
