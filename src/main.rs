use kidtrack_journeys::clock::SystemClock;
use kidtrack_journeys::config::AppConfig;
use kidtrack_journeys::db::{self, PgStore};
use kidtrack_journeys::documents::LocalDocumentStore;
use kidtrack_journeys::scheduler::{self, SweepSchedule};
use kidtrack_journeys::JourneyService;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config
    let config = AppConfig::load()?;

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .init();

    info!("Starting Kidtrack Journeys (overdue sweep)...");

    // Init DB
    let pool = db::init_pool(&config.database_url, config.db_max_connections).await?;
    info!("Connected to database");
    if config.run_migrations {
        db::run_migrations(&pool).await?;
    }

    let service = Arc::new(JourneyService::new(
        Arc::new(PgStore::new(pool)),
        Arc::new(SystemClock),
        Arc::new(LocalDocumentStore::new(&config.documents_dir)),
    ));

    // One-shot mode for an external timer such as cron.
    if std::env::args().any(|arg| arg == "--once") {
        let report = service.run_overdue_sweep().await?;
        println!("{}", serde_json::to_string(&report)?);
        return Ok(());
    }

    let shutdown_rx = scheduler::shutdown_on(tokio::signal::ctrl_c());
    scheduler::run_overdue_sweeps(service, SweepSchedule::from(&config), shutdown_rx).await;
    Ok(())
}
