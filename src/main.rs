//! stemgate service binary

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use stemgate::config::Settings;
use stemgate::services::{HttpObjectStore, JobOrchestrator, RunpodClient};
use stemgate::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting stemgate audio job gateway");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let settings = Settings::load()?;

    let db_pool = stemgate::db::init_database_pool(&settings.database_path).await?;
    info!("Database: {}", settings.database_path.display());

    let store = Arc::new(HttpObjectStore::new(&settings.storage)?);
    let backend = Arc::new(RunpodClient::new(&settings.compute)?);
    let orchestrator = Arc::new(JobOrchestrator::new(
        db_pool.clone(),
        store,
        backend,
        settings.storage.staging_folder.clone(),
    ));

    let state = AppState::new(db_pool, orchestrator);
    let app = stemgate::build_router(state);

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    info!("Listening on http://{}", settings.bind_addr);
    info!("Health check: http://{}/health", settings.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
