//! firefly-ingest service entrypoint

use anyhow::Result;
use firefly_ingest::config::Config;
use firefly_ingest::AppState;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting firefly-ingest");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env();
    info!("Database: {}", config.database_path.display());

    let db = firefly_ingest::db::init_database_pool(&config.database_path).await?;
    info!("Database connection established");

    let state = AppState::new(db, &config)?;

    // Honor the persisted enabled flag: periodic trigger + startup run
    state.coordinator.init().await?;

    let app = firefly_ingest::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
