use anyhow::Context;
use hypnos::api::{self, app_state::AppState};
use hypnos::config::loader::ConfigLoader;
use hypnos::observability::{AppMetrics, ObservabilityState, init_logging};
use hypnos::storage::StorageFactory;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConfigLoader::load().context("failed to load configuration")?;
    ConfigLoader::validate(&config).context("invalid configuration")?;

    let _log_guard = init_logging(&config.logging).context("failed to initialize logging")?;
    info!(
        app = %config.app_name,
        environment = %config.environment,
        backend = ?config.database.backend,
        "Starting Hypnos..."
    );

    let store = StorageFactory::create(&config.database)
        .await
        .context("failed to initialize storage")?;
    if !StorageFactory::health_check(store.as_ref()).await {
        anyhow::bail!("storage is not healthy");
    }
    info!("Storage initialized");

    let metrics = Arc::new(AppMetrics::new().context("failed to register metrics")?);

    let app_state = AppState::from_config(&config, store.clone(), metrics.clone());
    let observability_state = Arc::new(ObservabilityState::new(
        metrics,
        store,
        env!("CARGO_PKG_VERSION").to_string(),
    ));
    let router = api::create_router(app_state, observability_state);
    info!("API router created with observability endpoints");

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
