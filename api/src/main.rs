use anyhow::{Context, Result};
use std::net::SocketAddr;

mod handlers;
mod routes;
mod state;

use common::bootstrap::{
    init_database_pool, init_gateway, init_lifecycle_manager, init_owner_registry,
};
use common::config::Settings;
use common::telemetry;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Settings::load().context("Failed to load configuration")?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    // Initialize tracing
    telemetry::init_logging(
        &config.observability.log_level,
        config.observability.tracing_endpoint.as_deref(),
    )?;

    tracing::info!(
        host = %config.server.host,
        port = %config.server.port,
        timezone = %config.scheduler.timezone,
        "Starting medication reminder service"
    );

    let metrics_handle = telemetry::init_metrics(config.observability.metrics_port)?;

    let db_pool = init_database_pool(&config).await?;
    let gateway = init_gateway(&config)?;
    let lifecycle = init_lifecycle_manager(&config, db_pool.clone(), gateway.clone())?;
    let owners = init_owner_registry(db_pool.clone(), gateway);

    // Every active reminder is scheduled before the listener accepts requests
    let report = lifecycle
        .reconcile_on_startup()
        .await
        .context("Failed to load active reminders")?;
    tracing::info!(
        scheduled = report.scheduled,
        skipped = report.skipped,
        "Startup reconciliation complete"
    );

    let state = AppState::new(lifecycle.clone(), owners, Some(metrics_handle));
    let app = routes::create_router(state);

    // Start server
    let addr = SocketAddr::from((
        config
            .server
            .host
            .parse::<std::net::IpAddr>()
            .context("Invalid server host")?,
        config.server.port,
    ));
    tracing::info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let stopped = lifecycle.shutdown().await;
    tracing::info!(stopped, "Reminder timers stopped");

    db_pool.close().await;
    telemetry::shutdown_tracer();

    tracing::info!("Medication reminder service stopped");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }

    tracing::info!("Initiating graceful shutdown");
}
