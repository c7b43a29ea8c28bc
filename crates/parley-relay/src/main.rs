//! Parley outbox relay entry point.

use std::sync::Arc;

use parley_core::clock::SystemClock;
use parley_core::outbox::OutboxStore;
use parley_relay::config::RelayConfig;
use parley_relay::error::AppError;
use parley_relay::handler::{AuditLogHandler, HandlerRegistry};
use parley_relay::relay::OutboxRelay;
use parley_relay::routes;
use parley_relay::state::AppState;
use parley_store::pg_outbox_store::PgOutboxStore;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting Parley outbox relay");

    let config = RelayConfig::from_env()?;

    // Create database connection pool.
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;

    if config.run_migrations {
        parley_store::MIGRATOR.run(&pool).await?;
        tracing::info!("Database migrations applied");
    }

    let outbox: Arc<dyn OutboxStore> = Arc::new(PgOutboxStore::new(pool.clone()));

    // Start the relay loop.
    let mut registry = HandlerRegistry::new();
    registry.subscribe_all(Arc::new(AuditLogHandler));
    let relay = OutboxRelay::new(Arc::clone(&outbox), registry, Arc::new(SystemClock))
        .with_batch_size(config.batch_size)
        .with_poll_interval(config.poll_interval)
        .with_retry_backoff(config.retry_backoff);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let relay_task = tokio::spawn(async move { relay.run(shutdown_rx).await });

    // Serve the operational endpoints until Ctrl-C.
    let app = routes::router(AppState::new(outbox)).layer(TraceLayer::new_for_http());
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!("Listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    if let Err(e) = relay_task.await {
        tracing::error!(error = %e, "relay task ended abnormally");
    }
    pool.close().await;

    Ok(())
}

async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl-C");
    }
    tracing::info!("Shutdown requested");
    // The relay may already have stopped; nothing to notify then.
    let _ = shutdown_tx.send(true);
}
