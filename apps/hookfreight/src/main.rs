//! HookFreight, a self-hosted webhook relay.
//!
//! Wires the pieces together: configuration, the PostgreSQL pool and
//! migrations, the delivery scheduler and worker, the retention loop, and
//! the axum server with graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

mod config;
mod health;
mod logging;

use config::HookfreightConfig;
use health::{health_routes, HealthState};
use hookfreight_db::{run_migrations, DbPool, DbPoolOptions};
use hookfreight_relay::{relay_router, DeliveryScheduler, DeliveryWorker, Forwarder, RelayState};

/// Application version.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How often the retention loop prunes finished jobs.
const RETENTION_INTERVAL_SECS: u64 = 600;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging("info");

    info!("Starting HookFreight v{}", VERSION);

    let config = HookfreightConfig::from_env().map_err(|e| {
        error!("Configuration error: {e}");
        anyhow::anyhow!(e)
    })?;

    // Connect and migrate before anything starts serving.
    let db = DbPool::connect_with_options(
        &config.database_url,
        DbPoolOptions {
            max_connections: config.db_max_connections,
            ..DbPoolOptions::default()
        },
    )
    .await?;
    run_migrations(&db).await?;
    let pool = db.inner().clone();

    let scheduler = Arc::new(DeliveryScheduler::new(
        pool.clone(),
        config.queue_max_retries,
    ));

    // Jobs left active by an ungraceful exit go back to waiting before the
    // worker starts claiming.
    scheduler.requeue_interrupted().await?;

    let forwarder = Arc::new(Forwarder::new(config.base_url.clone())?);

    // One worker singleton per process.
    let shutdown_token = CancellationToken::new();
    let worker = DeliveryWorker::new(
        pool.clone(),
        forwarder,
        config.queue_concurrency,
        shutdown_token.clone(),
    );
    let worker_handle = tokio::spawn(worker.run());

    // Retention loop for finished jobs.
    {
        let scheduler = scheduler.clone();
        let token = shutdown_token.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(RETENTION_INTERVAL_SECS));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = interval.tick() => {
                        if let Err(e) = scheduler.prune().await {
                            tracing::warn!(error = %e, "Failed to prune finished delivery jobs");
                        }
                    }
                }
            }
        });
    }

    let relay_state = RelayState::new(pool.clone(), scheduler.clone(), config.max_body_bytes);
    let health_state = HealthState {
        pool: pool.clone(),
        scheduler: scheduler.clone(),
        version: VERSION,
    };

    let app = relay_router(relay_state)
        .merge(health_routes(health_state))
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.bind_addr().parse().map_err(|e| {
        error!("Invalid bind address '{}': {e}", config.bind_addr());
        anyhow::anyhow!("invalid bind address")
    })?;

    info!(%addr, base_url = %config.base_url, "HookFreight listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // In-flight HTTP is drained; now stop the worker. Active jobs finish,
    // anything unclaimed stays queued for the next process.
    info!("HTTP server drained; stopping delivery worker");
    shutdown_token.cancel();
    if let Err(e) = worker_handle.await {
        error!(error = %e, "Delivery worker task failed during shutdown");
    }

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler: SIGTERM or Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
