//! Health endpoint: database reachability plus queue depth counts.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use sqlx::PgPool;

use hookfreight_db::models::JobCounts;
use hookfreight_relay::DeliveryScheduler;

/// State for the health handler.
#[derive(Clone)]
pub struct HealthState {
    pub pool: PgPool,
    pub scheduler: Arc<DeliveryScheduler>,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    database: &'static str,
    queue: Option<JobCounts>,
}

/// Build the health router.
pub fn health_routes(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
}

async fn health_handler(
    State(state): State<HealthState>,
) -> (StatusCode, Json<HealthResponse>) {
    let database_up = sqlx::query("SELECT 1")
        .execute(&state.pool)
        .await
        .is_ok();

    let queue = match state.scheduler.counts().await {
        Ok(counts) => Some(counts),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read queue counts for health check");
            None
        }
    };

    let healthy = database_up && queue.is_some();
    let response = HealthResponse {
        status: if healthy { "ok" } else { "degraded" },
        version: state.version,
        database: if database_up { "up" } else { "down" },
        queue,
    };

    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(response))
}
