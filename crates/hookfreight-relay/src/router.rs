//! Axum router and shared state for the relay.

use std::sync::Arc;

use axum::routing::{any, get, post};
use axum::Router;
use sqlx::PgPool;

use crate::error::RelayError;
use crate::handlers::{apps, deliveries, endpoints, events, ingest};
use crate::services::scheduler::DeliveryScheduler;

/// Shared state for all relay handlers.
#[derive(Clone)]
pub struct RelayState {
    pool: PgPool,
    scheduler: Arc<DeliveryScheduler>,
    max_body_bytes: usize,
}

impl RelayState {
    /// Create the relay state.
    #[must_use]
    pub fn new(pool: PgPool, scheduler: Arc<DeliveryScheduler>, max_body_bytes: usize) -> Self {
        Self {
            pool,
            scheduler,
            max_body_bytes,
        }
    }

    /// Get a reference to the database pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Get the process-wide delivery scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &DeliveryScheduler {
        &self.scheduler
    }

    /// The ingest body capture limit in bytes.
    #[must_use]
    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }
}

/// Creates the relay router: the management/read API under `/api` and the
/// capture surface at the root.
///
/// The capture route takes the raw request; no body-parsing middleware may
/// be layered onto it.
pub fn relay_router(state: RelayState) -> Router {
    let api = Router::new()
        // App management
        .route(
            "/apps",
            post(apps::create_app_handler).get(apps::list_apps_handler),
        )
        .route(
            "/apps/:id",
            get(apps::get_app_handler).delete(apps::delete_app_handler),
        )
        .route("/apps/:id/endpoints", get(endpoints::list_endpoints_handler))
        // Endpoint management
        .route("/endpoints", post(endpoints::create_endpoint_handler))
        .route(
            "/endpoints/:id",
            get(endpoints::get_endpoint_handler).patch(endpoints::update_endpoint_handler),
        )
        // Event reads
        .route("/endpoints/:id/events", get(events::list_events_handler))
        .route("/events/:id", get(events::get_event_handler))
        // Delivery reads and replay
        .route(
            "/events/:id/deliveries",
            get(deliveries::list_deliveries_handler),
        )
        .route("/deliveries/:id", get(deliveries::get_delivery_handler))
        .route(
            "/deliveries/:id/retry",
            post(deliveries::retry_delivery_handler),
        );

    Router::new()
        .nest("/api", api)
        // Capture surface: any method, raw body.
        .route("/:hook_token", any(ingest::ingest_handler))
        .fallback(fallback_handler)
        .with_state(state)
}

/// Any path that matches no route gets the enveloped 404.
async fn fallback_handler() -> RelayError {
    RelayError::RouteNotFound
}
