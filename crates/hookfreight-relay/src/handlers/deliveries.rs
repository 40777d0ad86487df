//! Delivery read and replay handlers.

use axum::extract::{Path, Query, State};
use axum::Json;

use hookfreight_core::{DeliveryId, EventId};
use hookfreight_db::models::{Delivery, Event};

use crate::error::{ApiResult, RelayError};
use crate::handlers::parse_id;
use crate::models::{delivery_to_response, ApiMessage, DeliveryResponse, Page, PageQuery};
use crate::router::RelayState;

const DELIVERY_PAGE_DEFAULT: i64 = 20;
const DELIVERY_PAGE_MAX: i64 = 1000;

/// List delivery attempts for an event, newest first.
#[utoipa::path(
    get,
    path = "/api/events/{id}/deliveries",
    tag = "Deliveries",
    params(
        ("id" = String, Path, description = "Event public id"),
        PageQuery,
    ),
    responses(
        (status = 200, description = "Paginated delivery list"),
        (status = 404, description = "Event not found"),
    )
)]
pub async fn list_deliveries_handler(
    State(state): State<RelayState>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<ApiMessage<Page<DeliveryResponse>>>> {
    let event_id: EventId = parse_id("id", &id)?;

    Event::find_by_id(state.pool(), event_id.as_uuid())
        .await?
        .ok_or_else(|| RelayError::not_found("event"))?;

    let (limit, offset) = query.clamp(DELIVERY_PAGE_DEFAULT, DELIVERY_PAGE_MAX);
    let deliveries =
        Delivery::list_by_event(state.pool(), event_id.as_uuid(), limit + 1, offset).await?;
    let items = deliveries.into_iter().map(delivery_to_response).collect();

    Ok(Json(ApiMessage::new(
        "deliveries_listed",
        Page::from_overfetch(items, limit, offset),
    )))
}

/// Get a delivery attempt by public id.
#[utoipa::path(
    get,
    path = "/api/deliveries/{id}",
    tag = "Deliveries",
    params(("id" = String, Path, description = "Delivery public id")),
    responses(
        (status = 200, description = "Delivery"),
        (status = 404, description = "Delivery not found"),
    )
)]
pub async fn get_delivery_handler(
    State(state): State<RelayState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiMessage<DeliveryResponse>>> {
    let id: DeliveryId = parse_id("id", &id)?;

    let delivery = Delivery::find_by_id(state.pool(), id.as_uuid())
        .await?
        .ok_or_else(|| RelayError::not_found("delivery"))?;

    Ok(Json(ApiMessage::new(
        "delivery_retrieved",
        delivery_to_response(delivery),
    )))
}

/// Manually replay a recorded delivery attempt.
#[utoipa::path(
    post,
    path = "/api/deliveries/{id}/retry",
    tag = "Deliveries",
    params(("id" = String, Path, description = "Delivery public id")),
    responses(
        (status = 200, description = "Retry enqueued"),
        (status = 404, description = "Delivery, event, or endpoint not found"),
    )
)]
pub async fn retry_delivery_handler(
    State(state): State<RelayState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiMessage<serde_json::Value>>> {
    let id: DeliveryId = parse_id("id", &id)?;

    let job = state.scheduler().enqueue_retry(id.as_uuid()).await?;

    Ok(Json(ApiMessage::new(
        "retry_enqueued",
        serde_json::json!({ "job_key": job.job_key }),
    )))
}
