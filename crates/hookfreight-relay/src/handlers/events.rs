//! Event read handlers.

use axum::extract::{Path, Query, State};
use axum::Json;

use hookfreight_core::{EndpointId, EventId};
use hookfreight_db::models::{Endpoint, Event};

use crate::error::{ApiResult, RelayError};
use crate::handlers::parse_id;
use crate::models::{event_to_response, ApiMessage, EventResponse, Page, PageQuery};
use crate::router::RelayState;

/// Events are paged in smaller windows than deliveries; the stored bodies
/// can be large.
const EVENT_PAGE_DEFAULT: i64 = 20;
const EVENT_PAGE_MAX: i64 = 50;

/// List captured events for an endpoint, newest first.
#[utoipa::path(
    get,
    path = "/api/endpoints/{id}/events",
    tag = "Events",
    params(
        ("id" = String, Path, description = "Endpoint public id"),
        PageQuery,
    ),
    responses(
        (status = 200, description = "Paginated event list"),
        (status = 404, description = "Endpoint not found"),
    )
)]
pub async fn list_events_handler(
    State(state): State<RelayState>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<ApiMessage<Page<EventResponse>>>> {
    let endpoint_id: EndpointId = parse_id("id", &id)?;

    Endpoint::find_by_id(state.pool(), endpoint_id.as_uuid())
        .await?
        .ok_or_else(|| RelayError::not_found("endpoint"))?;

    let (limit, offset) = query.clamp(EVENT_PAGE_DEFAULT, EVENT_PAGE_MAX);
    let events =
        Event::list_by_endpoint(state.pool(), endpoint_id.as_uuid(), limit + 1, offset).await?;
    let items = events.into_iter().map(event_to_response).collect();

    Ok(Json(ApiMessage::new(
        "events_listed",
        Page::from_overfetch(items, limit, offset),
    )))
}

/// Get a captured event by public id.
#[utoipa::path(
    get,
    path = "/api/events/{id}",
    tag = "Events",
    params(("id" = String, Path, description = "Event public id")),
    responses(
        (status = 200, description = "Event"),
        (status = 404, description = "Event not found"),
    )
)]
pub async fn get_event_handler(
    State(state): State<RelayState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiMessage<EventResponse>>> {
    let id: EventId = parse_id("id", &id)?;

    let event = Event::find_by_id(state.pool(), id.as_uuid())
        .await?
        .ok_or_else(|| RelayError::not_found("event"))?;

    Ok(Json(ApiMessage::new(
        "event_retrieved",
        event_to_response(event),
    )))
}
