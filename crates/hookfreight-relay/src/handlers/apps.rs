//! App management handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;
use validator::Validate;

use hookfreight_core::AppId;
use hookfreight_db::models::App;

use crate::error::{ApiResult, RelayError};
use crate::handlers::parse_id;
use crate::models::{app_to_response, ApiMessage, AppResponse, CreateAppRequest, Page, PageQuery};
use crate::router::RelayState;

/// Create an app.
#[utoipa::path(
    post,
    path = "/api/apps",
    tag = "Apps",
    request_body = CreateAppRequest,
    responses(
        (status = 201, description = "App created"),
        (status = 400, description = "Validation failed"),
    )
)]
pub async fn create_app_handler(
    State(state): State<RelayState>,
    Json(request): Json<CreateAppRequest>,
) -> ApiResult<(StatusCode, Json<ApiMessage<AppResponse>>)> {
    request.validate()?;

    let app = App::create(state.pool(), Uuid::new_v4(), request.name.trim()).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiMessage::new("app_created", app_to_response(app))),
    ))
}

/// List apps.
#[utoipa::path(
    get,
    path = "/api/apps",
    tag = "Apps",
    params(PageQuery),
    responses((status = 200, description = "Paginated app list"))
)]
pub async fn list_apps_handler(
    State(state): State<RelayState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<ApiMessage<Page<AppResponse>>>> {
    let (limit, offset) = query.clamp(20, 50);

    let apps = App::list(state.pool(), limit + 1, offset).await?;
    let items = apps.into_iter().map(app_to_response).collect();

    Ok(Json(ApiMessage::new(
        "apps_listed",
        Page::from_overfetch(items, limit, offset),
    )))
}

/// Get an app by public id.
#[utoipa::path(
    get,
    path = "/api/apps/{id}",
    tag = "Apps",
    params(("id" = String, Path, description = "App public id")),
    responses(
        (status = 200, description = "App"),
        (status = 404, description = "App not found"),
    )
)]
pub async fn get_app_handler(
    State(state): State<RelayState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiMessage<AppResponse>>> {
    let id: AppId = parse_id("id", &id)?;

    let app = App::find_by_id(state.pool(), id.as_uuid())
        .await?
        .ok_or_else(|| RelayError::not_found("app"))?;

    Ok(Json(ApiMessage::new("app_retrieved", app_to_response(app))))
}

/// Delete an app and cascade to its endpoints and their events.
#[utoipa::path(
    delete,
    path = "/api/apps/{id}",
    tag = "Apps",
    params(("id" = String, Path, description = "App public id")),
    responses(
        (status = 200, description = "App deleted"),
        (status = 404, description = "App not found"),
    )
)]
pub async fn delete_app_handler(
    State(state): State<RelayState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiMessage<serde_json::Value>>> {
    let id: AppId = parse_id("id", &id)?;

    let deleted = App::delete_cascade(state.pool(), id.as_uuid()).await?;
    if !deleted {
        return Err(RelayError::not_found("app"));
    }

    tracing::info!(app_id = %id, "App deleted with cascade");
    Ok(Json(ApiMessage::empty("app_deleted")))
}
