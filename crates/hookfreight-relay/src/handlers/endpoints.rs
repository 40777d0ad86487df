//! Endpoint management handlers.
//!
//! The hook token is generated here at creation time and never changes
//! afterwards; updates deliberately have no way to touch it.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;
use validator::Validate;

use hookfreight_core::{AppId, EndpointId, HookToken};
use hookfreight_db::models::{App, CreateEndpoint, Endpoint, UpdateEndpoint};

use crate::error::{ApiResult, FieldError, RelayError};
use crate::handlers::parse_id;
use crate::models::{
    endpoint_to_response, ApiMessage, CreateEndpointRequest, EndpointResponse, Page, PageQuery,
    UpdateEndpointRequest,
};
use crate::router::RelayState;

/// Default outbound timeout in milliseconds.
const DEFAULT_HTTP_TIMEOUT_MS: i32 = 10_000;

/// Upper bound on the outbound timeout.
const MAX_HTTP_TIMEOUT_MS: i32 = 120_000;

/// Create an endpoint under an app.
#[utoipa::path(
    post,
    path = "/api/endpoints",
    tag = "Endpoints",
    request_body = CreateEndpointRequest,
    responses(
        (status = 201, description = "Endpoint created"),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "App not found"),
    )
)]
pub async fn create_endpoint_handler(
    State(state): State<RelayState>,
    Json(request): Json<CreateEndpointRequest>,
) -> ApiResult<(StatusCode, Json<ApiMessage<EndpointResponse>>)> {
    request.validate()?;
    let app_id: AppId = parse_id("app_id", &request.app_id)?;

    let forward_url = request.forward_url.unwrap_or_default();
    validate_forward_url(&forward_url)?;

    App::find_by_id(state.pool(), app_id.as_uuid())
        .await?
        .ok_or_else(|| RelayError::not_found("app"))?;

    let (auth_header_name, auth_header_value) = match request.authentication {
        Some(auth) => (Some(auth.header_name), Some(auth.header_value)),
        None => (None, None),
    };

    let endpoint = Endpoint::create(
        state.pool(),
        CreateEndpoint {
            id: Uuid::new_v4(),
            app_id: app_id.as_uuid(),
            hook_token: HookToken::generate().to_string(),
            forward_url,
            forwarding_enabled: request.forwarding_enabled.unwrap_or(true),
            auth_header_name,
            auth_header_value,
            http_timeout_ms: clamp_timeout(request.http_timeout_ms),
        },
    )
    .await?;

    tracing::info!(
        endpoint_id = %endpoint.id,
        app_id = %app_id,
        "Endpoint created"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiMessage::new(
            "endpoint_created",
            endpoint_to_response(endpoint),
        )),
    ))
}

/// List endpoints for an app.
#[utoipa::path(
    get,
    path = "/api/apps/{id}/endpoints",
    tag = "Endpoints",
    params(
        ("id" = String, Path, description = "App public id"),
        PageQuery,
    ),
    responses(
        (status = 200, description = "Paginated endpoint list"),
        (status = 404, description = "App not found"),
    )
)]
pub async fn list_endpoints_handler(
    State(state): State<RelayState>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<ApiMessage<Page<EndpointResponse>>>> {
    let app_id: AppId = parse_id("id", &id)?;

    App::find_by_id(state.pool(), app_id.as_uuid())
        .await?
        .ok_or_else(|| RelayError::not_found("app"))?;

    let (limit, offset) = query.clamp(20, 50);
    let endpoints =
        Endpoint::list_by_app(state.pool(), app_id.as_uuid(), limit + 1, offset).await?;
    let items = endpoints.into_iter().map(endpoint_to_response).collect();

    Ok(Json(ApiMessage::new(
        "endpoints_listed",
        Page::from_overfetch(items, limit, offset),
    )))
}

/// Get an endpoint by public id.
#[utoipa::path(
    get,
    path = "/api/endpoints/{id}",
    tag = "Endpoints",
    params(("id" = String, Path, description = "Endpoint public id")),
    responses(
        (status = 200, description = "Endpoint"),
        (status = 404, description = "Endpoint not found"),
    )
)]
pub async fn get_endpoint_handler(
    State(state): State<RelayState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiMessage<EndpointResponse>>> {
    let id: EndpointId = parse_id("id", &id)?;

    let endpoint = Endpoint::find_by_id(state.pool(), id.as_uuid())
        .await?
        .ok_or_else(|| RelayError::not_found("endpoint"))?;

    Ok(Json(ApiMessage::new(
        "endpoint_retrieved",
        endpoint_to_response(endpoint),
    )))
}

/// Update an endpoint's forwarding configuration.
#[utoipa::path(
    patch,
    path = "/api/endpoints/{id}",
    tag = "Endpoints",
    request_body = UpdateEndpointRequest,
    params(("id" = String, Path, description = "Endpoint public id")),
    responses(
        (status = 200, description = "Endpoint updated"),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Endpoint not found"),
    )
)]
pub async fn update_endpoint_handler(
    State(state): State<RelayState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateEndpointRequest>,
) -> ApiResult<Json<ApiMessage<EndpointResponse>>> {
    request.validate()?;
    let id: EndpointId = parse_id("id", &id)?;

    if let Some(ref url) = request.forward_url {
        validate_forward_url(url)?;
    }

    let (auth_header_name, auth_header_value) = match request.authentication {
        Some(auth) => (Some(auth.header_name), Some(auth.header_value)),
        None => (None, None),
    };

    let endpoint = Endpoint::update(
        state.pool(),
        id.as_uuid(),
        UpdateEndpoint {
            forward_url: request.forward_url,
            forwarding_enabled: request.forwarding_enabled,
            auth_header_name,
            auth_header_value,
            http_timeout_ms: request.http_timeout_ms.map(|t| t.min(MAX_HTTP_TIMEOUT_MS)),
            is_active: request.is_active,
        },
    )
    .await?
    .ok_or_else(|| RelayError::not_found("endpoint"))?;

    Ok(Json(ApiMessage::new(
        "endpoint_updated",
        endpoint_to_response(endpoint),
    )))
}

/// An empty forward URL means "capture only"; a non-empty one must be a
/// well-formed http(s) URL.
fn validate_forward_url(url: &str) -> Result<(), RelayError> {
    if url.is_empty() {
        return Ok(());
    }
    match url::Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        Ok(parsed) => Err(RelayError::invalid_field(
            FieldError::new("forward_url", "invalid_scheme", "Forward URL must be http or https")
                .expected("http:// or https://")
                .received(parsed.scheme()),
        )),
        Err(e) => Err(RelayError::invalid_field(
            FieldError::new("forward_url", "invalid_url", e.to_string()).received(url),
        )),
    }
}

fn clamp_timeout(requested: Option<i32>) -> i32 {
    requested
        .unwrap_or(DEFAULT_HTTP_TIMEOUT_MS)
        .min(MAX_HTTP_TIMEOUT_MS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_forward_url_accepts_empty() {
        assert!(validate_forward_url("").is_ok());
    }

    #[test]
    fn test_validate_forward_url_accepts_http_and_https() {
        assert!(validate_forward_url("http://example.com/hook").is_ok());
        assert!(validate_forward_url("https://example.com:8443/hook").is_ok());
    }

    #[test]
    fn test_validate_forward_url_rejects_other_schemes() {
        assert!(validate_forward_url("ftp://example.com/hook").is_err());
    }

    #[test]
    fn test_validate_forward_url_rejects_garbage() {
        assert!(validate_forward_url("not a url").is_err());
    }

    #[test]
    fn test_timeout_defaults_and_caps() {
        assert_eq!(clamp_timeout(None), 10_000);
        assert_eq!(clamp_timeout(Some(5_000)), 5_000);
        assert_eq!(clamp_timeout(Some(500_000)), 120_000);
    }
}
