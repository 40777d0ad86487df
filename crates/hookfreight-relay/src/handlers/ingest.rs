//! Webhook capture handler.
//!
//! `ANY /{hook_token}`: persists the inbound request verbatim as an event,
//! then schedules delivery. The body reaches storage as the raw bytes read
//! from the socket; nothing content-type-aware runs before persistence, so
//! no JSON middleware may ever be mounted on this route.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Path, Request, State};
use axum::http::header::HOST;
use axum::http::{HeaderMap, Uri};
use axum::Json;
use uuid::Uuid;

use hookfreight_core::HookToken;
use hookfreight_db::models::{CreateEvent, Endpoint, Event};

use crate::error::RelayError;
use crate::headers::{headers_to_json, query_to_json};
use crate::models::ApiMessage;
use crate::router::RelayState;

/// Methods accepted on the capture surface. GET is deliberately included;
/// some webhook producers probe with it.
pub const ALLOWED_METHODS: [&str; 4] = ["GET", "POST", "PUT", "PATCH"];

/// Capture an inbound webhook request.
#[utoipa::path(
    post,
    path = "/{hook_token}",
    tag = "Ingest",
    params(("hook_token" = String, Path, description = "24-hex endpoint token")),
    responses(
        (status = 200, description = "Event captured"),
        (status = 404, description = "Unknown hook token"),
        (status = 405, description = "Method not allowed"),
        (status = 413, description = "Body exceeds the capture limit"),
    )
)]
pub async fn ingest_handler(
    State(state): State<RelayState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(hook_token): Path<String>,
    req: Request,
) -> Result<Json<ApiMessage<serde_json::Value>>, RelayError> {
    let method = req.method().as_str().to_ascii_uppercase();
    if !ALLOWED_METHODS.contains(&method.as_str()) {
        return Err(RelayError::MethodNotAllowed);
    }

    if !HookToken::is_valid(&hook_token) {
        return Err(RelayError::RouteNotFound);
    }

    let endpoint = Endpoint::find_by_hook_token(state.pool(), &hook_token)
        .await?
        .ok_or_else(|| RelayError::not_found("endpoint"))?;

    // Capture the request's metadata before the body consumes it.
    let uri = req.uri().clone();
    let request_headers = req.headers().clone();

    let original_url = reconstruct_original_url(&request_headers, &uri);
    let source_url = derive_source_url(&request_headers);
    let user_agent = header_str(&request_headers, "user-agent").map(str::to_string);
    let query = query_to_json(uri.query());
    let headers = headers_to_json(&request_headers);

    let body = axum::body::to_bytes(req.into_body(), state.max_body_bytes())
        .await
        .map_err(|e| {
            if is_length_limit_error(&e) {
                RelayError::PayloadTooLarge
            } else {
                RelayError::Internal(format!("failed to read request body: {e}"))
            }
        })?;

    let event = Event::create(
        state.pool(),
        CreateEvent {
            id: Uuid::new_v4(),
            endpoint_id: endpoint.id,
            method,
            original_url,
            source_url,
            path: uri.path().to_string(),
            query,
            headers,
            body: body.to_vec(),
            source_ip: addr.ip().to_string(),
            user_agent,
        },
    )
    .await?;

    tracing::debug!(
        target: "ingest",
        event_id = %event.id,
        endpoint_id = %endpoint.id,
        method = %event.method,
        size_bytes = event.size_bytes,
        "Event captured"
    );

    // Fire-and-forget: the stored event is the durable source of truth, so
    // a failed enqueue must not block the 200. An operator can replay it.
    if let Err(e) = state.scheduler().enqueue(event.id, endpoint.id).await {
        tracing::warn!(
            target: "ingest",
            event_id = %event.id,
            error = %e,
            "Failed to enqueue delivery job for captured event"
        );
    }

    Ok(Json(ApiMessage::empty("event_created")))
}

/// Reconstruct the URL the producer originally targeted, preferring the
/// proxy-forwarded protocol and host over the connection's own.
pub(crate) fn reconstruct_original_url(headers: &HeaderMap, uri: &Uri) -> String {
    let proto = forwarded_token(headers, "x-forwarded-proto")
        .unwrap_or_else(|| "http".to_string());
    let host = forwarded_token(headers, "x-forwarded-host")
        .or_else(|| header_str(headers, HOST.as_str()).map(str::to_string))
        .unwrap_or_else(|| "localhost".to_string());
    let path_and_query = uri
        .path_and_query()
        .map_or("/", |pq| pq.as_str());
    format!("{proto}://{host}{path_and_query}")
}

/// First non-empty of the headers a producer uses to identify itself.
pub(crate) fn derive_source_url(headers: &HeaderMap) -> Option<String> {
    ["origin", "referer", "x-webhook-source"]
        .iter()
        .find_map(|name| {
            header_str(headers, name)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        })
}

/// First comma-separated token of a forwarding header, trimmed.
fn forwarded_token(headers: &HeaderMap, name: &str) -> Option<String> {
    let value = header_str(headers, name)?;
    let token = value.split(',').next()?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn is_length_limit_error(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<http_body_util::LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_allowed_methods_include_get() {
        assert!(ALLOWED_METHODS.contains(&"GET"));
        assert!(!ALLOWED_METHODS.contains(&"DELETE"));
    }

    #[test]
    fn test_original_url_from_host_header() {
        let h = headers(&[("host", "hooks.example.com")]);
        let url = reconstruct_original_url(&h, &uri("/a1b2c3d4e5f6a1b2c3d4e5f6?x=1"));
        assert_eq!(
            url,
            "http://hooks.example.com/a1b2c3d4e5f6a1b2c3d4e5f6?x=1"
        );
    }

    #[test]
    fn test_original_url_prefers_forwarded_headers() {
        let h = headers(&[
            ("host", "internal:8080"),
            ("x-forwarded-proto", "https"),
            ("x-forwarded-host", "hooks.example.com"),
        ]);
        let url = reconstruct_original_url(&h, &uri("/token"));
        assert_eq!(url, "https://hooks.example.com/token");
    }

    #[test]
    fn test_forwarded_headers_take_first_comma_token() {
        let h = headers(&[
            ("x-forwarded-proto", "https, http"),
            ("x-forwarded-host", " hooks.example.com , proxy.internal"),
        ]);
        let url = reconstruct_original_url(&h, &uri("/token"));
        assert_eq!(url, "https://hooks.example.com/token");
    }

    #[test]
    fn test_original_url_defaults_without_headers() {
        let url = reconstruct_original_url(&HeaderMap::new(), &uri("/token"));
        assert_eq!(url, "http://localhost/token");
    }

    #[test]
    fn test_source_url_prefers_origin() {
        let h = headers(&[
            ("origin", "https://producer.example.com"),
            ("referer", "https://other.example.com/page"),
        ]);
        assert_eq!(
            derive_source_url(&h).as_deref(),
            Some("https://producer.example.com")
        );
    }

    #[test]
    fn test_source_url_falls_through_empty_values() {
        let h = headers(&[
            ("origin", "  "),
            ("x-webhook-source", "github"),
        ]);
        assert_eq!(derive_source_url(&h).as_deref(), Some("github"));
    }

    #[test]
    fn test_source_url_absent() {
        assert_eq!(derive_source_url(&HeaderMap::new()), None);
    }
}
