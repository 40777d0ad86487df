//! Request/response types and the public response envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use hookfreight_core::{AppId, DeliveryId, EndpointId, EventId};
use hookfreight_db::models::{App, Delivery, Endpoint, Event};

use crate::body;

// ---------------------------------------------------------------------------
// Response envelope
// ---------------------------------------------------------------------------

/// The envelope every management and read API response is wrapped in.
#[derive(Debug, Clone, Serialize)]
pub struct ApiMessage<T: Serialize> {
    pub message: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiMessage<T> {
    /// An envelope carrying data.
    pub fn new(message: &str, data: T) -> Self {
        Self {
            message: message.to_string(),
            data: Some(data),
        }
    }
}

impl ApiMessage<serde_json::Value> {
    /// An envelope with `data: null`.
    #[must_use]
    pub fn empty(message: &str) -> Self {
        Self {
            message: message.to_string(),
            data: None,
        }
    }
}

// ---------------------------------------------------------------------------
// DeliveryStatus enum
// ---------------------------------------------------------------------------

/// Outcome status of a delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Delivered,
    Failed,
    Timeout,
}

impl DeliveryStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "delivered" => Some(Self::Delivered),
            "failed" => Some(Self::Failed),
            "timeout" => Some(Self::Timeout),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Request body for creating an app.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateAppRequest {
    /// Display name for the app.
    #[validate(length(
        min = 1,
        max = 255,
        message = "Name must be between 1 and 255 characters"
    ))]
    pub name: String,
}

/// Static header credential attached to forwarded requests.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct EndpointAuthentication {
    #[validate(length(
        min = 1,
        max = 255,
        message = "Header name must be between 1 and 255 characters"
    ))]
    pub header_name: String,

    #[validate(length(max = 4096, message = "Header value cannot exceed 4096 characters"))]
    pub header_value: String,
}

/// Request body for creating an endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateEndpointRequest {
    /// Owning app public id (`app_` + 32 hex).
    pub app_id: String,

    /// Destination the captured events are forwarded to. May be empty to
    /// capture without forwarding.
    #[validate(length(max = 2000, message = "Forward URL cannot exceed 2000 characters"))]
    #[serde(default)]
    pub forward_url: Option<String>,

    #[serde(default)]
    pub forwarding_enabled: Option<bool>,

    #[validate(nested)]
    #[serde(default)]
    pub authentication: Option<EndpointAuthentication>,

    /// Outbound request timeout in milliseconds (default 10000, cap 120000).
    #[validate(range(min = 1, message = "Timeout must be positive"))]
    #[serde(default)]
    pub http_timeout_ms: Option<i32>,
}

/// Request body for updating an endpoint. The hook token is immutable and
/// has no counterpart here.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateEndpointRequest {
    #[validate(length(max = 2000, message = "Forward URL cannot exceed 2000 characters"))]
    #[serde(default)]
    pub forward_url: Option<String>,

    #[serde(default)]
    pub forwarding_enabled: Option<bool>,

    #[validate(nested)]
    #[serde(default)]
    pub authentication: Option<EndpointAuthentication>,

    #[validate(range(min = 1, message = "Timeout must be positive"))]
    #[serde(default)]
    pub http_timeout_ms: Option<i32>,

    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Pagination query parameters.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PageQuery {
    /// Clamp into `[1, max_limit]` with the given default, offset `>= 0`.
    #[must_use]
    pub fn clamp(&self, default_limit: i64, max_limit: i64) -> (i64, i64) {
        let limit = self.limit.unwrap_or(default_limit).clamp(1, max_limit);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// An app.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AppResponse {
    #[schema(value_type = String)]
    pub id: AppId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// An endpoint with its forwarding configuration.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EndpointResponse {
    #[schema(value_type = String)]
    pub id: EndpointId,
    #[schema(value_type = String)]
    pub app_id: AppId,
    pub hook_token: String,
    pub forward_url: String,
    pub forwarding_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication: Option<EndpointAuthentication>,
    pub http_timeout_ms: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A captured event with its body projected for API consumption.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventResponse {
    #[schema(value_type = String)]
    pub id: EventId,
    #[schema(value_type = String)]
    pub endpoint_id: EndpointId,
    pub received_at: DateTime<Utc>,
    pub method: String,
    pub original_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub path: String,
    #[schema(value_type = Object)]
    pub query: serde_json::Value,
    #[schema(value_type = Object)]
    pub headers: serde_json::Value,
    #[schema(value_type = Object)]
    pub body: serde_json::Value,
    pub source_ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    pub size_bytes: i64,
}

/// A delivery attempt with its response body projected.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeliveryResponse {
    #[schema(value_type = String)]
    pub id: DeliveryId,
    #[schema(value_type = String)]
    pub event_id: EventId,
    #[schema(value_type = Option<String>)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_delivery_id: Option<DeliveryId>,
    pub status: String,
    pub destination_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_status: Option<i32>,
    #[schema(value_type = Object)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_headers: Option<serde_json::Value>,
    #[schema(value_type = Object)]
    pub response_body: serde_json::Value,
    pub duration_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A page of items plus the `has_next` marker computed by over-fetching.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T: Serialize> {
    pub items: Vec<T>,
    pub has_next: bool,
    pub limit: i64,
    pub offset: i64,
}

impl<T: Serialize> Page<T> {
    /// Build a page from a `limit + 1` over-fetch.
    #[must_use]
    pub fn from_overfetch(mut items: Vec<T>, limit: i64, offset: i64) -> Self {
        let has_next = items.len() as i64 > limit;
        items.truncate(limit as usize);
        Self {
            items,
            has_next,
            limit,
            offset,
        }
    }
}

// ---------------------------------------------------------------------------
// Converters
// ---------------------------------------------------------------------------

/// Convert a DB app to its response shape.
#[must_use]
pub fn app_to_response(a: App) -> AppResponse {
    AppResponse {
        id: AppId::from_uuid(a.id),
        name: a.name,
        created_at: a.created_at,
    }
}

/// Convert a DB endpoint to its response shape.
#[must_use]
pub fn endpoint_to_response(e: Endpoint) -> EndpointResponse {
    let authentication = match (e.auth_header_name, e.auth_header_value) {
        (Some(header_name), Some(header_value)) => Some(EndpointAuthentication {
            header_name,
            header_value,
        }),
        _ => None,
    };
    EndpointResponse {
        id: EndpointId::from_uuid(e.id),
        app_id: AppId::from_uuid(e.app_id),
        hook_token: e.hook_token,
        forward_url: e.forward_url,
        forwarding_enabled: e.forwarding_enabled,
        authentication,
        http_timeout_ms: e.http_timeout_ms,
        is_active: e.is_active,
        created_at: e.created_at,
        updated_at: e.updated_at,
    }
}

/// Convert a DB event to its response shape, projecting the body.
#[must_use]
pub fn event_to_response(e: Event) -> EventResponse {
    let projected = body::project_event_body(&e.headers, &e.body);
    EventResponse {
        id: EventId::from_uuid(e.id),
        endpoint_id: EndpointId::from_uuid(e.endpoint_id),
        received_at: e.received_at,
        method: e.method,
        original_url: e.original_url,
        source_url: e.source_url,
        path: e.path,
        query: e.query,
        headers: e.headers,
        body: projected,
        source_ip: e.source_ip,
        user_agent: e.user_agent,
        size_bytes: e.size_bytes,
    }
}

/// Convert a DB delivery to its response shape, projecting the response
/// body.
#[must_use]
pub fn delivery_to_response(d: Delivery) -> DeliveryResponse {
    let projected = body::project_bytes(d.response_body.as_deref().unwrap_or_default());
    DeliveryResponse {
        id: DeliveryId::from_uuid(d.id),
        event_id: EventId::from_uuid(d.event_id),
        parent_delivery_id: d.parent_delivery_id.map(DeliveryId::from_uuid),
        status: d.status,
        destination_url: d.destination_url,
        response_status: d.response_status,
        response_headers: d.response_headers,
        response_body: projected,
        duration_ms: d.duration_ms,
        error_message: d.error_message,
        created_at: d.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_empty_serializes_null_data() {
        let env = ApiMessage::empty("event_created");
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["message"], "event_created");
        assert!(json["data"].is_null());
    }

    #[test]
    fn test_delivery_status_roundtrip() {
        for s in [
            DeliveryStatus::Delivered,
            DeliveryStatus::Failed,
            DeliveryStatus::Timeout,
        ] {
            assert_eq!(DeliveryStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(DeliveryStatus::parse("pending"), None);
    }

    #[test]
    fn test_page_query_clamps() {
        let q = PageQuery {
            limit: Some(500),
            offset: Some(-3),
        };
        assert_eq!(q.clamp(20, 50), (50, 0));

        let q = PageQuery {
            limit: Some(0),
            offset: None,
        };
        assert_eq!(q.clamp(20, 50), (1, 0));

        let q = PageQuery::default();
        assert_eq!(q.clamp(20, 1000), (20, 0));
    }

    #[test]
    fn test_page_from_overfetch() {
        let page = Page::from_overfetch(vec![1, 2, 3], 2, 0);
        assert_eq!(page.items, vec![1, 2]);
        assert!(page.has_next);

        let page = Page::from_overfetch(vec![1, 2], 2, 0);
        assert_eq!(page.items, vec![1, 2]);
        assert!(!page.has_next);
    }
}
