//! Error types for the relay pipeline.
//!
//! Every variant maps onto the public response envelope: validation
//! failures carry per-field details, 404s name the missing resource, and
//! anything internal collapses to a generic 500 that leaks nothing.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use hookfreight_db::DbError;

/// Body returned for every 5xx. Deliberately vague (and deliberately kept
/// verbatim from the original service, typo included).
pub const INTERNAL_ERROR_MESSAGE: &str = "an error occured, please try again later.";

/// One field-level validation failure.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<String>,
}

impl FieldError {
    /// A failure with just field, code, and message.
    pub fn new(field: &str, code: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            code: code.to_string(),
            message: message.into(),
            expected: None,
            received: None,
        }
    }

    /// Attach the expected shape.
    #[must_use]
    pub fn expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    /// Attach the rejected input.
    #[must_use]
    pub fn received(mut self, received: impl Into<String>) -> Self {
        self.received = Some(received.into());
        self
    }
}

/// Relay pipeline error variants.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    /// A named resource is missing; surfaces as `{resource}_not_found`.
    #[error("{resource} not found")]
    NotFound { resource: &'static str },

    /// The request path matched nothing at all.
    #[error("Route not found")]
    RouteNotFound,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Payload too large")]
    PayloadTooLarge,

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Shorthand for a named 404.
    #[must_use]
    pub fn not_found(resource: &'static str) -> Self {
        Self::NotFound { resource }
    }

    /// A single-field validation failure.
    #[must_use]
    pub fn invalid_field(error: FieldError) -> Self {
        Self::Validation(vec![error])
    }
}

impl From<validator::ValidationErrors> for RelayError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields = Vec::new();
        for (field, errs) in errors.field_errors() {
            for e in errs {
                let message = e
                    .message
                    .as_ref()
                    .map_or_else(|| e.code.to_string(), ToString::to_string);
                fields.push(FieldError::new(field, &e.code, message));
            }
        }
        Self::Validation(fields)
    }
}

/// Envelope for a validation failure response.
#[derive(Debug, Serialize)]
struct ValidationErrorBody {
    message: &'static str,
    errors: Vec<FieldError>,
}

/// Envelope for every other error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
    data: Option<serde_json::Value>,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        match self {
            RelayError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                Json(ValidationErrorBody {
                    message: "validation_error",
                    errors,
                }),
            )
                .into_response(),
            RelayError::NotFound { resource } => envelope(
                StatusCode::NOT_FOUND,
                format!("{resource}_not_found"),
            ),
            RelayError::RouteNotFound => {
                envelope(StatusCode::NOT_FOUND, "not_found".to_string())
            }
            RelayError::MethodNotAllowed => envelope(
                StatusCode::METHOD_NOT_ALLOWED,
                "method_not_allowed".to_string(),
            ),
            RelayError::PayloadTooLarge => envelope(
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large".to_string(),
            ),
            RelayError::Database(e) => {
                tracing::error!(error = %e, "Request failed with a database error");
                envelope(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    INTERNAL_ERROR_MESSAGE.to_string(),
                )
            }
            RelayError::Internal(e) => {
                tracing::error!(error = %e, "Request failed with an internal error");
                envelope(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    INTERNAL_ERROR_MESSAGE.to_string(),
                )
            }
        }
    }
}

fn envelope(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(ErrorBody {
            message,
            data: None,
        }),
    )
        .into_response()
}

pub type ApiResult<T> = Result<T, RelayError>;
