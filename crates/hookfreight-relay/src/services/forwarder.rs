//! Outbound forwarding and outcome classification.
//!
//! The forwarder replays a captured request against its endpoint's
//! destination: original method, verbatim body bytes, and a small
//! allow-list of the original headers plus the forwarding markers. The
//! outcome of every attempt is classified into the delivery status and a
//! retryability verdict; classification never throws on non-2xx responses.

use std::time::{Duration, Instant};

use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use url::Url;

use crate::error::RelayError;
use crate::headers;
use crate::models::DeliveryStatus;

/// Original-request headers copied onto the forwarded request.
const FORWARD_HEADER_ALLOWLIST: [&str; 4] =
    ["content-type", "content-encoding", "accept", "user-agent"];

/// Marker header identifying relayed traffic.
const FORWARDED_MARKER_HEADER: &str = "x-hookfreight-forwarded";

/// Marker header carrying the forwarding timestamp.
const FORWARDED_TIMESTAMP_HEADER: &str = "x-hookfreight-timestamp";

/// Cap on how much of a destination's response body is recorded.
const MAX_RESPONSE_BODY_BYTES: usize = 65536;

/// The concrete request one delivery attempt executes.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub timeout: Duration,
}

/// Classified result of one forwarding attempt.
#[derive(Debug, Clone)]
pub struct ForwardOutcome {
    pub status: DeliveryStatus,
    pub response_status: Option<i32>,
    pub response_headers: Option<serde_json::Value>,
    pub response_body: Option<Vec<u8>>,
    pub error_message: Option<String>,
    pub retryable: bool,
    pub duration_ms: i64,
}

/// Executes forwarding attempts against a shared HTTP client.
#[derive(Clone)]
pub struct Forwarder {
    http_client: Client,
    base_url: Url,
}

impl Forwarder {
    /// Create a forwarder. `base_url` is the system's public base URL used
    /// by the self-forward guard.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Internal` if the HTTP client cannot be built.
    pub fn new(base_url: Url) -> Result<Self, RelayError> {
        let http_client = Client::builder()
            .user_agent(concat!("hookfreight/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| RelayError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    /// Whether forwarding to `target` would loop straight back into our own
    /// ingest surface: same host:port as the public base URL (with default
    /// ports inferred from the scheme) and a path shaped like a hook token.
    #[must_use]
    pub fn is_self_forward(&self, target: &Url) -> bool {
        let same_host = match (self.base_url.host_str(), target.host_str()) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            _ => false,
        };
        same_host
            && self.base_url.port_or_known_default() == target.port_or_known_default()
            && path_is_hook_token(target.path())
    }

    /// Execute one forwarding attempt. Never fails on non-2xx responses;
    /// every outcome is classified instead.
    pub async fn execute(&self, request: ForwardRequest) -> ForwardOutcome {
        let timeout_ms = request.timeout.as_millis();
        let started = Instant::now();

        let result = self
            .http_client
            .request(request.method, &request.url)
            .headers(request.headers)
            .timeout(request.timeout)
            .body(request.body)
            .send()
            .await;

        match result {
            Ok(response) => {
                let code = response.status().as_u16();
                let response_headers = headers::headers_to_json(response.headers());

                match response.bytes().await {
                    Ok(bytes) => {
                        let duration_ms = started.elapsed().as_millis() as i64;
                        let mut body = bytes.to_vec();
                        body.truncate(MAX_RESPONSE_BODY_BYTES);

                        let (status, retryable) = classify_response(code);
                        let error_message = match status {
                            DeliveryStatus::Delivered => None,
                            _ => Some(format!("HTTP {code}")),
                        };

                        ForwardOutcome {
                            status,
                            response_status: Some(i32::from(code)),
                            response_headers: Some(response_headers),
                            response_body: Some(body),
                            error_message,
                            retryable,
                            duration_ms,
                        }
                    }
                    Err(e) => {
                        self.transport_outcome(e, timeout_ms, started.elapsed().as_millis() as i64)
                    }
                }
            }
            Err(e) => self.transport_outcome(e, timeout_ms, started.elapsed().as_millis() as i64),
        }
    }

    fn transport_outcome(
        &self,
        error: reqwest::Error,
        timeout_ms: u128,
        duration_ms: i64,
    ) -> ForwardOutcome {
        let (status, error_message) = if error.is_timeout() {
            (
                DeliveryStatus::Timeout,
                format!("request timed out after {timeout_ms} ms"),
            )
        } else if error.is_connect() {
            (DeliveryStatus::Failed, format!("Connection failed: {error}"))
        } else {
            (DeliveryStatus::Failed, format!("Request error: {error}"))
        };

        ForwardOutcome {
            status,
            response_status: None,
            response_headers: None,
            response_body: None,
            error_message: Some(error_message),
            retryable: true,
            duration_ms,
        }
    }
}

/// Map a destination's status code to the delivery status and whether a
/// further attempt can help.
#[must_use]
pub fn classify_response(code: u16) -> (DeliveryStatus, bool) {
    match code {
        200..=299 => (DeliveryStatus::Delivered, false),
        // Client errors are terminal: the destination rejected the request
        // and will keep rejecting it.
        400..=499 => (DeliveryStatus::Failed, false),
        _ => (DeliveryStatus::Failed, true),
    }
}

/// Build the outbound header set for a captured event.
///
/// Copies only the allow-listed headers from the original request (first
/// value of multi-value headers), adds the two forwarding markers, and
/// applies the endpoint's static auth header last so it overrides any
/// copied value.
#[must_use]
pub fn build_forward_headers(
    stored_headers: &serde_json::Value,
    auth: Option<(&str, &str)>,
) -> HeaderMap {
    let mut out = HeaderMap::new();

    for name in FORWARD_HEADER_ALLOWLIST {
        if let Some(value) = headers::first_value(stored_headers, name) {
            insert_header(&mut out, name, value);
        }
    }

    insert_header(&mut out, FORWARDED_MARKER_HEADER, "true");
    insert_header(
        &mut out,
        FORWARDED_TIMESTAMP_HEADER,
        &Utc::now().to_rfc3339(),
    );

    if let Some((name, value)) = auth {
        insert_header(&mut out, name, value);
    }

    out
}

fn insert_header(map: &mut HeaderMap, name: &str, value: &str) {
    if let (Ok(name), Ok(value)) = (
        HeaderName::from_bytes(name.as_bytes()),
        HeaderValue::from_str(value),
    ) {
        map.insert(name, value);
    }
}

fn path_is_hook_token(path: &str) -> bool {
    match path.strip_prefix('/') {
        Some(token) => token.len() == 24 && token.bytes().all(|b| b.is_ascii_hexdigit()),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forwarder(base: &str) -> Forwarder {
        Forwarder::new(Url::parse(base).unwrap()).unwrap()
    }

    mod classification {
        use super::*;

        #[test]
        fn test_2xx_is_delivered() {
            for code in [200, 201, 204, 299] {
                assert_eq!(classify_response(code), (DeliveryStatus::Delivered, false));
            }
        }

        #[test]
        fn test_4xx_is_terminal_failure() {
            for code in [400, 404, 410, 422, 429, 499] {
                assert_eq!(classify_response(code), (DeliveryStatus::Failed, false));
            }
        }

        #[test]
        fn test_5xx_is_retryable_failure() {
            for code in [500, 502, 503, 504] {
                assert_eq!(classify_response(code), (DeliveryStatus::Failed, true));
            }
        }

        #[test]
        fn test_redirects_are_retryable() {
            assert_eq!(classify_response(301), (DeliveryStatus::Failed, true));
        }
    }

    mod self_forward_guard {
        use super::*;

        #[test]
        fn test_own_hook_url_is_refused() {
            let f = forwarder("http://localhost:3030");
            let target = Url::parse("http://localhost:3030/deadbeefdeadbeefdeadbeef").unwrap();
            assert!(f.is_self_forward(&target));
        }

        #[test]
        fn test_uppercase_hex_path_is_refused() {
            let f = forwarder("http://localhost:3030");
            let target = Url::parse("http://localhost:3030/DEADBEEFDEADBEEFDEADBEEF").unwrap();
            assert!(f.is_self_forward(&target));
        }

        #[test]
        fn test_default_port_inference() {
            let f = forwarder("http://relay.example.com");
            let target =
                Url::parse("http://relay.example.com:80/deadbeefdeadbeefdeadbeef").unwrap();
            assert!(f.is_self_forward(&target));
        }

        #[test]
        fn test_different_port_is_allowed() {
            let f = forwarder("http://localhost:3030");
            let target = Url::parse("http://localhost:8080/deadbeefdeadbeefdeadbeef").unwrap();
            assert!(!f.is_self_forward(&target));
        }

        #[test]
        fn test_different_host_is_allowed() {
            let f = forwarder("http://localhost:3030");
            let target = Url::parse("http://example.com:3030/deadbeefdeadbeefdeadbeef").unwrap();
            assert!(!f.is_self_forward(&target));
        }

        #[test]
        fn test_non_token_path_on_own_host_is_allowed() {
            let f = forwarder("http://localhost:3030");
            for path in ["/api/apps", "/deadbeef", "/deadbeefdeadbeefdeadbeef/x"] {
                let target = Url::parse(&format!("http://localhost:3030{path}")).unwrap();
                assert!(!f.is_self_forward(&target), "path {path} should be allowed");
            }
        }

        #[test]
        fn test_host_comparison_ignores_case() {
            let f = forwarder("http://Localhost:3030");
            let target = Url::parse("http://localhost:3030/deadbeefdeadbeefdeadbeef").unwrap();
            assert!(f.is_self_forward(&target));
        }
    }

    mod header_building {
        use super::*;

        #[test]
        fn test_allowlist_copied_others_dropped() {
            let stored = serde_json::json!({
                "content-type": "application/json",
                "accept": "*/*",
                "x-secret-internal": "do-not-forward",
                "cookie": "session=abc",
            });
            let headers = build_forward_headers(&stored, None);

            assert_eq!(headers.get("content-type").unwrap(), "application/json");
            assert_eq!(headers.get("accept").unwrap(), "*/*");
            assert!(headers.get("x-secret-internal").is_none());
            assert!(headers.get("cookie").is_none());
        }

        #[test]
        fn test_multi_value_collapses_to_first() {
            let stored = serde_json::json!({
                "accept": ["application/json", "text/html"],
            });
            let headers = build_forward_headers(&stored, None);
            assert_eq!(headers.get("accept").unwrap(), "application/json");
        }

        #[test]
        fn test_markers_present() {
            let headers = build_forward_headers(&serde_json::json!({}), None);
            assert_eq!(headers.get("x-hookfreight-forwarded").unwrap(), "true");
            assert!(headers.get("x-hookfreight-timestamp").is_some());
        }

        #[test]
        fn test_auth_header_overrides_copied_value() {
            let stored = serde_json::json!({
                "user-agent": "stripe-webhooks/1.0",
            });
            let headers =
                build_forward_headers(&stored, Some(("user-agent", "override")));
            assert_eq!(headers.get("user-agent").unwrap(), "override");
        }

        #[test]
        fn test_auth_header_added() {
            let headers = build_forward_headers(
                &serde_json::json!({}),
                Some(("authorization", "Bearer secret")),
            );
            assert_eq!(headers.get("authorization").unwrap(), "Bearer secret");
        }
    }
}
