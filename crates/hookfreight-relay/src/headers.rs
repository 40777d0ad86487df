//! Header and query capture helpers.
//!
//! Captured requests store headers and query strings as JSON maps: a key
//! with one value maps to a string, a repeated key maps to an array. Keys
//! are lowercased for headers (case-insensitive lookup) and kept verbatim
//! for query parameters.

use axum::http::HeaderMap;
use serde_json::{Map, Value};

/// Convert an HTTP header map to its stored JSON shape, preserving
/// multi-values. Non-UTF-8 header values are captured lossily.
#[must_use]
pub fn headers_to_json(headers: &HeaderMap) -> Value {
    let mut map: Map<String, Value> = Map::new();
    for (name, value) in headers {
        let name = name.as_str().to_lowercase();
        let value = String::from_utf8_lossy(value.as_bytes()).to_string();
        push_multi(&mut map, name, value);
    }
    Value::Object(map)
}

/// Convert a raw query string to its stored JSON shape.
#[must_use]
pub fn query_to_json(query: Option<&str>) -> Value {
    let mut map: Map<String, Value> = Map::new();
    if let Some(query) = query {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            push_multi(&mut map, key.to_string(), value.to_string());
        }
    }
    Value::Object(map)
}

/// First value for a key in a stored string-or-list map. Header lookups
/// pass lowercased names; stored header keys are already lowercased.
#[must_use]
pub fn first_value<'a>(map: &'a Value, key: &str) -> Option<&'a str> {
    match map.get(key)? {
        Value::String(s) => Some(s),
        Value::Array(values) => values.first().and_then(Value::as_str),
        _ => None,
    }
}

fn push_multi(map: &mut Map<String, Value>, key: String, value: String) {
    match map.get_mut(&key) {
        None => {
            map.insert(key, Value::String(value));
        }
        Some(Value::String(existing)) => {
            let first = std::mem::take(existing);
            map.insert(
                key,
                Value::Array(vec![Value::String(first), Value::String(value)]),
            );
        }
        Some(Value::Array(values)) => {
            values.push(Value::String(value));
        }
        Some(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::{HeaderName, HeaderValue};

    #[test]
    fn test_headers_lowercased_single_value() {
        let mut headers = HeaderMap::new();
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));

        let json = headers_to_json(&headers);
        assert_eq!(json["content-type"], "application/json");
    }

    #[test]
    fn test_headers_multi_value_becomes_array() {
        let mut headers = HeaderMap::new();
        let name = HeaderName::from_static("x-tag");
        headers.append(&name, HeaderValue::from_static("a"));
        headers.append(&name, HeaderValue::from_static("b"));
        headers.append(&name, HeaderValue::from_static("c"));

        let json = headers_to_json(&headers);
        assert_eq!(json["x-tag"], serde_json::json!(["a", "b", "c"]));
    }

    #[test]
    fn test_query_single_and_repeated_keys() {
        let json = query_to_json(Some("a=1&b=2&a=3"));
        assert_eq!(json["a"], serde_json::json!(["1", "3"]));
        assert_eq!(json["b"], "2");
    }

    #[test]
    fn test_query_decodes_percent_encoding() {
        let json = query_to_json(Some("q=hello%20world"));
        assert_eq!(json["q"], "hello world");
    }

    #[test]
    fn test_query_absent() {
        assert_eq!(query_to_json(None), serde_json::json!({}));
    }

    #[test]
    fn test_first_value_string_and_array() {
        let map = serde_json::json!({
            "content-type": "application/json",
            "x-tag": ["a", "b"],
        });
        assert_eq!(first_value(&map, "content-type"), Some("application/json"));
        assert_eq!(first_value(&map, "x-tag"), Some("a"));
        assert_eq!(first_value(&map, "missing"), None);
    }
}
