//! Best-effort body projection for API consumption.
//!
//! Stored bodies are opaque byte buffers; these helpers produce the JSON
//! representation the read APIs return without ever touching what is
//! persisted.

use std::io::Read;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::Value;

use crate::headers;

/// Decode a body according to its `Content-Encoding`.
///
/// Supports `gzip`, `deflate` (zlib-wrapped or raw), and `br`. `identity`,
/// unknown encodings, and decode failures all pass the bytes through
/// untouched.
#[must_use]
pub fn decode_content(encoding: Option<&str>, body: &[u8]) -> Vec<u8> {
    let encoding = encoding.map(str::trim).map(str::to_ascii_lowercase);
    match encoding.as_deref() {
        Some("gzip") => {
            let mut out = Vec::new();
            match flate2::read::GzDecoder::new(body).read_to_end(&mut out) {
                Ok(_) => out,
                Err(_) => body.to_vec(),
            }
        }
        Some("deflate") => {
            let mut out = Vec::new();
            if flate2::read::ZlibDecoder::new(body)
                .read_to_end(&mut out)
                .is_ok()
            {
                return out;
            }
            // Some producers send raw deflate without the zlib wrapper.
            out.clear();
            match flate2::read::DeflateDecoder::new(body).read_to_end(&mut out) {
                Ok(_) => out,
                Err(_) => body.to_vec(),
            }
        }
        Some("br") => {
            let mut out = Vec::new();
            match brotli::Decompressor::new(body, 4096).read_to_end(&mut out) {
                Ok(_) => out,
                Err(_) => body.to_vec(),
            }
        }
        _ => body.to_vec(),
    }
}

/// Project raw bytes for API output: empty becomes null, valid UTF-8 that
/// parses as JSON becomes the parsed value, other UTF-8 becomes a string,
/// and binary data becomes a base64 string.
#[must_use]
pub fn project_bytes(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.to_string())),
        Err(_) => Value::String(BASE64.encode(bytes)),
    }
}

/// Project a captured event body using its stored headers.
///
/// The body is decoded per `Content-Encoding` first. JSON parsing is only
/// attempted when `Content-Type` indicates JSON or the first non-whitespace
/// byte looks like a JSON container; everything else falls back to the raw
/// representation.
#[must_use]
pub fn project_event_body(stored_headers: &Value, body: &[u8]) -> Value {
    let encoding = headers::first_value(stored_headers, "content-encoding");
    let decoded = decode_content(encoding, body);

    if decoded.is_empty() {
        return Value::Null;
    }

    let content_type = headers::first_value(stored_headers, "content-type");
    if looks_like_json(content_type, &decoded) {
        if let Ok(s) = std::str::from_utf8(&decoded) {
            if let Ok(value) = serde_json::from_str(s) {
                return value;
            }
        }
    }

    match std::str::from_utf8(&decoded) {
        Ok(s) => Value::String(s.to_string()),
        Err(_) => Value::String(BASE64.encode(&decoded)),
    }
}

fn looks_like_json(content_type: Option<&str>, body: &[u8]) -> bool {
    if let Some(ct) = content_type {
        if ct.to_ascii_lowercase().contains("json") {
            return true;
        }
    }
    matches!(
        body.iter().find(|b| !b.is_ascii_whitespace()),
        Some(b'{') | Some(b'[')
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::{GzEncoder, ZlibEncoder};
    use flate2::Compression;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn test_decode_gzip() {
        let compressed = gzip(b"hello world");
        assert_eq!(decode_content(Some("gzip"), &compressed), b"hello world");
    }

    #[test]
    fn test_decode_deflate_zlib_wrapped() {
        let compressed = zlib(b"hello world");
        assert_eq!(decode_content(Some("deflate"), &compressed), b"hello world");
    }

    #[test]
    fn test_decode_identity_passthrough() {
        assert_eq!(decode_content(Some("identity"), b"abc"), b"abc");
    }

    #[test]
    fn test_decode_unknown_encoding_passthrough() {
        assert_eq!(decode_content(Some("zstd"), b"abc"), b"abc");
    }

    #[test]
    fn test_decode_corrupt_gzip_passthrough() {
        assert_eq!(decode_content(Some("gzip"), b"not gzip"), b"not gzip");
    }

    #[test]
    fn test_project_empty_is_null() {
        assert_eq!(project_bytes(b""), Value::Null);
    }

    #[test]
    fn test_project_json_is_parsed() {
        assert_eq!(
            project_bytes(br#"{"x":1}"#),
            serde_json::json!({"x": 1})
        );
    }

    #[test]
    fn test_project_plain_text_is_string() {
        assert_eq!(project_bytes(b"plain text"), Value::String("plain text".into()));
    }

    #[test]
    fn test_project_binary_is_base64() {
        let value = project_bytes(&[0xff, 0xfe, 0x00]);
        assert_eq!(value, Value::String(BASE64.encode([0xff, 0xfe, 0x00])));
    }

    #[test]
    fn test_event_body_json_content_type() {
        let headers = serde_json::json!({"content-type": "application/json"});
        assert_eq!(
            project_event_body(&headers, br#"{"ok":true}"#),
            serde_json::json!({"ok": true})
        );
    }

    #[test]
    fn test_event_body_sniffs_json_without_content_type() {
        let headers = serde_json::json!({});
        assert_eq!(
            project_event_body(&headers, b"  [1, 2]"),
            serde_json::json!([1, 2])
        );
    }

    #[test]
    fn test_event_body_non_json_stays_string() {
        let headers = serde_json::json!({"content-type": "text/plain"});
        // "123" parses as JSON, but nothing marks it as JSON, so it must
        // stay a string.
        assert_eq!(
            project_event_body(&headers, b"123"),
            Value::String("123".into())
        );
    }

    #[test]
    fn test_event_body_gzip_then_json() {
        let headers = serde_json::json!({
            "content-type": "application/json",
            "content-encoding": "gzip",
        });
        let compressed = gzip(br#"{"n":7}"#);
        assert_eq!(
            project_event_body(&headers, &compressed),
            serde_json::json!({"n": 7})
        );
    }

    #[test]
    fn test_event_body_invalid_json_falls_back_to_string() {
        let headers = serde_json::json!({"content-type": "application/json"});
        assert_eq!(
            project_event_body(&headers, b"{broken"),
            Value::String("{broken".into())
        );
    }
}
