//! HTTP handlers: the ingest surface plus the management and read APIs.

pub mod apps;
pub mod deliveries;
pub mod endpoints;
pub mod events;
pub mod ingest;

use std::str::FromStr;

use hookfreight_core::ParseIdError;

use crate::error::{FieldError, RelayError};

/// Parse a prefixed public id from a path segment, surfacing a field-level
/// validation error on malformed input.
pub(crate) fn parse_id<T>(field: &str, raw: &str) -> Result<T, RelayError>
where
    T: FromStr<Err = ParseIdError>,
{
    raw.parse().map_err(|e: ParseIdError| {
        RelayError::invalid_field(
            FieldError::new(field, "invalid_id", e.message)
                .expected(format!("{}_<32 hex>", e.expected_prefix))
                .received(raw),
        )
    })
}
