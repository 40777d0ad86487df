//! Prefixed public identifiers.
//!
//! Every entity exposed over the API carries an opaque public id of the form
//! `<prefix>_<32 hex>` (a UUIDv4 with the dashes stripped). The prefix makes
//! ids self-describing in logs and URLs while the hex tail maps bijectively
//! onto the storage-native UUID key, so no separate lookup table is needed.
//!
//! # Example
//!
//! ```
//! use hookfreight_core::EventId;
//!
//! let id = EventId::new();
//! let s = id.to_string();
//! assert!(s.starts_with("evt_"));
//! assert_eq!(s.len(), 4 + 32);
//!
//! let parsed: EventId = s.parse().unwrap();
//! assert_eq!(parsed, id);
//! ```

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Error type for public id parsing failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of id that failed to parse.
    pub id_type: &'static str,
    /// The prefix the id type expects.
    pub expected_prefix: &'static str,
    /// What went wrong.
    pub message: String,
}

impl Display for ParseIdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to parse {}: {}", self.id_type, self.message)
    }
}

impl std::error::Error for ParseIdError {}

/// Macro to define a prefixed public id type backed by a UUID.
macro_rules! define_public_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(Uuid);

        impl $name {
            /// The prefix this id type renders with (without the underscore).
            pub const PREFIX: &'static str = $prefix;

            /// Creates a new random id using UUID v4.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an id from an existing storage UUID.
            #[must_use]
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying storage UUID.
            #[must_use]
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}_{}", $prefix, self.0.simple())
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                let err = |message: String| ParseIdError {
                    id_type: stringify!($name),
                    expected_prefix: $prefix,
                    message,
                };

                let hex = s.strip_prefix(concat!($prefix, "_")).ok_or_else(|| {
                    err(format!("expected prefix '{}_'", $prefix))
                })?;

                if hex.len() != 32 {
                    return Err(err(format!(
                        "expected 32 hex characters after the prefix, got {}",
                        hex.len()
                    )));
                }

                Uuid::try_parse(hex)
                    .map(Self)
                    .map_err(|e| err(e.to_string()))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(de::Error::custom)
            }
        }
    };
}

define_public_id!(
    /// Public identifier for an application (`app_` + 32 hex).
    AppId,
    "app"
);

define_public_id!(
    /// Public identifier for an endpoint (`end_` + 32 hex).
    EndpointId,
    "end"
);

define_public_id!(
    /// Public identifier for a captured event (`evt_` + 32 hex).
    EventId,
    "evt"
);

define_public_id!(
    /// Public identifier for a delivery attempt (`dlv_` + 32 hex).
    DeliveryId,
    "dlv"
);

// ---------------------------------------------------------------------------
// Hook token
// ---------------------------------------------------------------------------

/// Length of a hook token in characters.
pub const HOOK_TOKEN_LEN: usize = 24;

/// The opaque token embedded in an endpoint's capture URL.
///
/// 24 lowercase hex characters, globally unique, immutable once assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct HookToken(String);

impl HookToken {
    /// Generate a fresh random token.
    ///
    /// Takes the leading 24 characters of a UUIDv4 simple encoding, which
    /// keeps the token URL-safe without an extra randomness dependency.
    #[must_use]
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(hex[..HOOK_TOKEN_LEN].to_string())
    }

    /// Whether `s` has the shape of a hook token: exactly 24 lowercase hex
    /// characters.
    #[must_use]
    pub fn is_valid(s: &str) -> bool {
        s.len() == HOOK_TOKEN_LEN
            && s.bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    }

    /// Parse a token, rejecting anything that is not 24 lowercase hex chars.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::is_valid(s).then(|| Self(s.to_string()))
    }

    /// The token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for HookToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod public_id_tests {
        use super::*;

        #[test]
        fn test_new_renders_prefix_and_32_hex() {
            let id = EventId::new();
            let s = id.to_string();
            assert!(s.starts_with("evt_"));
            assert_eq!(s.len(), 36);
            assert!(s[4..].bytes().all(|b| b.is_ascii_hexdigit()));
        }

        #[test]
        fn test_roundtrip_through_string() {
            let id = DeliveryId::new();
            let parsed: DeliveryId = id.to_string().parse().unwrap();
            assert_eq!(parsed, id);
            assert_eq!(parsed.as_uuid(), id.as_uuid());
        }

        #[test]
        fn test_from_uuid_preserves_value() {
            let uuid = Uuid::new_v4();
            let id = AppId::from_uuid(uuid);
            assert_eq!(id.as_uuid(), uuid);
        }

        #[test]
        fn test_wrong_prefix_rejected() {
            let s = EventId::new().to_string();
            let result: Result<DeliveryId, _> = s.parse();
            let err = result.unwrap_err();
            assert_eq!(err.id_type, "DeliveryId");
            assert_eq!(err.expected_prefix, "dlv");
        }

        #[test]
        fn test_short_hex_rejected() {
            let result: Result<EndpointId, _> = "end_abc123".parse();
            assert!(result.is_err());
        }

        #[test]
        fn test_dashed_uuid_rejected() {
            let dashed = format!("app_{}", Uuid::new_v4());
            let result: Result<AppId, _> = dashed.parse();
            assert!(result.is_err());
        }

        #[test]
        fn test_serializes_as_prefixed_string() {
            let uuid = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
            let id = EventId::from_uuid(uuid);
            let json = serde_json::to_string(&id).unwrap();
            assert_eq!(json, "\"evt_550e8400e29b41d4a716446655440000\"");
        }

        #[test]
        fn test_deserializes_from_prefixed_string() {
            let id: EventId =
                serde_json::from_str("\"evt_550e8400e29b41d4a716446655440000\"").unwrap();
            assert_eq!(
                id.as_uuid(),
                Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap()
            );
        }

        #[test]
        fn test_deserialize_rejects_bare_uuid() {
            let result: Result<EventId, _> =
                serde_json::from_str("\"550e8400-e29b-41d4-a716-446655440000\"");
            assert!(result.is_err());
        }
    }

    mod hook_token_tests {
        use super::*;

        #[test]
        fn test_generate_shape() {
            let token = HookToken::generate();
            assert_eq!(token.as_str().len(), HOOK_TOKEN_LEN);
            assert!(HookToken::is_valid(token.as_str()));
        }

        #[test]
        fn test_generate_is_random() {
            assert_ne!(HookToken::generate(), HookToken::generate());
        }

        #[test]
        fn test_rejects_uppercase_hex() {
            assert!(!HookToken::is_valid("A1B2C3D4E5F6A1B2C3D4E5F6"));
        }

        #[test]
        fn test_rejects_wrong_length() {
            assert!(!HookToken::is_valid("a1b2c3"));
            assert!(!HookToken::is_valid("a1b2c3d4e5f6a1b2c3d4e5f6aa"));
        }

        #[test]
        fn test_rejects_non_hex() {
            assert!(!HookToken::is_valid("g1b2c3d4e5f6a1b2c3d4e5f6"));
        }

        #[test]
        fn test_parse_accepts_valid() {
            let token = HookToken::parse("a1b2c3d4e5f6a1b2c3d4e5f6").unwrap();
            assert_eq!(token.as_str(), "a1b2c3d4e5f6a1b2c3d4e5f6");
        }
    }
}
