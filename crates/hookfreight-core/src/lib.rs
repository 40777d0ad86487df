//! Core shared types for HookFreight.
//!
//! Currently this is the home of the strongly-typed public identifiers used
//! at every API boundary. Keeping them in a leaf crate lets both the
//! persistence layer and the relay pipeline depend on them without cycles.

pub mod ids;

pub use ids::{
    AppId, DeliveryId, EndpointId, EventId, HookToken, ParseIdError, HOOK_TOKEN_LEN,
};
