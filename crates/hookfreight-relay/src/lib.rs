//! Capture-and-delivery pipeline for HookFreight.
//!
//! The relay turns any inbound HTTP request at `/{hook_token}` into an
//! immutable persisted event, schedules a forwarding job on the durable
//! queue, and records every delivery attempt for inspection and replay.
//!
//! ## Pipeline
//!
//! Inbound request → event store (durable) → scheduler enqueue → worker
//! claims the job → HTTP forward → delivery record written → the outcome
//! either completes the job or re-enqueues it with exponential backoff.
//!
//! ## Retry chains
//!
//! Attempts for one event link through `parent_delivery_id`. Between
//! attempts the job payload is rewritten to point at the delivery record
//! just produced, so the next attempt chains onto it. Client-error (4xx)
//! responses terminate the chain immediately; transport failures,
//! timeouts, and 5xx responses consume one of the bounded retries.

pub mod body;
pub mod error;
pub mod handlers;
pub mod headers;
pub mod models;
pub mod router;
pub mod services;
pub mod worker;

pub use error::{FieldError, RelayError, INTERNAL_ERROR_MESSAGE};
pub use models::{ApiMessage, DeliveryStatus};
pub use router::{relay_router, RelayState};
pub use services::forwarder::{ForwardOutcome, ForwardRequest, Forwarder};
pub use services::scheduler::{backoff_delay_ms, DeliveryScheduler, DEFAULT_MAX_RETRIES};
pub use worker::DeliveryWorker;
