//! PostgreSQL persistence for HookFreight.
//!
//! Four collections back the capture-and-delivery pipeline (apps,
//! endpoints, captured events, and the delivery ledger) plus the durable
//! delivery job queue. Events and deliveries are append-only; the queue is
//! the only mutable table and doubles as the scheduler's source of truth
//! across restarts.

pub mod error;
pub mod migrations;
pub mod models;
pub mod pool;

pub use error::DbError;
pub use migrations::run_migrations;
pub use pool::{DbPool, DbPoolOptions};
