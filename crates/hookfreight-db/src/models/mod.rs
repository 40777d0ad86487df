//! Database entity models.
//!
//! One module per table; models expose async associated functions over a
//! `PgPool` and raw SQL with `RETURNING *`.

pub mod app;
pub mod delivery;
pub mod delivery_job;
pub mod endpoint;
pub mod event;

pub use app::App;
pub use delivery::{CreateDelivery, Delivery};
pub use delivery_job::{DeliveryJob, JobCounts, SubmitDeliveryJob};
pub use endpoint::{CreateEndpoint, Endpoint, UpdateEndpoint};
pub use event::{CreateEvent, Event};
