//! Delivery scheduling over the durable job queue.
//!
//! The scheduler owns idempotent job submission, the exponential backoff
//! schedule, retention of finished jobs, and crash recovery. One instance
//! exists per process and is shared by the ingest handlers (enqueue on
//! capture), the replay API (manual retries), and the retention loop.

use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use hookfreight_core::{DeliveryId, EventId};
use hookfreight_db::models::{Delivery, DeliveryJob, Endpoint, Event, JobCounts, SubmitDeliveryJob};
use hookfreight_db::DbError;

use crate::error::RelayError;

/// Default maximum attempts per retry chain.
pub const DEFAULT_MAX_RETRIES: i32 = 5;

/// Base delay of the exponential backoff schedule.
const BACKOFF_BASE_MS: i64 = 1000;

/// Completed jobs are kept for 24 hours...
const COMPLETED_RETENTION_HOURS: i64 = 24;
/// ...and never more than this many rows regardless of age.
const COMPLETED_MAX_KEEP: i64 = 1000;
/// Failed jobs are kept for 7 days.
const FAILED_RETENTION_DAYS: i64 = 7;

/// Delay before retry attempt `retry_number` (1-based), in milliseconds:
/// `1000 * 2^(n-1)`.
#[must_use]
pub fn backoff_delay_ms(retry_number: i32) -> i64 {
    let exp = (retry_number - 1).clamp(0, 20);
    BACKOFF_BASE_MS << exp
}

/// Process-wide handle to the durable delivery queue.
#[derive(Clone)]
pub struct DeliveryScheduler {
    pool: PgPool,
    max_retries: i32,
}

impl DeliveryScheduler {
    /// Create a scheduler over the given pool.
    #[must_use]
    pub fn new(pool: PgPool, max_retries: i32) -> Self {
        Self { pool, max_retries }
    }

    /// The configured per-chain attempt budget.
    #[must_use]
    pub fn max_retries(&self) -> i32 {
        self.max_retries
    }

    /// Submit the delivery job for a freshly captured event.
    ///
    /// The job key is derived from the event id, so a duplicate ingest of
    /// the same event collapses into a single chain; `Ok(None)` means the
    /// job already existed.
    pub async fn enqueue(
        &self,
        event_id: Uuid,
        endpoint_id: Uuid,
    ) -> Result<Option<DeliveryJob>, DbError> {
        let job_key = format!("delivery-{}", EventId::from_uuid(event_id));
        let job = DeliveryJob::submit(
            &self.pool,
            SubmitDeliveryJob {
                job_key,
                event_id,
                endpoint_id,
                parent_delivery_id: None,
                max_retries: self.max_retries,
            },
        )
        .await?;

        if let Some(ref job) = job {
            tracing::debug!(
                target: "delivery",
                job_key = %job.job_key,
                event_id = %event_id,
                "Delivery job enqueued"
            );
        }
        Ok(job)
    }

    /// Submit a manual replay of a recorded delivery attempt.
    ///
    /// Resolves delivery → event → endpoint so a replay against a deleted
    /// referent fails with a 404 instead of producing a doomed job. The
    /// timestamp in the job key makes repeated replays of the same attempt
    /// distinct.
    pub async fn enqueue_retry(&self, delivery_id: Uuid) -> Result<DeliveryJob, RelayError> {
        let delivery = Delivery::find_by_id(&self.pool, delivery_id)
            .await?
            .ok_or_else(|| RelayError::not_found("delivery"))?;
        let event = Event::find_by_id(&self.pool, delivery.event_id)
            .await?
            .ok_or_else(|| RelayError::not_found("event"))?;
        let endpoint = Endpoint::find_by_id(&self.pool, event.endpoint_id)
            .await?
            .ok_or_else(|| RelayError::not_found("endpoint"))?;

        let job_key = format!(
            "retry-{}-{}",
            DeliveryId::from_uuid(delivery_id),
            Utc::now().timestamp_millis()
        );
        let job = DeliveryJob::submit(
            &self.pool,
            SubmitDeliveryJob {
                job_key,
                event_id: event.id,
                endpoint_id: endpoint.id,
                parent_delivery_id: Some(delivery_id),
                max_retries: self.max_retries,
            },
        )
        .await?
        .ok_or_else(|| RelayError::Internal("retry job key collided".to_string()))?;

        tracing::info!(
            target: "delivery",
            job_key = %job.job_key,
            delivery_id = %delivery_id,
            event_id = %event.id,
            "Manual retry enqueued"
        );
        Ok(job)
    }

    /// Current queue depth counts.
    pub async fn counts(&self) -> Result<JobCounts, DbError> {
        DeliveryJob::counts(&self.pool).await
    }

    /// Requeue jobs left active by an ungraceful exit. Run once at startup
    /// before the worker starts claiming.
    pub async fn requeue_interrupted(&self) -> Result<u64, DbError> {
        let requeued = DeliveryJob::requeue_interrupted(&self.pool).await?;
        if requeued > 0 {
            tracing::warn!(
                target: "delivery",
                requeued,
                "Requeued delivery jobs interrupted by a previous shutdown"
            );
        }
        Ok(requeued)
    }

    /// Apply the retention policy to finished jobs.
    pub async fn prune(&self) -> Result<u64, DbError> {
        let now = Utc::now();
        let completed = DeliveryJob::prune_completed(
            &self.pool,
            now - Duration::hours(COMPLETED_RETENTION_HOURS),
            COMPLETED_MAX_KEEP,
        )
        .await?;
        let failed =
            DeliveryJob::prune_failed(&self.pool, now - Duration::days(FAILED_RETENTION_DAYS))
                .await?;

        if completed + failed > 0 {
            tracing::debug!(
                target: "delivery",
                completed,
                failed,
                "Pruned finished delivery jobs"
            );
        }
        Ok(completed + failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_first_retry_is_one_second() {
        assert_eq!(backoff_delay_ms(1), 1000);
    }

    #[test]
    fn test_backoff_doubles_per_retry() {
        assert_eq!(backoff_delay_ms(2), 2000);
        assert_eq!(backoff_delay_ms(3), 4000);
        assert_eq!(backoff_delay_ms(4), 8000);
        assert_eq!(backoff_delay_ms(5), 16000);
    }

    #[test]
    fn test_backoff_clamps_degenerate_input() {
        assert_eq!(backoff_delay_ms(0), 1000);
        assert_eq!(backoff_delay_ms(-5), 1000);
    }

    #[test]
    fn test_backoff_does_not_overflow_for_large_attempts() {
        // Bounded by the exponent clamp rather than wrapping.
        assert_eq!(backoff_delay_ms(64), BACKOFF_BASE_MS << 20);
    }
}
