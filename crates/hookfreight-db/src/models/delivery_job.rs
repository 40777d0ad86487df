//! Durable delivery queue model.
//!
//! Jobs survive process restarts: queued work lives in the `delivery_jobs`
//! table and is claimed with `FOR UPDATE SKIP LOCKED` so multiple pollers
//! never hand the same job to two workers. `job_key` carries the
//! idempotency key; submitting a duplicate key is a no-op.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::DbError;

/// Database entity for a queued delivery job.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DeliveryJob {
    pub id: Uuid,
    pub job_key: String,
    pub event_id: Uuid,
    pub endpoint_id: Uuid,
    pub parent_delivery_id: Option<Uuid>,
    pub status: String,
    pub attempt_count: i32,
    pub max_retries: i32,
    pub run_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Input for submitting a new job.
#[derive(Debug, Clone)]
pub struct SubmitDeliveryJob {
    pub job_key: String,
    pub event_id: Uuid,
    pub endpoint_id: Uuid,
    pub parent_delivery_id: Option<Uuid>,
    pub max_retries: i32,
}

/// Queue depth counts, grouped the way operators read them.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct JobCounts {
    pub waiting: i64,
    pub active: i64,
    pub completed: i64,
    pub failed: i64,
    pub delayed: i64,
}

impl DeliveryJob {
    /// Submit a job. Returns `None` when a job with the same key already
    /// exists, which is how duplicate ingests collapse into one chain.
    pub async fn submit(
        pool: &PgPool,
        input: SubmitDeliveryJob,
    ) -> Result<Option<Self>, DbError> {
        sqlx::query_as(
            r#"
            INSERT INTO delivery_jobs (
                id, job_key, event_id, endpoint_id, parent_delivery_id,
                max_retries
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (job_key) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.job_key)
        .bind(input.event_id)
        .bind(input.endpoint_id)
        .bind(input.parent_delivery_id)
        .bind(input.max_retries)
        .fetch_optional(pool)
        .await
        .map_err(DbError::QueryFailed)
    }

    /// Claim up to `limit` due jobs, marking them active.
    pub async fn claim_due(pool: &PgPool, limit: i64) -> Result<Vec<Self>, DbError> {
        sqlx::query_as(
            r#"
            UPDATE delivery_jobs
            SET status = 'active', updated_at = NOW()
            WHERE id IN (
                SELECT id FROM delivery_jobs
                WHERE status = 'waiting' AND run_at <= NOW()
                ORDER BY run_at
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(DbError::QueryFailed)
    }

    /// Return an active job to the waiting state for its next attempt.
    ///
    /// `parent_delivery_id` is rewritten to the delivery record the attempt
    /// just produced so the next attempt links into the chain.
    pub async fn reschedule(
        pool: &PgPool,
        id: Uuid,
        parent_delivery_id: Option<Uuid>,
        attempt_count: i32,
        run_at: DateTime<Utc>,
        last_error: &str,
    ) -> Result<(), DbError> {
        sqlx::query(
            r#"
            UPDATE delivery_jobs
            SET
                status = 'waiting',
                parent_delivery_id = $2,
                attempt_count = $3,
                run_at = $4,
                last_error = $5,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(parent_delivery_id)
        .bind(attempt_count)
        .bind(run_at)
        .bind(last_error)
        .execute(pool)
        .await
        .map_err(DbError::QueryFailed)?;

        Ok(())
    }

    /// Mark a job completed (delivered, or terminally failed without a
    /// retry budget question, e.g. a 4xx response or a missing referent).
    pub async fn complete(
        pool: &PgPool,
        id: Uuid,
        attempt_count: i32,
        last_error: Option<&str>,
    ) -> Result<(), DbError> {
        sqlx::query(
            r#"
            UPDATE delivery_jobs
            SET
                status = 'completed',
                attempt_count = $2,
                last_error = $3,
                updated_at = NOW(),
                completed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(attempt_count)
        .bind(last_error)
        .execute(pool)
        .await
        .map_err(DbError::QueryFailed)?;

        Ok(())
    }

    /// Mark a job failed after its retry budget is exhausted.
    pub async fn fail(
        pool: &PgPool,
        id: Uuid,
        attempt_count: i32,
        last_error: &str,
    ) -> Result<(), DbError> {
        sqlx::query(
            r#"
            UPDATE delivery_jobs
            SET
                status = 'failed',
                attempt_count = $2,
                last_error = $3,
                updated_at = NOW(),
                completed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(attempt_count)
        .bind(last_error)
        .execute(pool)
        .await
        .map_err(DbError::QueryFailed)?;

        Ok(())
    }

    /// Requeue jobs left active by an ungraceful exit. Called once on
    /// startup, before the worker begins claiming; re-receipt of these jobs
    /// is expected (at-least-once).
    pub async fn requeue_interrupted(pool: &PgPool) -> Result<u64, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE delivery_jobs
            SET status = 'waiting', updated_at = NOW()
            WHERE status = 'active'
            "#,
        )
        .execute(pool)
        .await
        .map_err(DbError::QueryFailed)?;

        Ok(result.rows_affected())
    }

    /// Current queue counts. `delayed` is the waiting subset whose `run_at`
    /// is still in the future (scheduled retries).
    pub async fn counts(pool: &PgPool) -> Result<JobCounts, DbError> {
        let row: (i64, i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'waiting' AND run_at <= NOW()),
                COUNT(*) FILTER (WHERE status = 'active'),
                COUNT(*) FILTER (WHERE status = 'completed'),
                COUNT(*) FILTER (WHERE status = 'failed'),
                COUNT(*) FILTER (WHERE status = 'waiting' AND run_at > NOW())
            FROM delivery_jobs
            "#,
        )
        .fetch_one(pool)
        .await
        .map_err(DbError::QueryFailed)?;

        Ok(JobCounts {
            waiting: row.0,
            active: row.1,
            completed: row.2,
            failed: row.3,
            delayed: row.4,
        })
    }

    /// Prune completed jobs past the retention window, and cap the number
    /// of retained completed jobs regardless of age.
    pub async fn prune_completed(
        pool: &PgPool,
        older_than: DateTime<Utc>,
        max_keep: i64,
    ) -> Result<u64, DbError> {
        let aged = sqlx::query(
            r#"
            DELETE FROM delivery_jobs
            WHERE status = 'completed' AND completed_at < $1
            "#,
        )
        .bind(older_than)
        .execute(pool)
        .await
        .map_err(DbError::QueryFailed)?
        .rows_affected();

        let overflow = sqlx::query(
            r#"
            DELETE FROM delivery_jobs
            WHERE status = 'completed'
              AND id NOT IN (
                SELECT id FROM delivery_jobs
                WHERE status = 'completed'
                ORDER BY completed_at DESC
                LIMIT $1
            )
            "#,
        )
        .bind(max_keep)
        .execute(pool)
        .await
        .map_err(DbError::QueryFailed)?
        .rows_affected();

        Ok(aged + overflow)
    }

    /// Prune failed jobs past the retention window.
    pub async fn prune_failed(
        pool: &PgPool,
        older_than: DateTime<Utc>,
    ) -> Result<u64, DbError> {
        let result = sqlx::query(
            r#"
            DELETE FROM delivery_jobs
            WHERE status = 'failed' AND completed_at < $1
            "#,
        )
        .bind(older_than)
        .execute(pool)
        .await
        .map_err(DbError::QueryFailed)?;

        Ok(result.rows_affected())
    }
}
