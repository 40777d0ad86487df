//! Application database model.
//!
//! Apps group endpoints; deleting an app cascades to its endpoints and
//! their events inside a single transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::DbError;

/// Endpoint-id batch size used by the cascade delete.
const CASCADE_BATCH_SIZE: i64 = 1000;

/// Database entity for an application.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct App {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl App {
    /// Create a new app.
    pub async fn create(pool: &PgPool, id: Uuid, name: &str) -> Result<Self, DbError> {
        sqlx::query_as(
            r#"
            INSERT INTO apps (id, name)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(name)
        .fetch_one(pool)
        .await
        .map_err(DbError::QueryFailed)
    }

    /// Find an app by id.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, DbError> {
        sqlx::query_as(
            r#"
            SELECT * FROM apps WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(DbError::QueryFailed)
    }

    /// List apps with pagination, newest first.
    pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Self>, DbError> {
        sqlx::query_as(
            r#"
            SELECT * FROM apps
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .map_err(DbError::QueryFailed)
    }

    /// Delete an app together with its endpoints and their events.
    ///
    /// Runs inside one transaction: the app row goes first, then endpoint
    /// ids are streamed in keyset batches of up to 1000 and their events
    /// deleted, and only after all batches are the endpoints themselves
    /// removed. The `endpoints.app_id` FK is `DEFERRABLE INITIALLY
    /// DEFERRED`, so the constraint is checked at commit, after the
    /// endpoints are gone. Deliveries are left for later garbage
    /// collection.
    ///
    /// Returns `false` if no app with the given id existed.
    pub async fn delete_cascade(pool: &PgPool, id: Uuid) -> Result<bool, DbError> {
        let mut tx = pool.begin().await.map_err(DbError::QueryFailed)?;

        let deleted = sqlx::query("DELETE FROM apps WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(DbError::QueryFailed)?
            .rows_affected();

        if deleted == 0 {
            tx.rollback().await.map_err(DbError::QueryFailed)?;
            return Ok(false);
        }

        let mut last_endpoint: Option<Uuid> = None;
        loop {
            let batch: Vec<(Uuid,)> = sqlx::query_as(
                r#"
                SELECT id FROM endpoints
                WHERE app_id = $1 AND ($2::uuid IS NULL OR id > $2)
                ORDER BY id
                LIMIT $3
                "#,
            )
            .bind(id)
            .bind(last_endpoint)
            .bind(CASCADE_BATCH_SIZE)
            .fetch_all(&mut *tx)
            .await
            .map_err(DbError::QueryFailed)?;

            if batch.is_empty() {
                break;
            }

            let ids: Vec<Uuid> = batch.iter().map(|r| r.0).collect();
            sqlx::query("DELETE FROM events WHERE endpoint_id = ANY($1)")
                .bind(&ids)
                .execute(&mut *tx)
                .await
                .map_err(DbError::QueryFailed)?;

            last_endpoint = ids.last().copied();
            if (batch.len() as i64) < CASCADE_BATCH_SIZE {
                break;
            }
        }

        sqlx::query("DELETE FROM endpoints WHERE app_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(DbError::QueryFailed)?;

        tx.commit().await.map_err(DbError::QueryFailed)?;
        Ok(true)
    }
}
