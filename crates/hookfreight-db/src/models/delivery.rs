//! Delivery ledger database model.
//!
//! One row per forwarding attempt, append-only. Attempts for the same event
//! chain through `parent_delivery_id`; the uniqueness of
//! `(event_id, parent_delivery_id)` guarantees each attempt has at most one
//! successor even under concurrent writers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::DbError;

/// Database entity for a delivery attempt.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Delivery {
    pub id: Uuid,
    pub event_id: Uuid,
    pub parent_delivery_id: Option<Uuid>,
    pub status: String,
    pub destination_url: String,
    pub response_status: Option<i32>,
    pub response_headers: Option<serde_json::Value>,
    pub response_body: Option<Vec<u8>>,
    pub duration_ms: i64,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for recording a new delivery attempt.
#[derive(Debug, Clone)]
pub struct CreateDelivery {
    pub id: Uuid,
    pub event_id: Uuid,
    pub parent_delivery_id: Option<Uuid>,
    pub status: String,
    pub destination_url: String,
    pub response_status: Option<i32>,
    pub response_headers: Option<serde_json::Value>,
    pub response_body: Option<Vec<u8>>,
    pub duration_ms: i64,
    pub error_message: Option<String>,
}

impl Delivery {
    /// Record a delivery attempt.
    ///
    /// A concurrent duplicate for the same `(event_id, parent_delivery_id)`
    /// pair fails with `DbError::Conflict`.
    pub async fn create(pool: &PgPool, input: CreateDelivery) -> Result<Self, DbError> {
        sqlx::query_as(
            r#"
            INSERT INTO deliveries (
                id, event_id, parent_delivery_id, status, destination_url,
                response_status, response_headers, response_body,
                duration_ms, error_message
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(input.id)
        .bind(input.event_id)
        .bind(input.parent_delivery_id)
        .bind(&input.status)
        .bind(&input.destination_url)
        .bind(input.response_status)
        .bind(&input.response_headers)
        .bind(&input.response_body)
        .bind(input.duration_ms)
        .bind(&input.error_message)
        .fetch_one(pool)
        .await
        .map_err(|e| DbError::from_query(e, "delivery attempt"))
    }

    /// Find a delivery by id.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, DbError> {
        sqlx::query_as(
            r#"
            SELECT * FROM deliveries WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(DbError::QueryFailed)
    }

    /// List delivery attempts for an event, newest first.
    pub async fn list_by_event(
        pool: &PgPool,
        event_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, DbError> {
        sqlx::query_as(
            r#"
            SELECT * FROM deliveries
            WHERE event_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(event_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .map_err(DbError::QueryFailed)
    }
}
