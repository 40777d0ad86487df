//! Captured event database model.
//!
//! Events are append-only: once written no field mutates. The body column
//! holds the exact bytes received on the wire, and `seq` is the internal
//! ordering key used to break `received_at` ties so pagination stays stable
//! under bursts sharing a millisecond.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::DbError;

/// Database entity for a captured event.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Event {
    pub seq: i64,
    pub id: Uuid,
    pub endpoint_id: Uuid,
    pub received_at: DateTime<Utc>,
    pub method: String,
    pub original_url: String,
    pub source_url: Option<String>,
    pub path: String,
    pub query: serde_json::Value,
    pub headers: serde_json::Value,
    pub body: Vec<u8>,
    pub source_ip: String,
    pub user_agent: Option<String>,
    pub size_bytes: i64,
}

/// Input for persisting a new event.
#[derive(Debug, Clone)]
pub struct CreateEvent {
    pub id: Uuid,
    pub endpoint_id: Uuid,
    pub method: String,
    pub original_url: String,
    pub source_url: Option<String>,
    pub path: String,
    pub query: serde_json::Value,
    pub headers: serde_json::Value,
    pub body: Vec<u8>,
    pub source_ip: String,
    pub user_agent: Option<String>,
}

impl Event {
    /// Persist a captured event. `size_bytes` is derived from the body, and
    /// the whole write is a single atomic INSERT.
    pub async fn create(pool: &PgPool, input: CreateEvent) -> Result<Self, DbError> {
        let size_bytes = input.body.len() as i64;
        sqlx::query_as(
            r#"
            INSERT INTO events (
                id, endpoint_id, method, original_url, source_url, path,
                query, headers, body, source_ip, user_agent, size_bytes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(input.id)
        .bind(input.endpoint_id)
        .bind(&input.method)
        .bind(&input.original_url)
        .bind(&input.source_url)
        .bind(&input.path)
        .bind(&input.query)
        .bind(&input.headers)
        .bind(&input.body)
        .bind(&input.source_ip)
        .bind(&input.user_agent)
        .bind(size_bytes)
        .fetch_one(pool)
        .await
        .map_err(DbError::QueryFailed)
    }

    /// Find an event by id.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, DbError> {
        sqlx::query_as(
            r#"
            SELECT * FROM events WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(DbError::QueryFailed)
    }

    /// List events for an endpoint, newest first with ties broken by the
    /// internal sequence. Callers fetch `limit + 1` rows to compute
    /// `has_next` without a count query.
    pub async fn list_by_endpoint(
        pool: &PgPool,
        endpoint_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, DbError> {
        sqlx::query_as(
            r#"
            SELECT * FROM events
            WHERE endpoint_id = $1
            ORDER BY received_at DESC, seq DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(endpoint_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .map_err(DbError::QueryFailed)
    }
}
