//! Endpoint database model.
//!
//! An endpoint is one inbound capture URL (identified by its immutable
//! hook token) plus the forwarding configuration the delivery worker reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::DbError;

/// Database entity for an endpoint.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: Uuid,
    pub app_id: Uuid,
    pub hook_token: String,
    pub forward_url: String,
    pub forwarding_enabled: bool,
    pub auth_header_name: Option<String>,
    pub auth_header_value: Option<String>,
    pub http_timeout_ms: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new endpoint.
#[derive(Debug, Clone)]
pub struct CreateEndpoint {
    pub id: Uuid,
    pub app_id: Uuid,
    pub hook_token: String,
    pub forward_url: String,
    pub forwarding_enabled: bool,
    pub auth_header_name: Option<String>,
    pub auth_header_value: Option<String>,
    pub http_timeout_ms: i32,
}

/// Input for updating an endpoint. Only non-None fields are updated; the
/// hook token is immutable and deliberately absent here.
#[derive(Debug, Clone, Default)]
pub struct UpdateEndpoint {
    pub forward_url: Option<String>,
    pub forwarding_enabled: Option<bool>,
    pub auth_header_name: Option<String>,
    pub auth_header_value: Option<String>,
    pub http_timeout_ms: Option<i32>,
    pub is_active: Option<bool>,
}

impl Endpoint {
    /// Create a new endpoint.
    pub async fn create(pool: &PgPool, input: CreateEndpoint) -> Result<Self, DbError> {
        sqlx::query_as(
            r#"
            INSERT INTO endpoints (
                id, app_id, hook_token, forward_url, forwarding_enabled,
                auth_header_name, auth_header_value, http_timeout_ms
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(input.id)
        .bind(input.app_id)
        .bind(&input.hook_token)
        .bind(&input.forward_url)
        .bind(input.forwarding_enabled)
        .bind(&input.auth_header_name)
        .bind(&input.auth_header_value)
        .bind(input.http_timeout_ms)
        .fetch_one(pool)
        .await
        .map_err(|e| DbError::from_query(e, "endpoint hook token"))
    }

    /// Find an endpoint by id.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, DbError> {
        sqlx::query_as(
            r#"
            SELECT * FROM endpoints WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(DbError::QueryFailed)
    }

    /// Find an endpoint by its hook token. This is the ingest hot path.
    pub async fn find_by_hook_token(
        pool: &PgPool,
        hook_token: &str,
    ) -> Result<Option<Self>, DbError> {
        sqlx::query_as(
            r#"
            SELECT * FROM endpoints WHERE hook_token = $1
            "#,
        )
        .bind(hook_token)
        .fetch_optional(pool)
        .await
        .map_err(DbError::QueryFailed)
    }

    /// List endpoints for an app with pagination, newest first.
    pub async fn list_by_app(
        pool: &PgPool,
        app_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, DbError> {
        sqlx::query_as(
            r#"
            SELECT * FROM endpoints
            WHERE app_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(app_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .map_err(DbError::QueryFailed)
    }

    /// Update an endpoint. Only non-None fields are updated.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        input: UpdateEndpoint,
    ) -> Result<Option<Self>, DbError> {
        sqlx::query_as(
            r#"
            UPDATE endpoints
            SET
                forward_url = COALESCE($2, forward_url),
                forwarding_enabled = COALESCE($3, forwarding_enabled),
                auth_header_name = COALESCE($4, auth_header_name),
                auth_header_value = COALESCE($5, auth_header_value),
                http_timeout_ms = COALESCE($6, http_timeout_ms),
                is_active = COALESCE($7, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.forward_url)
        .bind(input.forwarding_enabled)
        .bind(&input.auth_header_name)
        .bind(&input.auth_header_value)
        .bind(input.http_timeout_ms)
        .bind(input.is_active)
        .fetch_optional(pool)
        .await
        .map_err(DbError::QueryFailed)
    }
}
