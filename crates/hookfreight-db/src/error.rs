//! Error types for the hookfreight-db crate.
//!
//! Wraps `SQLx` errors with enough context for callers to distinguish the
//! failure modes they actually branch on: connectivity, migrations, plain
//! query failures, missing rows, and uniqueness conflicts.

use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Failed to establish or acquire a database connection.
    #[error("Database connection failed: {0}")]
    ConnectionFailed(#[source] sqlx::Error),

    /// A database migration failed to apply.
    #[error("Migration failed: {0}")]
    MigrationFailed(#[source] sqlx::migrate::MigrateError),

    /// A database query failed to execute.
    #[error("Query failed: {0}")]
    QueryFailed(#[source] sqlx::Error),

    /// An insert violated a uniqueness constraint.
    ///
    /// Raised when a concurrent writer already recorded the same delivery
    /// attempt, or when a generated hook token collides.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl DbError {
    /// Wrap a query error, promoting unique-constraint violations to
    /// [`DbError::Conflict`].
    pub fn from_query(err: sqlx::Error, what: &str) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::Conflict(format!("{what} already exists"))
            }
            _ => Self::QueryFailed(err),
        }
    }

    /// Check if this error indicates a uniqueness conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, DbError::Conflict(_))
    }

    /// Check if this error indicates a missing resource.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_display() {
        let err = DbError::Conflict("delivery attempt already exists".to_string());
        assert_eq!(err.to_string(), "Conflict: delivery attempt already exists");
        assert!(err.is_conflict());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_not_found_display() {
        let err = DbError::NotFound("endpoint".to_string());
        assert_eq!(err.to_string(), "Not found: endpoint");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_from_query_plain_error() {
        let err = DbError::from_query(sqlx::Error::RowNotFound, "delivery");
        assert!(matches!(err, DbError::QueryFailed(_)));
    }
}
