//! Error types for the retrieval layer.

use thiserror::Error;

/// Errors returned by the retrieval operations.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A "one" operation found nothing, or only entities hidden by the
    /// active visibility policy.
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    /// Malformed pagination, criteria keys or lookup values.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The storage backend rejected the query.
    #[error("Query failed: {0}")]
    Query(String),
}

impl ModelError {
    pub fn not_found(kind: &'static str, key: impl ToString) -> Self {
        ModelError::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ModelError::Validation(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ModelError::NotFound { .. })
    }
}

impl From<sqlx::Error> for ModelError {
    fn from(err: sqlx::Error) -> Self {
        ModelError::Query(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;
