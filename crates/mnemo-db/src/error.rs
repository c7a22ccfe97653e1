//! Error types for mnemo-db.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DbError {
    #[error("database error: {0}")]
    Cozo(String),

    #[error("failed to decode row column {column} of `{relation}`: {message}")]
    Decode {
        relation: &'static str,
        column: &'static str,
        message: String,
    },

    #[error("item not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("vector dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

impl From<DbError> for mnemo_error::Error {
    fn from(value: DbError) -> Self {
        match value {
            DbError::NotFound(what) => mnemo_error::Error::NotFound(what),
            DbError::InvalidArgument(msg) | DbError::Cozo(msg)
                if msg.contains("not found on relation") =>
            {
                mnemo_error::Error::DependencyUnavailable(msg)
            }
            DbError::InvalidArgument(msg) => mnemo_error::Error::InvalidArgument(msg),
            DbError::DimensionMismatch { expected, got } => mnemo_error::Error::InvalidArgument(
                format!("vector dimension mismatch: expected {expected}, got {got}"),
            ),
            other => mnemo_error::Error::Internal(other.to_string()),
        }
    }
}
