//! Error types for mnemo-rag.
//!
//! [`RagError`] captures storage, embedding, and search failures inside the
//! pipeline. Sources catch their own errors and degrade to zero sections;
//! only request-level failures (validation, cancellation) reach the caller,
//! converted into the workspace error type.

use mnemo_db::DbError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RagError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error("embedding error: {0}")]
    Embed(String),

    #[error("search error: {0}")]
    Search(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("request cancelled: {0}")]
    Cancelled(String),

    #[error("deadline exceeded after {elapsed_ms}ms in {stage}")]
    DeadlineExceeded { stage: &'static str, elapsed_ms: u64 },
}

impl From<mnemo_embed::EmbedError> for RagError {
    fn from(value: mnemo_embed::EmbedError) -> Self {
        RagError::Embed(value.to_string())
    }
}

impl From<RagError> for mnemo_error::Error {
    fn from(value: RagError) -> Self {
        match value {
            RagError::Db(db) => db.into(),
            RagError::InvalidRequest(msg) => mnemo_error::Error::InvalidArgument(msg),
            RagError::Cancelled(msg) => mnemo_error::Error::Cancelled(msg),
            RagError::DeadlineExceeded { stage, elapsed_ms } => mnemo_error::Error::Timeout {
                context: stage.to_string(),
                elapsed_ms,
            },
            RagError::Embed(msg) => mnemo_error::Error::DependencyUnavailable(msg),
            RagError::Search(msg) => mnemo_error::Error::Internal(msg),
        }
    }
}
