//! Error types for mnemo-embed.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("provider error: {0}")]
    Provider(String),

    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    Dimensions { expected: usize, got: usize },

    #[error(transparent)]
    Db(#[from] mnemo_db::DbError),
}

impl From<EmbedError> for mnemo_error::Error {
    fn from(value: EmbedError) -> Self {
        match value {
            EmbedError::Db(db) => db.into(),
            EmbedError::Dimensions { expected, got } => mnemo_error::Error::InvalidArgument(
                format!("embedding dimension mismatch: expected {expected}, got {got}"),
            ),
            other => mnemo_error::Error::DependencyUnavailable(other.to_string()),
        }
    }
}
