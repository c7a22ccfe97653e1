//! Error types for mnemo-io.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IoError {
    #[error("io error on {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Db(#[from] mnemo_db::DbError),

    #[error("scan cancelled after {completed} files")]
    Cancelled { completed: usize },

    #[error("watcher error: {0}")]
    Watcher(String),
}

impl From<IoError> for mnemo_error::Error {
    fn from(value: IoError) -> Self {
        match value {
            IoError::Db(db) => db.into(),
            IoError::Cancelled { completed } => {
                mnemo_error::Error::Cancelled(format!("scan stopped after {completed} files"))
            }
            other => mnemo_error::Error::Internal(other.to_string()),
        }
    }
}
