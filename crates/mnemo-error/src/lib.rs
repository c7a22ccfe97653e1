//! mnemo-error — Workspace-wide error type and boundary failure codes.
//!
//! A single [`Error`] enum is shared across crates so higher layers can handle
//! failures uniformly. Each variant corresponds to one of the failure codes
//! surfaced at the engine boundary; crate-local error enums (`DbError`,
//! `EmbedError`, `IoError`, `RagError`) convert into it at the seams.
//!
//! Library code returns [`Result`] and propagates with `?`; classification
//! into a [`FailureCode`] happens once, at the boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Convenience alias used across the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Workspace-wide error type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A referenced entity (memory, node, community, ...) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed (range violations, missing fields).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation was cancelled before completion.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// The operation exceeded its deadline.
    #[error("timeout after {elapsed_ms}ms: {context}")]
    Timeout { context: String, elapsed_ms: u64 },

    /// A required collaborator (vector index, embedding provider, graph
    /// tables) is unreachable or missing.
    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),

    /// Anything that indicates a bug or an unexpected storage state.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse failure classification surfaced at the engine boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureCode {
    #[serde(rename = "not_found")]
    NotFound,
    #[serde(rename = "invalid_argument")]
    InvalidArgument,
    #[serde(rename = "cancelled")]
    Cancelled,
    #[serde(rename = "timeout")]
    Timeout,
    #[serde(rename = "dependency_unavailable")]
    DependencyUnavailable,
    #[serde(rename = "internal")]
    Internal,
}

impl Error {
    /// The boundary code for this error.
    pub fn code(&self) -> FailureCode {
        match self {
            Error::NotFound(_) => FailureCode::NotFound,
            Error::InvalidArgument(_) => FailureCode::InvalidArgument,
            Error::Cancelled(_) => FailureCode::Cancelled,
            Error::Timeout { .. } => FailureCode::Timeout,
            Error::DependencyUnavailable(_) => FailureCode::DependencyUnavailable,
            Error::Internal(_) => FailureCode::Internal,
        }
    }

    /// True for failures a batch-style caller should record and skip rather
    /// than abort on (per-item failures inside scans and source calls).
    pub fn is_per_item(&self) -> bool {
        !matches!(self, Error::Cancelled(_) | Error::Timeout { .. })
    }
}

/// Extension helpers for attaching context while propagating.
pub trait ContextExt<T> {
    /// Wrap any error into [`Error::Internal`] with a labelled context.
    fn with_context(self, label: &str) -> Result<T>;
}

impl<T, E: std::fmt::Display> ContextExt<T> for std::result::Result<T, E> {
    fn with_context(self, label: &str) -> Result<T> {
        self.map_err(|e| Error::Internal(format!("{label}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        let cases = [
            (Error::NotFound("m".into()), FailureCode::NotFound),
            (Error::InvalidArgument("x".into()), FailureCode::InvalidArgument),
            (Error::Cancelled("deadline".into()), FailureCode::Cancelled),
            (
                Error::Timeout { context: "rag".into(), elapsed_ms: 12 },
                FailureCode::Timeout,
            ),
            (
                Error::DependencyUnavailable("vector index".into()),
                FailureCode::DependencyUnavailable,
            ),
            (Error::Internal("bug".into()), FailureCode::Internal),
        ];
        for (err, code) in cases {
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn per_item_excludes_cancellation() {
        assert!(Error::NotFound("x".into()).is_per_item());
        assert!(!Error::Cancelled("stop".into()).is_per_item());
        assert!(!Error::Timeout { context: "t".into(), elapsed_ms: 1 }.is_per_item());
    }

    #[test]
    fn context_ext_wraps_display() {
        let r: std::result::Result<(), std::io::Error> = Err(std::io::Error::other("boom"));
        let wrapped = r.with_context("reading chunk").unwrap_err();
        assert!(matches!(wrapped, Error::Internal(msg) if msg.contains("reading chunk")));
    }
}
