//! Scanner and chunker types shared between `mnemo-io` and `mnemo-db`.

use serde::{Deserialize, Serialize};

use crate::types::{CodeNodeType, SummaryOrigin};

/// What happened to a path during a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Unchanged,
    Deleted,
}

/// Per-path change record; `error` is set when the file was skipped due to a
/// per-file failure (the scan itself continues).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub kind: ChangeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Scan counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    pub files_scanned: usize,
    pub nodes_added: usize,
    pub nodes_deleted: usize,
    pub edges_added: usize,
    pub edges_deleted: usize,
}

/// Result of one scanner run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOutcome {
    pub stats: ScanStats,
    pub changes: Vec<FileChange>,
}

/// Chunk-level metadata produced by the language-aware chunker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub start_line: i64,
    pub end_line: i64,
    pub node_type: CodeNodeType,
    pub name: Option<String>,
    pub parent_name: Option<String>,
    pub is_function: bool,
    pub is_class: bool,
    pub is_import: bool,
    pub language: String,
}

/// A chunk of source text with its token count and metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeChunk {
    pub content: String,
    pub token_count: usize,
    pub metadata: ChunkMetadata,
}

/// A heuristic summary for a chunk, per the summarizer contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeSummary {
    pub summary: String,
    pub generated_by: SummaryOrigin,
    pub confidence: f64,
    /// Set in hybrid mode when the heuristic result should be replaced by an
    /// AI-generated summary.
    pub needs_ai_summary: bool,
}
