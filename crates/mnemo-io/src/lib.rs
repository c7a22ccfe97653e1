//! mnemo-io — Chunking, incremental scanning, watching, summarizing.
//!
//! The scanner turns `(path, content)` batches into code-graph rows through
//! `mnemo-db`, gated by blake3 content hashes so unchanged files cost one
//! hash comparison. The watcher (feature `watcher`, on by default) debounces
//! filesystem events into scanner batches. The summarizer attaches heuristic
//! summaries to chunks as a best-effort side channel of the scan.

pub mod chunker;
pub mod error;
pub mod scanner;
pub mod summarize;
#[cfg(feature = "watcher")]
pub mod watcher;

pub use chunker::{chunk_file, Language};
pub use error::IoError;
pub use scanner::{ScanConfig, ScanInput, Scanner};
pub use summarize::{summarize_chunk, SummarizerConfig};
#[cfg(feature = "watcher")]
pub use watcher::ScanWatcher;
