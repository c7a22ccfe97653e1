//! Candidate generation: one module per source.
//!
//! Sources are independent; the engine runs them under `tokio::join!` and
//! each degrades to zero sections on failure, so ordering between them is
//! unobservable downstream.

pub mod graphrag;
pub mod kag;
pub mod rag;

pub use graphrag::GraphRagSource;
pub use kag::KagSource;
pub use rag::RagSource;
