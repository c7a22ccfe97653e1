//! mnemo-core — Shared types and small utilities for the mnemo workspace.
//!
//! Everything that crosses a crate boundary lives here: the persisted data
//! model ([`types`]), the transient retrieval types ([`rag_types`]), the
//! scanner/chunker types ([`io_types`]), deterministic token counting
//! ([`token`]), query-text helpers ([`text`]), and the cancellation
//! primitives ([`cancel`]).
//!
//! The crate is dependency-light on purpose; no I/O happens here.

pub mod cancel;
pub mod io_types;
pub mod rag_types;
pub mod text;
pub mod token;
pub mod types;

pub use cancel::{CancellationHandle, CancellationListener, CancellationToken};
pub use token::{count_tokens, ApproxCharTokenizer, TokenCounter};
