//! mnemo-rag — Retrieval and context assembly for the mnemo workspace.
//!
//! The pipeline behind [`ContextEngine::retrieve`]:
//!
//! - [`router`]: query → route (memory / code / hybrid) with fixed source
//!   ratios, pattern sets kept as data.
//! - [`sources`]: RAG (memory vector search), KAG (identifier lookup +
//!   file-path heuristics expanded along code edges), GraphRAG (entity
//!   search with lexical fallback, relationships, community reports).
//! - [`fusion`]: greedy route-aware reranking with novelty, source balance,
//!   and streak penalties; deterministic, pure, unit-tested in isolation.
//! - [`context`]: token-budget packing with a 200-token format reserve,
//!   grouped markdown output, and per-candidate evidence records.
//! - [`cache`]: process-local LRU+TTL result cache with canonical keys and
//!   memory-keyed invalidation.
//! - [`bench`]: warm/cold latency harness with per-stage percentiles.
//!
//! Sources degrade independently: a failing source contributes zero
//! sections and the request still answers from whatever succeeded.

pub mod bench;
pub mod cache;
pub mod context;
pub mod engine;
pub mod error;
pub mod fusion;
pub mod router;
pub mod sources;

pub use bench::{BenchmarkConfig, BenchmarkReport, LatencyStats};
pub use cache::{cache_key, global_cache, CacheConfig, CacheStats, ResultCache};
pub use context::{
    build_evidence, display_order, format_context, pack_sections, EMPTY_CONTEXT_BODY,
    EXCLUSION_TOKEN_BUDGET, FORMAT_OVERHEAD_TOKENS,
};
pub use engine::{new_in_memory, ContextEngine, EngineConfig, EngineStats};
pub use error::RagError;
pub use fusion::rerank;
pub use router::classify_route;
pub use sources::{GraphRagSource, KagSource, RagSource};
