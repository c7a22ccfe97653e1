//! mnemo-db — Embedded storage for memories, the code graph, the knowledge
//! graph, and the vector collection.
//!
//! Everything persists into a single CozoDB instance: one stored relation per
//! table, plus `vec_points` with an HNSW index as the vector collection.
//! Multi-statement scripts run in one transaction; the scanner's per-file
//! replace leans on that to keep the edge-uniqueness invariant.
//!
//! The public surface is [`Database`] with method groups per concern:
//! - `memory_store`: memory CRUD and access bookkeeping
//! - `vector`: the vector-store adapter (upsert/search/delete with filters)
//! - `code_graph`: node/edge CRUD, BFS traversals, file hashes
//! - `graph_store`: entities, relationships, communities, reports
//! - `embed_cache`: persistent `(model, content_hash)` embedding cache

mod code_graph;
mod database;
mod embed_cache;
mod error;
mod graph_store;
mod memory_store;
mod schema;
mod vector;

pub use code_graph::{Traversal, TraversalDirection, TraversalNode};
pub use database::{dt_to_ms, ms_to_dt, Database, DEFAULT_EMBEDDING_DIM};
pub use error::DbError;
pub use graph_store::RelDirection;
pub use schema::create_schema;
pub use vector::{CollectionInfo, OwnerKind, VectorFilters, VectorHit, VectorPayload};
