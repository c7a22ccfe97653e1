//! Stored relations and the vector index.
//!
//! One relation per persisted table. Key columns precede `=>`; the edge
//! relation is keyed by `(from_node, to_node, edge_type)` so upserts enforce
//! the uniqueness invariant for free. `vec_points` is the single logical
//! vector collection: one point per memory, one per graph entity, with an
//! HNSW index over the embedding column.

use crate::database::Database;
use crate::error::DbError;
use cozo::ScriptMutability;
use std::collections::BTreeMap;

const RELATIONS: &[(&str, &str)] = &[
    (
        "memories",
        r#"
:create memories {
    id: Uuid
    =>
    kind: String,
    title: String,
    content: String,
    summary: String?,
    importance: Float,
    tags: [String],
    related_files: [String],
    created_at: Float,
    accessed_at: Float,
    access_count: Int,
    vector_id: Uuid?,
    last_refreshed_at: Float?
}
"#,
    ),
    (
        "code_nodes",
        r#"
:create code_nodes {
    id: String
    =>
    kind: String,
    name: String,
    file_path: String,
    start_line: Int?,
    end_line: Int?,
    signature: String?,
    summary: String?,
    summary_origin: String?,
    summary_confidence: Float?,
    needs_ai_summary: Bool,
    metadata: Json,
    created_at: Float,
    updated_at: Float
}
"#,
    ),
    (
        "code_edges",
        r#"
:create code_edges {
    from_node: String,
    to_node: String,
    edge_type: String
    =>
    id: Uuid,
    metadata: Json?,
    created_at: Float
}
"#,
    ),
    (
        "file_hashes",
        r#"
:create file_hashes {
    path: String
    =>
    hash: String,
    updated_at: Float
}
"#,
    ),
    (
        "graph_entities",
        r#"
:create graph_entities {
    id: Uuid
    =>
    canonical_name: String,
    entity_type: String,
    description: String?,
    mention_count: Int,
    extraction_confidence: Float,
    first_seen_at: Float,
    last_seen_at: Float,
    embedding_id: Uuid?
}
"#,
    ),
    (
        "graph_relationships",
        r#"
:create graph_relationships {
    id: Uuid
    =>
    source_entity_id: Uuid,
    target_entity_id: Uuid,
    relationship_type: String,
    strength: Float,
    description: String?,
    created_at: Float
}
"#,
    ),
    (
        "graph_entity_memories",
        r#"
:create graph_entity_memories {
    entity_id: Uuid,
    memory_id: Uuid
    =>
    confidence: Float,
    created_at: Float
}
"#,
    ),
    (
        "graph_communities",
        r#"
:create graph_communities {
    id: Uuid
    =>
    level: Int,
    parent_id: Uuid?,
    entity_count: Int
}
"#,
    ),
    (
        "graph_community_members",
        r#"
:create graph_community_members {
    community_id: Uuid,
    entity_id: Uuid
}
"#,
    ),
    (
        "graph_community_reports",
        r#"
:create graph_community_reports {
    community_id: Uuid
    =>
    title: String,
    summary: String,
    full_content: String,
    key_findings: [String],
    rating: Float?
}
"#,
    ),
    (
        "memory_relations",
        r#"
:create memory_relations {
    from_id: Uuid,
    to_id: Uuid
    =>
    relation_type: String,
    created_at: Float
}
"#,
    ),
    (
        "embedding_cache",
        r#"
:create embedding_cache {
    model: String,
    content_hash: String
    =>
    embedding: [Float],
    created_at: Float
}
"#,
    ),
];

/// Create every stored relation plus the HNSW index. Idempotent-enough for
/// tests: a fresh in-memory database has none of the relations.
pub fn create_schema(db: &Database) -> Result<(), DbError> {
    for (name, script) in RELATIONS {
        db.run_script(script, BTreeMap::new(), ScriptMutability::Mutable)
            .map_err(|e| DbError::Cozo(format!("creating `{name}`: {e}")))?;
    }

    let vec_points = format!(
        r#"
:create vec_points {{
    id: Uuid
    =>
    owner_id: Uuid,
    owner_kind: String,
    mem_type: String?,
    title: String?,
    tags: [String],
    related_files: [String],
    importance: Float?,
    embedding: <F32; {dim}>
}}
"#,
        dim = db.embedding_dim()
    );
    db.run_script(&vec_points, BTreeMap::new(), ScriptMutability::Mutable)
        .map_err(|e| DbError::Cozo(format!("creating `vec_points`: {e}")))?;

    let hnsw = format!(
        r#"
::hnsw create vec_points:semantic {{
    fields: [embedding],
    dim: {dim},
    dtype: F32,
    m: 32,
    ef_construction: 200,
    distance: Cosine
}}
"#,
        dim = db.embedding_dim()
    );
    db.run_script(&hnsw, BTreeMap::new(), ScriptMutability::Mutable)
        .map_err(|e| DbError::Cozo(format!("creating hnsw index: {e}")))?;

    Ok(())
}
