//! GraphRAG source: knowledge-graph retrieval over entities, relationships,
//! and community reports.
//!
//! Two-stage entity search: vector search over entity embeddings, then a
//! lexical fallback that injects entities whose name or description match
//! query terms but missed the vector cutoff. An empty graph emits nothing,
//! and any storage failure degrades to zero sections.

use std::collections::HashMap;
use std::sync::Arc;

use mnemo_core::rag_types::{ContextSection, EvidenceDetail, SectionEvidence, SourceKind};
use mnemo_core::text::find_matched_terms;
use mnemo_core::token::count_tokens;
use mnemo_core::types::{display_community_id, GraphEntity};
use mnemo_db::{Database, OwnerKind, RelDirection, VectorFilters};
use mnemo_embed::CachedEmbedder;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::RagError;

/// Combined-score floor for vector-stage candidates.
const MIN_COMBINED_SCORE: f64 = 0.18;
/// Lexical floor for fallback injection.
const MIN_LEXICAL_SCORE: f64 = 0.2;
/// Weights for combining the two sub-scores.
const VECTOR_WEIGHT: f64 = 0.7;
const LEXICAL_WEIGHT: f64 = 0.3;

const MAX_RELATIONSHIPS: usize = 8;
const MAX_COMMUNITIES: usize = 3;
const MAX_SOURCE_MEMORIES: usize = 8;
const REPORT_SNIPPET_CHARS: usize = 220;

/// Name hits weigh double description hits.
fn lexical_score(entity: &GraphEntity, terms: &[String]) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }
    let name = entity.canonical_name.to_lowercase();
    let description = entity
        .description
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();
    let mut hits = 0.0;
    for term in terms {
        if name.contains(term.as_str()) {
            hits += 1.0;
        } else if description.contains(term.as_str()) {
            hits += 0.5;
        }
    }
    (hits / terms.len() as f64).min(1.0)
}

pub struct GraphRagSource {
    db: Arc<Database>,
    embedder: Arc<CachedEmbedder>,
}

impl GraphRagSource {
    pub fn new(db: Arc<Database>, embedder: Arc<CachedEmbedder>) -> Self {
        Self { db, embedder }
    }

    #[instrument(skip(self, query, query_terms), fields(limit = limit))]
    pub async fn fetch(
        &self,
        query: &str,
        query_terms: &[String],
        limit: usize,
    ) -> Result<Vec<ContextSection>, RagError> {
        if limit == 0 || self.db.entity_count()? == 0 {
            return Ok(Vec::new());
        }

        // Stage 1: vector search over entity embeddings.
        let vector = self.embedder.embed(query).await?;
        let filters = VectorFilters {
            owner_kind: Some(OwnerKind::Entity),
            ..Default::default()
        };
        let hits = self.db.vector_search(&vector, &filters, limit)?;
        let vector_scores: HashMap<Uuid, f64> = hits
            .iter()
            .map(|h| (h.payload.owner_id, h.score))
            .collect();

        // Score every entity; small local graphs make the full pass cheap.
        let mut scored: Vec<(GraphEntity, f64, f64, f64)> = Vec::new();
        for entity in self.db.all_entities()? {
            let vec_score = vector_scores.get(&entity.id).copied().unwrap_or(0.0);
            let lex_score = lexical_score(&entity, query_terms);
            let combined = VECTOR_WEIGHT * vec_score.max(0.0) + LEXICAL_WEIGHT * lex_score;
            let vector_pass = vector_scores.contains_key(&entity.id)
                && combined >= MIN_COMBINED_SCORE;
            // Stage 2: lexical fallback for entities that missed the cutoff.
            let lexical_pass = lex_score >= MIN_LEXICAL_SCORE;
            if vector_pass || lexical_pass {
                scored.push((entity, combined, vec_score, lex_score));
            }
        }
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        debug!(graphrag_entities = scored.len(), "entity selection complete");

        let mut sections = Vec::with_capacity(scored.len());
        for (entity, combined, vec_score, lex_score) in scored {
            match self.build_section(&entity, combined, vec_score, lex_score, query_terms) {
                Ok(section) => sections.push(section),
                Err(e) => {
                    debug!(entity = %entity.canonical_name, error = %e, "skipping entity section");
                }
            }
        }
        Ok(sections)
    }

    fn build_section(
        &self,
        entity: &GraphEntity,
        combined: f64,
        vec_score: f64,
        lex_score: f64,
        query_terms: &[String],
    ) -> Result<ContextSection, RagError> {
        let relationships = self
            .db
            .relationships_for_entity(entity.id, RelDirection::Both)?;
        let relationships: Vec<_> = relationships.into_iter().take(MAX_RELATIONSHIPS).collect();

        let communities = self.db.communities_for_entity(entity.id)?;
        let communities: Vec<_> = communities.into_iter().take(MAX_COMMUNITIES).collect();

        let mut report_snippet: Option<String> = None;
        for community in &communities {
            if let Some(report) = self.db.get_report(community.id)? {
                report_snippet =
                    Some(report.summary.chars().take(REPORT_SNIPPET_CHARS).collect());
                break;
            }
        }

        let memories = self.db.memories_for_entity(entity.id)?;
        let source_memory_ids: Vec<Uuid> = memories
            .into_iter()
            .take(MAX_SOURCE_MEMORIES)
            .map(|(id, _)| id)
            .collect();

        let mut content = format!(
            "**{}** ({})",
            entity.canonical_name,
            entity.entity_type.as_str()
        );
        if let Some(desc) = &entity.description {
            content.push_str(&format!("\n{desc}"));
        }
        if !relationships.is_empty() {
            content.push_str("\nRelationships:");
            for rel in &relationships {
                let other = if rel.source_entity_id == entity.id {
                    rel.target_entity_id
                } else {
                    rel.source_entity_id
                };
                let other_name = self
                    .db
                    .get_entity(other)?
                    .map(|e| e.canonical_name)
                    .unwrap_or_else(|| other.to_string());
                content.push_str(&format!(
                    "\n- {} {} (strength {:.0})",
                    rel.relationship_type, other_name, rel.strength
                ));
            }
        }
        if let Some(snippet) = &report_snippet {
            content.push_str(&format!("\nCommunity report: {snippet}"));
        }
        if !source_memory_ids.is_empty() {
            content.push_str(&format!(
                "\nBacked by {} memory(ies)",
                source_memory_ids.len()
            ));
        }

        let community_ids: Vec<String> =
            communities.iter().map(|c| display_community_id(&c.id)).collect();
        let matched = find_matched_terms(
            query_terms,
            &[
                entity.canonical_name.as_str(),
                entity.description.as_deref().unwrap_or(""),
            ],
        );

        Ok(ContextSection {
            id: entity.id.to_string(),
            title: format!("Entity: {}", entity.canonical_name),
            tokens: count_tokens(&content),
            content,
            relevance: combined.min(1.0),
            source: SourceKind::GraphRag,
            evidence: SectionEvidence {
                reason: format!(
                    "entity match: vector {:.4}, lexical {:.4}; {} relationship(s), {} linked memory(ies)",
                    vec_score,
                    lex_score,
                    relationships.len(),
                    source_memory_ids.len()
                ),
                query_terms: matched,
                detail: Some(EvidenceDetail::Graph {
                    entity_id: entity.id,
                    vector_score: vec_score,
                    lexical_score: lex_score,
                    relationship_count: relationships.len(),
                    memory_count: source_memory_ids.len(),
                    community_ids,
                }),
            },
            source_memory_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mnemo_core::text::extract_query_terms;
    use mnemo_core::types::{
        Community, CommunityReport, EntityMemoryLink, EntityType, Relationship,
    };
    use mnemo_embed::EmbeddingProcessor;

    fn setup() -> (Arc<Database>, Arc<CachedEmbedder>) {
        let db = Arc::new(Database::init_with_dim(64).unwrap());
        let embedder = Arc::new(CachedEmbedder::new(
            Arc::new(EmbeddingProcessor::new_local(64)),
            db.clone(),
        ));
        (db, embedder)
    }

    fn entity(name: &str, description: &str) -> GraphEntity {
        GraphEntity {
            id: Uuid::new_v4(),
            canonical_name: name.to_string(),
            entity_type: EntityType::Technology,
            description: Some(description.to_string()),
            mention_count: 2,
            extraction_confidence: 0.9,
            first_seen_at: Utc::now(),
            last_seen_at: Utc::now(),
            embedding_id: None,
        }
    }

    #[tokio::test]
    async fn empty_graph_emits_nothing() {
        let (db, embedder) = setup();
        let source = GraphRagSource::new(db, embedder);
        let sections = source.fetch("postgres", &[], 6).await.unwrap();
        assert!(sections.is_empty());
    }

    #[tokio::test]
    async fn lexical_fallback_injects_name_matches() {
        let (db, embedder) = setup();
        let e = entity("PostgreSQL", "primary relational database");
        db.upsert_entity(&e).unwrap();
        let source = GraphRagSource::new(db, embedder);
        let terms = extract_query_terms("why did we pick postgresql");
        let sections = source
            .fetch("why did we pick postgresql", &terms, 6)
            .await
            .unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, "Entity: PostgreSQL");
        assert_eq!(sections[0].source, SourceKind::GraphRag);
    }

    #[tokio::test]
    async fn section_carries_relationships_report_and_memories() {
        let (db, embedder) = setup();
        let pg = entity("PostgreSQL", "primary relational database");
        let redis = entity("Redis", "cache layer");
        db.upsert_entity(&pg).unwrap();
        db.upsert_entity(&redis).unwrap();
        db.upsert_relationship(&Relationship {
            id: Uuid::new_v4(),
            source_entity_id: pg.id,
            target_entity_id: redis.id,
            relationship_type: "CACHED_BY".into(),
            strength: 8.0,
            description: None,
            created_at: Utc::now(),
        })
        .unwrap();

        let community = Community {
            id: Uuid::new_v4(),
            level: 0,
            parent_id: None,
            entity_count: 2,
        };
        db.upsert_community(&community).unwrap();
        db.add_community_member(community.id, pg.id).unwrap();
        db.upsert_report(&CommunityReport {
            community_id: community.id,
            title: "Data layer".into(),
            summary: "Postgres backed by a Redis cache for hot reads.".into(),
            full_content: "...".into(),
            key_findings: vec![],
            rating: None,
        })
        .unwrap();

        let memory_id = Uuid::new_v4();
        db.link_entity_memory(&EntityMemoryLink {
            entity_id: pg.id,
            memory_id,
            confidence: 0.9,
            created_at: Utc::now(),
        })
        .unwrap();

        let source = GraphRagSource::new(db, embedder);
        let terms = extract_query_terms("postgresql cache");
        let sections = source.fetch("postgresql cache", &terms, 6).await.unwrap();
        let pg_section = sections
            .iter()
            .find(|s| s.title == "Entity: PostgreSQL")
            .expect("pg section");
        assert!(pg_section.content.contains("CACHED_BY Redis"));
        assert!(pg_section.content.contains("Community report:"));
        assert_eq!(pg_section.source_memory_ids, vec![memory_id]);
        match &pg_section.evidence.detail {
            Some(EvidenceDetail::Graph {
                relationship_count,
                memory_count,
                community_ids,
                ..
            }) => {
                assert_eq!(*relationship_count, 1);
                assert_eq!(*memory_count, 1);
                assert_eq!(community_ids.len(), 1);
                assert_eq!(community_ids[0].len(), 8);
            }
            other => panic!("unexpected detail {other:?}"),
        }
    }

    #[tokio::test]
    async fn zero_limit_short_circuits() {
        let (db, embedder) = setup();
        db.upsert_entity(&entity("Redis", "cache")).unwrap();
        let source = GraphRagSource::new(db, embedder);
        assert!(source.fetch("redis", &[], 0).await.unwrap().is_empty());
    }
}
