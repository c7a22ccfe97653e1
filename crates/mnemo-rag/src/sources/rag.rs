//! RAG source: semantic vector search over memories.

use std::sync::Arc;

use mnemo_core::rag_types::{
    ContextSection, EvidenceDetail, MemoryFilters, SectionEvidence, SourceKind,
};
use mnemo_core::text::{find_matched_terms, format_tags};
use mnemo_core::token::count_tokens;
use mnemo_core::types::Memory;
use mnemo_db::{Database, OwnerKind, VectorFilters};
use mnemo_embed::CachedEmbedder;
use tracing::{debug, instrument};

use crate::error::RagError;

/// Characters of raw content shown when a memory has no summary.
const CONTENT_PREFIX_CHARS: usize = 300;

pub struct RagSource {
    db: Arc<Database>,
    embedder: Arc<CachedEmbedder>,
}

fn format_memory(memory: &Memory) -> String {
    let body = match &memory.summary {
        Some(s) if !s.is_empty() => s.clone(),
        _ => memory.content.chars().take(CONTENT_PREFIX_CHARS).collect(),
    };
    let mut out = format!("**{}** ({})\n{}", memory.title, memory.kind, body);
    if !memory.tags.is_empty() {
        out.push_str(&format!("\nTags: {}", format_tags(&memory.tags)));
    }
    out.push_str(&format!(
        "\nImportance: {}%",
        (memory.importance * 100.0).round() as i64
    ));
    out
}

impl RagSource {
    pub fn new(db: Arc<Database>, embedder: Arc<CachedEmbedder>) -> Self {
        Self { db, embedder }
    }

    /// Embed the query, run the filtered vector search, and emit one section
    /// per surviving hit. Per-hit failures are skipped, not fatal.
    #[instrument(skip(self, query, query_terms, filters), fields(limit = limit))]
    pub async fn fetch(
        &self,
        query: &str,
        query_terms: &[String],
        filters: &Option<MemoryFilters>,
        limit: usize,
    ) -> Result<Vec<ContextSection>, RagError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let vector = self.embedder.embed(query).await?;
        let vf = VectorFilters {
            owner_kind: Some(OwnerKind::Memory),
            mem_type: filters
                .as_ref()
                .and_then(|f| f.memory_type.map(|t| t.as_str().to_string())),
            tags: filters.as_ref().map(|f| f.tags.clone()).unwrap_or_default(),
            related_files: Vec::new(),
            min_importance: filters.as_ref().and_then(|f| f.min_importance),
        };
        let hits = self.db.vector_search(&vector, &vf, limit)?;
        debug!(rag_hits = hits.len(), "memory vector search complete");

        let mut sections = Vec::with_capacity(hits.len());
        for hit in hits {
            let Some(memory_id) = hit.memory_id() else {
                continue;
            };
            let memory = match self.db.get_memory(memory_id) {
                Ok(Some(m)) => m,
                Ok(None) => continue,
                Err(e) => {
                    debug!(memory_id = %memory_id, error = %e, "skipping unreadable memory");
                    continue;
                }
            };

            let haystacks = [
                memory.title.as_str(),
                memory.content.as_str(),
                memory.summary.as_deref().unwrap_or(""),
            ];
            let tag_text = memory.tags.join(" ");
            let mut all_haystacks: Vec<&str> = haystacks.to_vec();
            all_haystacks.push(&tag_text);
            let matched = find_matched_terms(query_terms, &all_haystacks);

            let mut reason = format!("semantic score {:.4}", hit.score);
            if !matched.is_empty() {
                reason.push_str(&format!("; matched query terms: {}", matched.join(", ")));
            }
            reason.push_str(&format!("; memory type {}", memory.kind));

            let content = format_memory(&memory);
            sections.push(ContextSection {
                id: memory.id.to_string(),
                title: memory.title.clone(),
                tokens: count_tokens(&content),
                content,
                relevance: hit.score.clamp(0.0, 1.0),
                source: SourceKind::Rag,
                evidence: SectionEvidence {
                    reason,
                    query_terms: matched,
                    detail: Some(EvidenceDetail::Memory {
                        memory_id: memory.id,
                        memory_type: memory.kind,
                        semantic_score: hit.score,
                    }),
                },
                source_memory_ids: vec![memory.id],
            });
        }
        Ok(sections)
    }
}
