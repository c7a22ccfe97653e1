//! Transient retrieval types: requests, sections, evidence, metadata.
//!
//! A [`ContextSection`] is created per request and never persisted. The
//! reranker operates on sections through their `source` tag and relevance
//! only; everything else rides along for formatting and evidence.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::MemoryType;

/// Which candidate generator produced a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    #[serde(rename = "rag")]
    Rag,
    #[serde(rename = "kag")]
    Kag,
    #[serde(rename = "graphrag")]
    GraphRag,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Rag => "rag",
            SourceKind::Kag => "kag",
            SourceKind::GraphRag => "graphrag",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// High-level intent class that sets the source ratios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Memory,
    Code,
    Hybrid,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Memory => "memory",
            Route::Code => "code",
            Route::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of the route classifier. The three ratios sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    pub route: Route,
    pub rag_ratio: f64,
    pub kag_ratio: f64,
    pub graphrag_ratio: f64,
    pub rag_limit: usize,
    pub graphrag_limit: usize,
}

/// Structured detail attached to a section's evidence, by source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EvidenceDetail {
    Memory {
        memory_id: Uuid,
        memory_type: MemoryType,
        semantic_score: f64,
    },
    Code {
        node_id: Option<String>,
        file_path: Option<String>,
        hint_matches: usize,
    },
    Graph {
        entity_id: Uuid,
        vector_score: f64,
        lexical_score: f64,
        relationship_count: usize,
        memory_count: usize,
        community_ids: Vec<String>,
    },
}

/// Why a section exists: human-readable reason plus structured sub-scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionEvidence {
    pub reason: String,
    pub query_terms: Vec<String>,
    pub detail: Option<EvidenceDetail>,
}

impl SectionEvidence {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            query_terms: Vec::new(),
            detail: None,
        }
    }
}

/// A bounded, tokenized chunk of candidate content. Created per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSection {
    pub id: String,
    pub title: String,
    pub content: String,
    pub tokens: usize,
    /// Relevance in `[0, 1]`.
    pub relevance: f64,
    pub source: SourceKind,
    pub evidence: SectionEvidence,
    /// Memory ids backing this section; feeds the cache invalidation set.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_memory_ids: Vec<Uuid>,
}

/// The four numeric reranker components, rounded to 4 decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RerankBreakdown {
    pub semantic: f64,
    pub source_balance: f64,
    pub novelty: f64,
    pub redundancy_penalty: f64,
}

/// A section with its fused rank and score.
#[derive(Debug, Clone)]
pub struct RankedCandidate {
    pub section: ContextSection,
    /// 0-based rank in fused order.
    pub rank: usize,
    pub score: f64,
    pub breakdown: RerankBreakdown,
}

/// Per-section audit record, emitted when `include_evidence` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextEvidenceItem {
    pub id: String,
    pub title: String,
    pub source: SourceKind,
    pub rank: usize,
    pub relevance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reranker_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reranker_breakdown: Option<RerankBreakdown>,
    pub tokens: usize,
    pub included: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusion_reason: Option<String>,
    pub reason: String,
    pub query_terms: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<EvidenceDetail>,
}

/// Per-stage wall-clock timings in milliseconds, rounded to 2 decimals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StageTimings {
    pub rag: f64,
    pub kag: f64,
    pub graphrag: f64,
    pub rerank: f64,
    pub format: f64,
    pub tokenize: f64,
    pub evidence: f64,
    pub total: f64,
}

/// Response metadata; always present, even on partial failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveMetadata {
    pub total_tokens: usize,
    pub sections_included: usize,
    pub rag_sections: usize,
    pub kag_sections: usize,
    pub graphrag_sections: usize,
    pub truncated: bool,
    pub route: Route,
    pub stage_timings: StageTimings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_hit: Option<bool>,
}

/// Output template for the markdown bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Template {
    #[default]
    Default,
    Compact,
    Detailed,
}

/// Memory filters applied to the RAG vector search (conjunctive).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_type: Option<MemoryType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_importance: Option<f64>,
}

/// The canonical core entry point request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveRequest {
    pub query: String,
    /// Clamped to `[100, 100000]` by validation.
    pub token_budget: usize,
    pub include_code_graph: bool,
    pub include_graphrag: bool,
    pub filters: Option<MemoryFilters>,
    pub template: Template,
    pub include_evidence: bool,
}

impl RetrieveRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }
}

impl Default for RetrieveRequest {
    fn default() -> Self {
        Self {
            query: String::new(),
            token_budget: 4000,
            include_code_graph: true,
            include_graphrag: true,
            filters: None,
            template: Template::Default,
            include_evidence: false,
        }
    }
}

/// The canonical core entry point response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveResponse {
    /// Markdown context bundle.
    pub context: String,
    pub metadata: RetrieveMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Vec<ContextEvidenceItem>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults_match_contract() {
        let req = RetrieveRequest::new("what calls validateToken?");
        assert_eq!(req.token_budget, 4000);
        assert!(req.include_code_graph);
        assert!(req.include_graphrag);
        assert_eq!(req.template, Template::Default);
        assert!(!req.include_evidence);
    }

    #[test]
    fn source_kind_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&SourceKind::GraphRag).unwrap(),
            "\"graphrag\""
        );
        assert_eq!(serde_json::to_string(&Route::Hybrid).unwrap(), "\"hybrid\"");
    }
}
