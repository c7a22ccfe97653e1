//! `ContextEngine`: the canonical retrieve entry point.
//!
//! query → route → (rag, kag, graphrag under `tokio::join!`) → rerank →
//! budget pack → format, with the result cache wrapping the whole pipeline.
//! A single failing source degrades to zero sections; the request only
//! fails on invalid input. All stage timings are reported even on partial
//! failure. Cancelled or deadline-clipped results are never written to the
//! cache.

use std::sync::Arc;
use std::time::{Duration, Instant};

use mnemo_core::rag_types::{
    ContextSection, RetrieveMetadata, RetrieveRequest, RetrieveResponse, SourceKind, StageTimings,
};
use mnemo_core::text::extract_query_terms;
use mnemo_core::types::Memory;
use mnemo_db::{Database, OwnerKind, VectorPayload};
use mnemo_embed::CachedEmbedder;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::cache::{cache_key, CacheConfig, CacheStats, ResultCache};
use crate::context::{build_evidence, display_order, format_context, pack_sections};
use crate::error::RagError;
use crate::fusion::rerank;
use crate::router::classify_route;
use crate::sources::{GraphRagSource, KagSource, RagSource};

pub const MIN_TOKEN_BUDGET: usize = 100;
pub const MAX_TOKEN_BUDGET: usize = 100_000;

/// Engine configuration.
///
/// `MNEMO_PERF_BUDGET_MS` (optional) sets the default per-request deadline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub cache: CacheConfig,
    /// Per-request deadline; sources that miss it contribute nothing and
    /// the response is marked truncated.
    pub deadline_ms: Option<u64>,
    /// Result-slot cap for the KAG file-lookup sub-stage.
    pub kag_file_limit: usize,
    /// Stable hash of the scoring configuration, part of cache keys.
    pub scoring_hash: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            deadline_ms: std::env::var("MNEMO_PERF_BUDGET_MS")
                .ok()
                .and_then(|v| v.parse().ok()),
            kag_file_limit: 8,
            scoring_hash: "fusion-v1".to_string(),
        }
    }
}

/// Counts surfaced by [`ContextEngine::stats`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStats {
    pub memories: usize,
    pub code_nodes: usize,
    pub code_edges: usize,
    pub entities: usize,
    pub relationships: usize,
    pub communities: usize,
    pub cache: CacheStats,
}

pub struct ContextEngine {
    db: Arc<Database>,
    embedder: Arc<CachedEmbedder>,
    cache: Arc<ResultCache>,
    rag: RagSource,
    kag: KagSource,
    graphrag: GraphRagSource,
    config: EngineConfig,
}

fn round2(ms: f64) -> f64 {
    (ms * 100.0).round() / 100.0
}

fn elapsed_ms(start: Instant) -> f64 {
    round2(start.elapsed().as_secs_f64() * 1000.0)
}

impl ContextEngine {
    pub fn new(db: Arc<Database>, embedder: Arc<CachedEmbedder>, config: EngineConfig) -> Self {
        Self {
            rag: RagSource::new(db.clone(), embedder.clone()),
            kag: KagSource::new(db.clone()),
            graphrag: GraphRagSource::new(db.clone(), embedder.clone()),
            cache: Arc::new(ResultCache::new(config.cache.clone())),
            db,
            embedder,
            config,
        }
    }

    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn embedding_model(&self) -> String {
        self.embedder.model_id()
    }

    /// Store a memory and its vector point, invalidating affected cache
    /// entries.
    pub async fn store_memory(&self, memory: &Memory) -> Result<(), mnemo_error::Error> {
        let text = format!("{}\n{}", memory.title, memory.content);
        let vector = self
            .embedder
            .embed(&text)
            .await
            .map_err(RagError::from)
            .map_err(mnemo_error::Error::from)?;
        // Updates reuse the existing point so each memory owns exactly one
        // vector.
        let existing_point = match memory.vector_id {
            Some(id) => Some(id),
            None => self
                .db
                .get_memory(memory.id)
                .map_err(RagError::Db)?
                .and_then(|m| m.vector_id),
        };
        let point_id = existing_point.unwrap_or_else(Uuid::new_v4);
        let mut stored = memory.clone();
        stored.vector_id = Some(point_id);
        self.db.store_memory(&stored).map_err(RagError::Db)?;
        self.db
            .vector_upsert(
                point_id,
                &vector,
                &VectorPayload {
                    owner_id: memory.id,
                    owner_kind: OwnerKind::Memory,
                    mem_type: Some(memory.kind.as_str().to_string()),
                    title: Some(memory.title.clone()),
                    tags: memory.tags.clone(),
                    related_files: memory.related_files.clone(),
                    importance: Some(memory.importance),
                },
            )
            .map_err(RagError::Db)?;
        self.cache.invalidate_memory(memory.id);
        Ok(())
    }

    /// Delete a memory, its vector point, and affected cache entries.
    pub fn delete_memory(&self, memory_id: Uuid) -> Result<(), mnemo_error::Error> {
        self.db.delete_memory(memory_id).map_err(RagError::Db)?;
        self.cache.invalidate_memory(memory_id);
        Ok(())
    }

    /// The canonical core entry point.
    #[instrument(skip(self, request), fields(query_len = request.query.len(), budget = request.token_budget))]
    pub async fn retrieve(
        &self,
        request: RetrieveRequest,
    ) -> Result<RetrieveResponse, mnemo_error::Error> {
        let total_start = Instant::now();
        if request.token_budget < MIN_TOKEN_BUDGET || request.token_budget > MAX_TOKEN_BUDGET {
            return Err(mnemo_error::Error::InvalidArgument(format!(
                "token_budget {} outside [{MIN_TOKEN_BUDGET}, {MAX_TOKEN_BUDGET}]",
                request.token_budget
            )));
        }

        let route = classify_route(
            &request.query,
            request.include_code_graph,
            request.include_graphrag,
        );

        // An empty query short-circuits to the empty body.
        if request.query.trim().is_empty() {
            let timings = StageTimings {
                total: elapsed_ms(total_start),
                ..StageTimings::default()
            };
            return Ok(RetrieveResponse {
                context: format_context(&request.query, &[], request.template),
                metadata: RetrieveMetadata {
                    total_tokens: 0,
                    sections_included: 0,
                    rag_sections: 0,
                    kag_sections: 0,
                    graphrag_sections: 0,
                    truncated: false,
                    route: route.route,
                    stage_timings: timings,
                    cache_hit: None,
                },
                evidence: request.include_evidence.then(Vec::new),
            });
        }

        let key = cache_key(&request, &self.embedding_model(), &self.config.scoring_hash);
        if let Some(mut cached) = self.cache.get(&key) {
            debug!("result cache hit");
            cached.metadata.cache_hit = Some(true);
            cached.metadata.stage_timings = StageTimings {
                total: elapsed_ms(total_start),
                ..StageTimings::default()
            };
            return Ok(cached);
        }

        let mut timings = StageTimings::default();

        let tokenize_start = Instant::now();
        let query_terms = extract_query_terms(&request.query);
        timings.tokenize = elapsed_ms(tokenize_start);

        // Sources run concurrently; each degrades to zero sections on
        // failure or deadline.
        let deadline = self.config.deadline_ms.map(Duration::from_millis);
        let rag_limit = route.rag_limit;
        let graphrag_limit = if request.include_graphrag {
            route.graphrag_limit
        } else {
            0
        };
        let kag_enabled = request.include_code_graph && route.kag_ratio > 0.0;

        let rag_fut = run_source(
            "rag",
            deadline,
            self.rag
                .fetch(&request.query, &query_terms, &request.filters, rag_limit),
        );
        let kag_fut = async {
            if kag_enabled {
                run_source(
                    "kag",
                    deadline,
                    self.kag
                        .fetch(&request.query, &query_terms, self.config.kag_file_limit),
                )
                .await
            } else {
                (Vec::new(), 0.0, false)
            }
        };
        let graphrag_fut = run_source(
            "graphrag",
            deadline,
            self.graphrag
                .fetch(&request.query, &query_terms, graphrag_limit),
        );

        let ((rag_sections, rag_ms, rag_clipped), (kag_sections, kag_ms, kag_clipped), (graphrag_sections, graphrag_ms, graphrag_clipped)) =
            tokio::join!(rag_fut, kag_fut, graphrag_fut);
        timings.rag = rag_ms;
        timings.kag = kag_ms;
        timings.graphrag = graphrag_ms;
        let deadline_clipped = rag_clipped || kag_clipped || graphrag_clipped;

        let mut candidates: Vec<ContextSection> = Vec::new();
        candidates.extend(rag_sections);
        candidates.extend(kag_sections);
        candidates.extend(graphrag_sections);

        // Memory ids backing any candidate key this entry's invalidation.
        let mut memory_ids: Vec<Uuid> = candidates
            .iter()
            .flat_map(|c| c.source_memory_ids.iter().copied())
            .collect();
        memory_ids.sort();
        memory_ids.dedup();

        let rerank_start = Instant::now();
        let ranked = rerank(candidates, &route, &query_terms);
        timings.rerank = elapsed_ms(rerank_start);

        let format_start = Instant::now();
        let packed = pack_sections(ranked, request.token_budget);
        let ordered = display_order(&packed.included);
        let context = format_context(&request.query, &ordered, request.template);
        timings.format = elapsed_ms(format_start);

        let count_by = |source: SourceKind| {
            packed
                .included
                .iter()
                .filter(|c| c.section.source == source)
                .count()
        };
        let metadata = RetrieveMetadata {
            total_tokens: packed.total_tokens,
            sections_included: packed.included.len(),
            rag_sections: count_by(SourceKind::Rag),
            kag_sections: count_by(SourceKind::Kag),
            graphrag_sections: count_by(SourceKind::GraphRag),
            truncated: packed.truncated || deadline_clipped,
            route: route.route,
            stage_timings: timings,
            cache_hit: Some(false),
        };

        let evidence_start = Instant::now();
        let evidence = request
            .include_evidence
            .then(|| build_evidence(&packed.included, &packed.excluded));
        let mut timings = metadata.stage_timings;
        timings.evidence = elapsed_ms(evidence_start);
        timings.total = elapsed_ms(total_start);

        let response = RetrieveResponse {
            context,
            metadata: RetrieveMetadata {
                stage_timings: timings,
                ..metadata
            },
            evidence,
        };

        // Deadline-clipped partials are never cached.
        if !deadline_clipped {
            self.cache.put(key, response.clone(), memory_ids);
        }
        Ok(response)
    }

    pub fn stats(&self) -> Result<EngineStats, mnemo_error::Error> {
        Ok(EngineStats {
            memories: self.db.memory_count().map_err(RagError::Db)?,
            code_nodes: self.db.code_node_count().map_err(RagError::Db)?,
            code_edges: self.db.code_edge_count().map_err(RagError::Db)?,
            entities: self.db.entity_count().map_err(RagError::Db)?,
            relationships: self.db.relationship_count().map_err(RagError::Db)?,
            communities: self.db.community_count().map_err(RagError::Db)?,
            cache: self.cache.stats(),
        })
    }
}

/// Run one source with an optional deadline. Returns the sections, the
/// elapsed milliseconds, and whether the deadline clipped the stage.
async fn run_source<F>(
    stage: &'static str,
    deadline: Option<Duration>,
    fut: F,
) -> (Vec<ContextSection>, f64, bool)
where
    F: std::future::Future<Output = Result<Vec<ContextSection>, RagError>>,
{
    let start = Instant::now();
    let outcome = match deadline {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(stage, "source deadline exceeded");
                return (Vec::new(), elapsed_ms(start), true);
            }
        },
        None => fut.await,
    };
    match outcome {
        Ok(sections) => (sections, elapsed_ms(start), false),
        Err(e) => {
            warn!(stage, error = %e, "source failed; degrading to zero sections");
            (Vec::new(), elapsed_ms(start), false)
        }
    }
}

/// Convenience constructor used by tests and the benchmark harness: an
/// in-memory database with the deterministic local embedder.
pub fn new_in_memory(dim: usize) -> Result<ContextEngine, mnemo_error::Error> {
    let db = Arc::new(Database::init_with_dim(dim).map_err(RagError::Db)?);
    let embedder = Arc::new(CachedEmbedder::new(
        Arc::new(mnemo_embed::EmbeddingProcessor::new_local(dim)),
        db.clone(),
    ));
    Ok(ContextEngine::new(db, embedder, EngineConfig::default()))
}
