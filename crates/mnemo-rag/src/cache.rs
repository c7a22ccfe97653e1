//! Result cache: process-local LRU with TTL and memory-keyed invalidation.
//!
//! The key is a blake3 hash over a canonical `key=value` encoding of the
//! request, so two requests differing only in map-iteration order of their
//! filters produce the same key. Reads refresh recency and evict expired
//! entries before returning; storing or mutating a memory invalidates every
//! entry whose `memory_ids` contain it.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lazy_static::lazy_static;
use mnemo_core::rag_types::{RetrieveRequest, RetrieveResponse};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Cache configuration.
///
/// Environment overrides: `MNEMO_CACHE_MAX_ENTRIES`, `MNEMO_CACHE_TTL_MS`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: usize,
    pub ttl_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let max_entries = std::env::var("MNEMO_CACHE_MAX_ENTRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(128);
        let ttl_ms = std::env::var("MNEMO_CACHE_TTL_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5 * 60 * 1000);
        Self {
            enabled: true,
            max_entries,
            ttl_ms,
        }
    }
}

/// Cheap-to-read counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub current_entries: usize,
    pub evictions: u64,
    pub invalidations: u64,
}

struct CacheEntry {
    value: RetrieveResponse,
    memory_ids: HashSet<Uuid>,
    inserted_at: Instant,
    last_accessed_at: Instant,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
    evictions: u64,
    invalidations: u64,
}

pub struct ResultCache {
    config: CacheConfig,
    inner: Mutex<CacheInner>,
}

/// Build the canonical cache key for a request. Filter tags are sorted so
/// map/set iteration order cannot leak into the key.
pub fn cache_key(request: &RetrieveRequest, embedding_model: &str, scoring_hash: &str) -> String {
    let normalized_query = request
        .query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    let mut encoded = String::with_capacity(256);
    encoded.push_str(&format!("query={normalized_query}\n"));
    if let Some(filters) = &request.filters {
        if let Some(ty) = filters.memory_type {
            encoded.push_str(&format!("filter.type={ty}\n"));
        }
        let mut tags = filters.tags.clone();
        tags.sort();
        if !tags.is_empty() {
            encoded.push_str(&format!("filter.tags={}\n", tags.join(",")));
        }
        if let Some(min) = filters.min_importance {
            encoded.push_str(&format!("filter.min_importance={min}\n"));
        }
    }
    encoded.push_str(&format!("token_budget={}\n", request.token_budget));
    encoded.push_str(&format!("include_code_graph={}\n", request.include_code_graph));
    encoded.push_str(&format!("include_graphrag={}\n", request.include_graphrag));
    encoded.push_str(&format!("template={:?}\n", request.template));
    encoded.push_str(&format!("include_evidence={}\n", request.include_evidence));
    encoded.push_str(&format!("embedding_model={embedding_model}\n"));
    encoded.push_str(&format!("scoring={scoring_hash}\n"));

    blake3::hash(encoded.as_bytes()).to_hex().to_string()
}

impl ResultCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// Fetch an entry, refreshing recency. Expired entries are evicted
    /// before being returned.
    pub fn get(&self, key: &str) -> Option<RetrieveResponse> {
        if !self.config.enabled {
            return None;
        }
        let ttl = Duration::from_millis(self.config.ttl_ms);
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("cache lock");

        let expired = matches!(inner.entries.get(key), Some(e) if e.inserted_at.elapsed() >= ttl);
        if expired {
            inner.entries.remove(key);
            inner.evictions += 1;
            inner.misses += 1;
            return None;
        }

        let value = inner.entries.get_mut(key).map(|entry| {
            entry.last_accessed_at = now;
            entry.value.clone()
        });
        match value {
            Some(v) => {
                inner.hits += 1;
                Some(v)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Insert an entry, evicting the least-recently-used entry past the cap.
    pub fn put(&self, key: String, value: RetrieveResponse, memory_ids: Vec<Uuid>) {
        if !self.config.enabled || self.config.max_entries == 0 {
            return;
        }
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("cache lock");
        inner.entries.insert(
            key,
            CacheEntry {
                value,
                memory_ids: memory_ids.into_iter().collect(),
                inserted_at: now,
                last_accessed_at: now,
            },
        );
        while inner.entries.len() > self.config.max_entries {
            let lru = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_accessed_at)
                .map(|(k, _)| k.clone());
            match lru {
                Some(k) => {
                    inner.entries.remove(&k);
                    inner.evictions += 1;
                }
                None => break,
            }
        }
    }

    /// Remove every entry whose invalidation set contains the memory.
    pub fn invalidate_memory(&self, memory_id: Uuid) {
        let mut inner = self.inner.lock().expect("cache lock");
        let before = inner.entries.len();
        inner.entries.retain(|_, e| !e.memory_ids.contains(&memory_id));
        let removed = (before - inner.entries.len()) as u64;
        if removed > 0 {
            debug!(memory_id = %memory_id, removed, "cache invalidation");
        }
        inner.invalidations += removed;
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().expect("cache lock");
        let total = inner.hits + inner.misses;
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            hit_rate: if total == 0 {
                0.0
            } else {
                inner.hits as f64 / total as f64
            },
            current_entries: inner.entries.len(),
            evictions: inner.evictions,
            invalidations: inner.invalidations,
        }
    }

    /// Drop all entries and counters; for tests.
    pub fn reset(&self) {
        *self.inner.lock().expect("cache lock") = CacheInner::default();
    }
}

lazy_static! {
    static ref GLOBAL_CACHE: ResultCache = ResultCache::new(CacheConfig::default());
}

/// The process-lifetime cache instance. Lazily initialized from the default
/// (environment-aware) configuration; tests reset it via [`ResultCache::reset`].
pub fn global_cache() -> &'static ResultCache {
    &GLOBAL_CACHE
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_core::rag_types::{
        MemoryFilters, RetrieveMetadata, Route, StageTimings, Template,
    };
    use mnemo_core::types::MemoryType;

    fn response() -> RetrieveResponse {
        RetrieveResponse {
            context: "# Context for: q".into(),
            metadata: RetrieveMetadata {
                total_tokens: 10,
                sections_included: 1,
                rag_sections: 1,
                kag_sections: 0,
                graphrag_sections: 0,
                truncated: false,
                route: Route::Memory,
                stage_timings: StageTimings::default(),
                cache_hit: None,
            },
            evidence: None,
        }
    }

    fn config(max_entries: usize, ttl_ms: u64) -> CacheConfig {
        CacheConfig {
            enabled: true,
            max_entries,
            ttl_ms,
        }
    }

    #[test]
    fn key_invariant_under_tag_order() {
        let mut a = RetrieveRequest::new("what did we decide?");
        a.filters = Some(MemoryFilters {
            memory_type: Some(MemoryType::Decision),
            tags: vec!["auth".into(), "jwt".into()],
            min_importance: Some(0.5),
        });
        let mut b = a.clone();
        b.filters.as_mut().unwrap().tags = vec!["jwt".into(), "auth".into()];
        assert_eq!(cache_key(&a, "m", "s"), cache_key(&b, "m", "s"));
    }

    #[test]
    fn key_differs_on_model_and_budget() {
        let a = RetrieveRequest::new("q");
        let mut b = a.clone();
        b.token_budget = 500;
        assert_ne!(cache_key(&a, "m", "s"), cache_key(&b, "m", "s"));
        assert_ne!(cache_key(&a, "m1", "s"), cache_key(&a, "m2", "s"));
        assert_ne!(cache_key(&a, "m", "s1"), cache_key(&a, "m", "s2"));
    }

    #[test]
    fn key_normalizes_whitespace() {
        let a = RetrieveRequest::new("what   did we  decide");
        let b = RetrieveRequest::new("What did we decide ");
        assert_eq!(cache_key(&a, "m", "s"), cache_key(&b, "m", "s"));
        assert_eq!(a.template, Template::Default);
    }

    #[test]
    fn hit_miss_and_stats() {
        let cache = ResultCache::new(config(8, 60_000));
        assert!(cache.get("k").is_none());
        cache.put("k".into(), response(), vec![]);
        assert!(cache.get("k").is_some());
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.current_entries, 1);
        assert!((stats.hit_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn ttl_expiry_evicts_on_read() {
        let cache = ResultCache::new(config(8, 0));
        cache.put("k".into(), response(), vec![]);
        assert!(cache.get("k").is_none(), "zero ttl expires immediately");
        assert_eq!(cache.stats().evictions, 1);
        assert_eq!(cache.stats().current_entries, 0);
    }

    #[test]
    fn lru_eviction_past_capacity() {
        let cache = ResultCache::new(config(2, 60_000));
        cache.put("a".into(), response(), vec![]);
        cache.put("b".into(), response(), vec![]);
        // Touch "a" so "b" becomes the LRU.
        assert!(cache.get("a").is_some());
        std::thread::sleep(std::time::Duration::from_millis(2));
        cache.put("c".into(), response(), vec![]);
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn memory_invalidation_removes_matching_entries() {
        let cache = ResultCache::new(config(8, 60_000));
        let m1 = Uuid::new_v4();
        let m2 = Uuid::new_v4();
        cache.put("with-m1".into(), response(), vec![m1]);
        cache.put("with-m2".into(), response(), vec![m2]);
        cache.invalidate_memory(m1);
        assert!(cache.get("with-m1").is_none());
        assert!(cache.get("with-m2").is_some());
        assert!(cache.stats().invalidations >= 1);
    }

    #[test]
    fn reset_clears_everything() {
        let cache = ResultCache::new(config(8, 60_000));
        cache.put("k".into(), response(), vec![]);
        cache.reset();
        assert_eq!(cache.stats().current_entries, 0);
        assert_eq!(cache.stats().hits, 0);
    }
}
