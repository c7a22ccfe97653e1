//! Benchmark harness: warm/cold latency over a query set.
//!
//! Each query runs `warmup_runs` unmeasured executions, then
//! `runs_per_query` measured ones, recording per-stage and total latency
//! plus the cache hit/miss of each measured run. Summary percentiles are
//! broken down by route and by stage. With `compare_against_memory_only`
//! set, a second scenario disables both code sources and reports overhead
//! ratios over a guarded denominator.

use std::collections::HashMap;

use mnemo_core::rag_types::{RetrieveRequest, Route, StageTimings};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::engine::ContextEngine;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    pub warmup_runs: usize,
    pub runs_per_query: usize,
    pub compare_against_memory_only: bool,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            warmup_runs: 1,
            runs_per_query: 3,
            compare_against_memory_only: false,
        }
    }
}

/// Summary statistics over a latency sample, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Floor for overhead-ratio denominators.
const MIN_DENOMINATOR_MS: f64 = 0.01;

pub fn latency_stats(samples: &[f64]) -> LatencyStats {
    if samples.is_empty() {
        return LatencyStats::default();
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let pct = |p: f64| {
        let idx = ((sorted.len() as f64 - 1.0) * p).round() as usize;
        sorted[idx.min(sorted.len() - 1)]
    };
    LatencyStats {
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        avg: sorted.iter().sum::<f64>() / sorted.len() as f64,
        p50: pct(0.50),
        p95: pct(0.95),
        p99: pct(0.99),
    }
}

/// One measured run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasuredRun {
    pub query: String,
    pub route: Route,
    pub cache_hit: bool,
    pub timings: StageTimings,
}

/// Overhead of the full pipeline relative to the memory-only baseline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OverheadRatios {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub runs: Vec<MeasuredRun>,
    pub overall: LatencyStats,
    pub by_route: HashMap<Route, LatencyStats>,
    pub by_stage: HashMap<String, LatencyStats>,
    pub memory_only_overhead: Option<OverheadRatios>,
}

fn stage_samples(runs: &[MeasuredRun]) -> HashMap<String, Vec<f64>> {
    let mut out: HashMap<String, Vec<f64>> = HashMap::new();
    for run in runs {
        let t = run.timings;
        for (name, value) in [
            ("rag", t.rag),
            ("kag", t.kag),
            ("graphrag", t.graphrag),
            ("rerank", t.rerank),
            ("format", t.format),
            ("tokenize", t.tokenize),
            ("evidence", t.evidence),
            ("total", t.total),
        ] {
            out.entry(name.to_string()).or_default().push(value);
        }
    }
    out
}

impl ContextEngine {
    /// Run the benchmark over a query set.
    #[instrument(skip(self, queries, config), fields(queries = queries.len()))]
    pub async fn benchmark(
        &self,
        queries: &[String],
        config: &BenchmarkConfig,
    ) -> Result<BenchmarkReport, mnemo_error::Error> {
        let runs = self.run_scenario(queries, config, true, true).await?;

        let totals: Vec<f64> = runs.iter().map(|r| r.timings.total).collect();
        let overall = latency_stats(&totals);

        let mut route_samples: HashMap<Route, Vec<f64>> = HashMap::new();
        for run in &runs {
            route_samples
                .entry(run.route)
                .or_default()
                .push(run.timings.total);
        }
        let by_route = route_samples
            .into_iter()
            .map(|(route, samples)| (route, latency_stats(&samples)))
            .collect();
        let by_stage = stage_samples(&runs)
            .into_iter()
            .map(|(stage, samples)| (stage, latency_stats(&samples)))
            .collect();

        let memory_only_overhead = if config.compare_against_memory_only {
            let baseline_runs = self.run_scenario(queries, config, false, false).await?;
            let baseline_totals: Vec<f64> =
                baseline_runs.iter().map(|r| r.timings.total).collect();
            let baseline = latency_stats(&baseline_totals);
            Some(OverheadRatios {
                p50: overall.p50 / baseline.p50.max(MIN_DENOMINATOR_MS),
                p95: overall.p95 / baseline.p95.max(MIN_DENOMINATOR_MS),
                p99: overall.p99 / baseline.p99.max(MIN_DENOMINATOR_MS),
            })
        } else {
            None
        };

        Ok(BenchmarkReport {
            runs,
            overall,
            by_route,
            by_stage,
            memory_only_overhead,
        })
    }

    async fn run_scenario(
        &self,
        queries: &[String],
        config: &BenchmarkConfig,
        include_code_graph: bool,
        include_graphrag: bool,
    ) -> Result<Vec<MeasuredRun>, mnemo_error::Error> {
        let mut runs = Vec::with_capacity(queries.len() * config.runs_per_query);
        for query in queries {
            let request = RetrieveRequest {
                query: query.clone(),
                include_code_graph,
                include_graphrag,
                ..Default::default()
            };
            for _ in 0..config.warmup_runs {
                let _ = self.retrieve(request.clone()).await?;
            }
            for _ in 0..config.runs_per_query {
                let response = self.retrieve(request.clone()).await?;
                runs.push(MeasuredRun {
                    query: query.clone(),
                    route: response.metadata.route,
                    cache_hit: response.metadata.cache_hit.unwrap_or(false),
                    timings: response.metadata.stage_timings,
                });
            }
        }
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::new_in_memory;

    #[test]
    fn percentile_math() {
        let samples: Vec<f64> = (1..=100).map(|i| i as f64).collect();
        let stats = latency_stats(&samples);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 100.0);
        assert_eq!(stats.p50, 50.0);
        assert_eq!(stats.p95, 95.0);
        assert_eq!(stats.p99, 99.0);
        assert!((stats.avg - 50.5).abs() < 1e-9);
    }

    #[test]
    fn empty_sample_is_zeroed() {
        assert_eq!(latency_stats(&[]), LatencyStats::default());
    }

    #[tokio::test]
    async fn benchmark_produces_stage_breakdown() {
        let engine = new_in_memory(32).unwrap();
        let queries = vec!["what calls handler?".to_string(), "past decisions".to_string()];
        let report = engine
            .benchmark(
                &queries,
                &BenchmarkConfig {
                    warmup_runs: 1,
                    runs_per_query: 2,
                    compare_against_memory_only: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(report.runs.len(), 4);
        assert!(report.by_stage.contains_key("rag"));
        assert!(report.by_stage.contains_key("total"));
        assert!(report.memory_only_overhead.is_some());
        // Warmup populated the cache, so measured runs are hits.
        assert!(report.runs.iter().all(|r| r.cache_hit));
        assert!(report.by_route.len() >= 2, "code and memory routes present");
    }
}
