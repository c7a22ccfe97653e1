//! Route classification: query intent → source ratios.
//!
//! A pure function of the lowercased query and the two source toggles. The
//! pattern sets are data so they can be regression-tested on their own, and
//! the ratio table is fixed so comparative benchmarks reproduce across
//! installs.

use lazy_static::lazy_static;
use mnemo_core::rag_types::{Route, RouteConfig};
use regex::Regex;

lazy_static! {
    static ref CODE_TOKENS: Regex = Regex::new(
        r"\b(call|callers|callee|calls|dependency|dependencies|import|implementation|implements|interface|class|function|method|impact|affected|break|references|definition)\b"
    )
    .unwrap();
    static ref TRAVERSAL_VERBS: Regex =
        Regex::new(r"\b(trace|traverse|map|follow|flow|pipeline|chain|end-to-end|across)\b").unwrap();
    static ref WHICH_FILES: Regex =
        Regex::new(r"\b(which|what|list|show)\b.*\b(files|paths)\b").unwrap();
    static ref ACROSS_UNITS: Regex =
        Regex::new(r"\b(across|between)\b.*\b(apps|packages|services|modules)\b").unwrap();
    static ref IDENT_CALL: Regex = Regex::new(r"[a-z_][a-z0-9_]*\(").unwrap();
    static ref MEMORY_TOKENS: Regex = Regex::new(
        r"\b(decision|why|reason|tradeoff|history|adr|note|context|previous|past|policy|convention)\b"
    )
    .unwrap();
}

fn has_code_intent(query: &str) -> bool {
    CODE_TOKENS.is_match(query)
        || TRAVERSAL_VERBS.is_match(query)
        || WHICH_FILES.is_match(query)
        || ACROSS_UNITS.is_match(query)
        || IDENT_CALL.is_match(query)
}

fn has_memory_intent(query: &str) -> bool {
    MEMORY_TOKENS.is_match(query)
}

/// Classify a query. The returned ratios always sum to 1 and the limits come
/// from the fixed table below.
pub fn classify_route(
    query: &str,
    include_code_graph: bool,
    include_graphrag: bool,
) -> RouteConfig {
    let lowered = query.to_lowercase();
    let code = has_code_intent(&lowered);
    let memory = has_memory_intent(&lowered);

    let route = match (code, memory) {
        (true, false) => Route::Code,
        (false, true) => Route::Memory,
        _ => Route::Hybrid,
    };

    let (rag, kag, graphrag, rag_limit, graphrag_limit) =
        match (route, include_code_graph, include_graphrag) {
            (Route::Code, true, true) => (0.20, 0.65, 0.15, 8, 6),
            (Route::Code, true, false) => (0.25, 0.75, 0.00, 8, 0),
            (Route::Code, false, true) => (0.80, 0.00, 0.20, 12, 6),
            (Route::Code, false, false) => (1.00, 0.00, 0.00, 12, 0),
            (Route::Memory, true, true) => (0.75, 0.10, 0.15, 20, 8),
            (Route::Memory, true, false) => (0.90, 0.10, 0.00, 20, 0),
            (Route::Memory, false, true) => (0.85, 0.00, 0.15, 20, 8),
            (Route::Memory, false, false) => (1.00, 0.00, 0.00, 20, 0),
            (Route::Hybrid, true, true) => (0.55, 0.30, 0.15, 16, 7),
            (Route::Hybrid, true, false) => (0.70, 0.30, 0.00, 16, 0),
            (Route::Hybrid, false, true) => (0.80, 0.00, 0.20, 18, 7),
            (Route::Hybrid, false, false) => (1.00, 0.00, 0.00, 18, 0),
        };

    // The table rows already sum to 1; normalize anyway so a future edit
    // cannot break the invariant silently.
    let sum: f64 = rag + kag + graphrag;
    let norm = if sum > 0.0 { sum } else { 1.0 };

    RouteConfig {
        route,
        rag_ratio: rag / norm,
        kag_ratio: kag / norm,
        graphrag_ratio: graphrag / norm,
        rag_limit,
        graphrag_limit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn code_intent_queries() {
        for q in [
            "what calls validateToken?",
            "list the callers of handleRequest",
            "trace the auth flow end-to-end",
            "which files contain the parser",
            "impact of changing this interface",
            "validateToken( usage",
        ] {
            assert_eq!(classify_route(q, true, true).route, Route::Code, "{q}");
        }
    }

    #[test]
    fn memory_intent_queries() {
        for q in [
            "what did we decide about authentication?",
            "why is the cache process-local",
            "past tradeoff notes on sharding",
            "team convention for error handling",
        ] {
            assert_eq!(classify_route(q, true, true).route, Route::Memory, "{q}");
        }
    }

    #[test]
    fn mixed_or_plain_queries_are_hybrid() {
        // Both intents.
        assert_eq!(
            classify_route("why does handleRequest call retry?", true, true).route,
            Route::Hybrid
        );
        // Neither intent.
        assert_eq!(
            classify_route("tell me about the project", true, true).route,
            Route::Hybrid
        );
    }

    #[test]
    fn ratio_table_reproduces() {
        let cases: &[(&str, bool, bool, f64, f64, f64, usize, usize)] = &[
            ("decision log", false, false, 1.00, 0.00, 0.00, 20, 0),
            ("what calls f?", true, true, 0.20, 0.65, 0.15, 8, 6),
            ("what calls f?", true, false, 0.25, 0.75, 0.00, 8, 0),
            ("what calls f?", false, true, 0.80, 0.00, 0.20, 12, 6),
            ("decision log", true, true, 0.75, 0.10, 0.15, 20, 8),
            ("decision log", true, false, 0.90, 0.10, 0.00, 20, 0),
            ("decision log", false, true, 0.85, 0.00, 0.15, 20, 8),
            ("hello world", true, true, 0.55, 0.30, 0.15, 16, 7),
            ("hello world", true, false, 0.70, 0.30, 0.00, 16, 0),
            ("hello world", false, true, 0.80, 0.00, 0.20, 18, 7),
        ];
        for (q, icg, igr, rag, kag, graphrag, rl, gl) in cases {
            let cfg = classify_route(q, *icg, *igr);
            assert!(approx(cfg.rag_ratio, *rag), "{q} {icg} {igr} rag");
            assert!(approx(cfg.kag_ratio, *kag), "{q} {icg} {igr} kag");
            assert!(approx(cfg.graphrag_ratio, *graphrag), "{q} {icg} {igr} graphrag");
            assert_eq!(cfg.rag_limit, *rl, "{q} rag_limit");
            assert_eq!(cfg.graphrag_limit, *gl, "{q} graphrag_limit");
        }
    }

    #[test]
    fn ratios_always_sum_to_one() {
        for q in ["what calls f?", "decision log", "hello"] {
            for icg in [true, false] {
                for igr in [true, false] {
                    let cfg = classify_route(q, icg, igr);
                    assert!(approx(cfg.rag_ratio + cfg.kag_ratio + cfg.graphrag_ratio, 1.0));
                }
            }
        }
    }

    #[test]
    fn stopword_only_query_still_routes() {
        let cfg = classify_route("the and of", true, true);
        assert_eq!(cfg.route, Route::Hybrid);
    }
}
