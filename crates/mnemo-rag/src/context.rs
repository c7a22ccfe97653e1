//! Budget packing, markdown formatting, and evidence records.
//!
//! The packer reserves 200 tokens of formatting overhead and walks the
//! reranker order, including a section only when it fits the remaining
//! budget. The final markdown order is a display order, grouped by source
//! `[rag, graphrag, kag]` then relevance descending; it is not a ranking.

use std::collections::HashMap;

use mnemo_core::rag_types::{
    ContextEvidenceItem, ContextSection, RankedCandidate, SourceKind, Template,
};

/// Tokens reserved for headers and separators.
pub const FORMAT_OVERHEAD_TOKENS: usize = 200;

/// Exclusion reason for sections dropped by the packer.
pub const EXCLUSION_TOKEN_BUDGET: &str = "token_budget";

/// Body emitted when nothing survives.
pub const EMPTY_CONTEXT_BODY: &str = "No relevant context found";

/// Result of the budget walk.
#[derive(Debug)]
pub struct PackResult {
    /// Included sections, still in reranker order.
    pub included: Vec<RankedCandidate>,
    /// Excluded sections with their exclusion reason.
    pub excluded: Vec<(RankedCandidate, String)>,
    pub total_tokens: usize,
    pub truncated: bool,
}

/// Walk the reranker order and include every section that fits.
pub fn pack_sections(ranked: Vec<RankedCandidate>, token_budget: usize) -> PackResult {
    let budget = token_budget.saturating_sub(FORMAT_OVERHEAD_TOKENS);
    let mut included = Vec::new();
    let mut excluded = Vec::new();
    let mut used = 0usize;

    for cand in ranked {
        if used + cand.section.tokens <= budget {
            used += cand.section.tokens;
            included.push(cand);
        } else {
            excluded.push((cand, EXCLUSION_TOKEN_BUDGET.to_string()));
        }
    }

    PackResult {
        truncated: !excluded.is_empty(),
        total_tokens: used,
        included,
        excluded,
    }
}

fn source_order(source: SourceKind) -> usize {
    match source {
        SourceKind::Rag => 0,
        SourceKind::GraphRag => 1,
        SourceKind::Kag => 2,
    }
}

/// Sort included sections into display order: source group, then relevance
/// descending, then id for determinism.
pub fn display_order(included: &[RankedCandidate]) -> Vec<&ContextSection> {
    let mut sections: Vec<&ContextSection> = included.iter().map(|c| &c.section).collect();
    sections.sort_by(|a, b| {
        source_order(a.source)
            .cmp(&source_order(b.source))
            .then_with(|| {
                b.relevance
                    .partial_cmp(&a.relevance)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.id.cmp(&b.id))
    });
    sections
}

fn group_heading(source: SourceKind) -> &'static str {
    match source {
        SourceKind::Rag => "## Relevant Memories",
        SourceKind::GraphRag => "## Knowledge Graph Insights",
        SourceKind::Kag => "## Code Relationships",
    }
}

fn section_body(section: &ContextSection, template: Template) -> String {
    match template {
        Template::Compact if section.source == SourceKind::Rag => section
            .content
            .lines()
            .next()
            .unwrap_or_default()
            .to_string(),
        _ => section.content.clone(),
    }
}

/// Render the markdown bundle.
pub fn format_context(query: &str, sections: &[&ContextSection], template: Template) -> String {
    let mut out = format!("# Context for: {query}\n");
    if sections.is_empty() {
        out.push('\n');
        out.push_str(EMPTY_CONTEXT_BODY);
        out.push('\n');
        return out;
    }
    let mut current_group: Option<SourceKind> = None;
    for section in sections {
        if current_group != Some(section.source) {
            out.push('\n');
            out.push_str(group_heading(section.source));
            out.push('\n');
            current_group = Some(section.source);
        }
        out.push('\n');
        out.push_str(&format!("### {}\n", section.title));
        out.push_str(&section_body(section, template));
        out.push('\n');
    }
    out
}

/// Build the per-candidate audit records, preserving reranker rank for every
/// candidate whether included or not.
pub fn build_evidence(
    included: &[RankedCandidate],
    excluded: &[(RankedCandidate, String)],
) -> Vec<ContextEvidenceItem> {
    let exclusion: HashMap<&str, &str> = excluded
        .iter()
        .map(|(c, reason)| (c.section.id.as_str(), reason.as_str()))
        .collect();

    let mut items: Vec<ContextEvidenceItem> = included
        .iter()
        .chain(excluded.iter().map(|(c, _)| c))
        .map(|cand| {
            let excluded_reason = exclusion.get(cand.section.id.as_str());
            ContextEvidenceItem {
                id: cand.section.id.clone(),
                title: cand.section.title.clone(),
                source: cand.section.source,
                rank: cand.rank,
                relevance: cand.section.relevance,
                reranker_score: Some(cand.score),
                reranker_breakdown: Some(cand.breakdown),
                tokens: cand.section.tokens,
                included: excluded_reason.is_none(),
                exclusion_reason: excluded_reason.map(|r| r.to_string()),
                reason: cand.section.evidence.reason.clone(),
                query_terms: cand.section.evidence.query_terms.clone(),
                detail: cand.section.evidence.detail.clone(),
            }
        })
        .collect();
    items.sort_by_key(|i| i.rank);
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_core::rag_types::{RerankBreakdown, SectionEvidence};

    fn cand(id: &str, source: SourceKind, relevance: f64, tokens: usize, rank: usize) -> RankedCandidate {
        RankedCandidate {
            section: ContextSection {
                id: id.to_string(),
                title: format!("Title {id}"),
                content: format!("line one of {id}\nline two of {id}"),
                tokens,
                relevance,
                source,
                evidence: SectionEvidence::new(format!("reason {id}")),
                source_memory_ids: Vec::new(),
            },
            rank,
            score: 0.5,
            breakdown: RerankBreakdown {
                semantic: 1.0,
                source_balance: 0.0,
                novelty: 0.0,
                redundancy_penalty: 0.0,
            },
        }
    }

    #[test]
    fn packer_respects_budget_reserve() {
        let ranked = vec![
            cand("a", SourceKind::Rag, 0.9, 500, 0),
            cand("b", SourceKind::Kag, 0.8, 400, 1),
            cand("c", SourceKind::Rag, 0.7, 200, 2),
        ];
        // 1000 total - 200 reserve = 800 available: a (500) fits, b (400)
        // does not, c (200) still fits after a.
        let packed = pack_sections(ranked, 1000);
        let ids: Vec<&str> = packed.included.iter().map(|c| c.section.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(packed.total_tokens, 700);
        assert!(packed.truncated);
        assert_eq!(packed.excluded[0].1, EXCLUSION_TOKEN_BUDGET);
    }

    #[test]
    fn minimum_budget_packs_nothing() {
        let ranked = vec![cand("a", SourceKind::Rag, 0.9, 10, 0)];
        let packed = pack_sections(ranked, 100);
        assert!(packed.included.is_empty());
        assert!(packed.truncated, "a candidate existed and was dropped");
        assert_eq!(packed.total_tokens, 0);
    }

    #[test]
    fn selected_token_sum_obeys_invariant() {
        let ranked: Vec<_> = (0..10)
            .map(|i| cand(&format!("s{i}"), SourceKind::Rag, 0.9, 97, i))
            .collect();
        let budget = 500;
        let packed = pack_sections(ranked, budget);
        assert!(packed.total_tokens <= budget - FORMAT_OVERHEAD_TOKENS);
    }

    #[test]
    fn display_groups_in_source_order() {
        let included = vec![
            cand("k", SourceKind::Kag, 0.99, 10, 0),
            cand("g", SourceKind::GraphRag, 0.5, 10, 1),
            cand("r1", SourceKind::Rag, 0.6, 10, 2),
            cand("r2", SourceKind::Rag, 0.9, 10, 3),
        ];
        let ordered = display_order(&included);
        let ids: Vec<&str> = ordered.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["r2", "r1", "g", "k"]);
    }

    #[test]
    fn markdown_has_query_header_and_groups() {
        let included = vec![
            cand("r", SourceKind::Rag, 0.9, 10, 0),
            cand("k", SourceKind::Kag, 0.8, 10, 1),
        ];
        let ordered = display_order(&included);
        let md = format_context("what calls f?", &ordered, Template::Default);
        assert!(md.starts_with("# Context for: what calls f?"));
        assert!(md.contains("## Relevant Memories"));
        assert!(md.contains("## Code Relationships"));
        assert!(!md.contains("## Knowledge Graph Insights"));
        assert!(md.contains("### Title r"));
        assert!(md.contains("line two of r"));
    }

    #[test]
    fn compact_template_trims_rag_sections_only() {
        let included = vec![
            cand("r", SourceKind::Rag, 0.9, 10, 0),
            cand("k", SourceKind::Kag, 0.8, 10, 1),
        ];
        let ordered = display_order(&included);
        let md = format_context("q", &ordered, Template::Compact);
        assert!(md.contains("line one of r"));
        assert!(!md.contains("line two of r"));
        assert!(md.contains("line two of k"), "non-RAG sections stay full");
    }

    #[test]
    fn empty_sections_emit_placeholder() {
        let md = format_context("q", &[], Template::Default);
        assert!(md.contains(EMPTY_CONTEXT_BODY));
    }

    #[test]
    fn evidence_preserves_ranks_for_excluded() {
        let ranked = vec![
            cand("a", SourceKind::Rag, 0.9, 500, 0),
            cand("b", SourceKind::Kag, 0.8, 5000, 1),
        ];
        let packed = pack_sections(ranked, 1000);
        let evidence = build_evidence(&packed.included, &packed.excluded);
        assert_eq!(evidence.len(), 2);
        assert_eq!(evidence[0].id, "a");
        assert!(evidence[0].included);
        assert_eq!(evidence[1].id, "b");
        assert_eq!(evidence[1].rank, 1);
        assert!(!evidence[1].included);
        assert_eq!(evidence[1].exclusion_reason.as_deref(), Some(EXCLUSION_TOKEN_BUDGET));
    }
}
