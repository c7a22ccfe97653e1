//! KAG source: code-graph retrieval.
//!
//! Two sub-stages. The entity sub-stage extracts identifier candidates from
//! the query, probes the graph through a family of derived names, and emits
//! call-graph (and implementation) sections. The file-lookup sub-stage fires
//! on file-ish queries or when no entity matched: it derives hints from the
//! query, scores file paths lexically, expands along code-graph edges from
//! the top anchors, and reserves 70% of the result slots for lexical hits.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use itertools::Itertools;
use lazy_static::lazy_static;
use mnemo_core::rag_types::{ContextSection, EvidenceDetail, SectionEvidence, SourceKind};
use mnemo_core::text::{find_matched_terms, is_camel_or_pascal, to_kebab_case};
use mnemo_core::token::count_tokens;
use mnemo_core::types::{CodeNode, CodeNodeType};
use mnemo_db::{Database, TraversalDirection};
use regex::Regex;
use tracing::{debug, instrument};

use crate::error::RagError;

const MAX_CODE_CANDIDATES: usize = 6;
const HINT_CAP: usize = 24;
const ANCHOR_COUNT: usize = 8;
const NEIGHBOR_LIMIT: usize = 5;
const CALL_GRAPH_RELEVANCE: f64 = 0.8;
const IMPLEMENTATIONS_RELEVANCE: f64 = 0.7;

lazy_static! {
    static ref IDENT_CALL: Regex = Regex::new(r"([A-Za-z_][A-Za-z0-9_]*)\(").unwrap();
    static ref FILE_LOOKUP_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"in which files|which files|file paths|exact file paths").unwrap(),
        Regex::new(r"where\b.*\b(defined|implemented|written|located)").unwrap(),
        Regex::new(r"list\b.*\bfiles").unwrap(),
        Regex::new(r"\b(trace|map|traverse|follow)\b.*\b(flow|pipeline|chain|files|paths|implementation)")
            .unwrap(),
        Regex::new(r"end[- ]to[- ]end").unwrap(),
        Regex::new(r"\bacross\b.*\b(apps|packages|services)").unwrap(),
    ];
    /// Terms that never form a hint alone.
    static ref WEAK_TERMS: HashSet<&'static str> = [
        "files", "file", "paths", "path", "exact", "where", "across",
        "include", "using", "modules", "module", "define", "defined",
        "imported", "referenced", "query", "queries", "mutation",
        "mutations", "code",
    ]
    .into_iter()
    .collect();
}

const NAME_EXTS: &[&str] = &[".ts", ".tsx", ".js", ".jsx"];
const ROLE_SUFFIXES: &[&str] = &["-controller", "-service", "-model", "-module"];

/// Identifier candidates: camelCase/PascalCase tokens plus identifiers
/// immediately followed by `(`.
pub fn code_candidates(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let mut push = |s: String| {
        if seen.insert(s.clone()) && out.len() < MAX_CODE_CANDIDATES {
            out.push(s);
        }
    };
    for token in query.split(|c: char| !(c.is_alphanumeric() || c == '_')) {
        if token.len() >= 3 && is_camel_or_pascal(token) {
            push(token.to_string());
        }
    }
    for cap in IDENT_CALL.captures_iter(query) {
        push(cap[1].to_string());
    }
    out
}

/// The family of names probed for one candidate, most specific first.
fn name_family(candidate: &str) -> Vec<String> {
    let mut names = vec![candidate.to_string()];
    let kebab = to_kebab_case(candidate);
    if kebab != candidate {
        names.push(kebab.clone());
    }
    for ext in NAME_EXTS {
        names.push(format!("{kebab}{ext}"));
    }
    for suffix in ROLE_SUFFIXES {
        if let Some(base) = kebab.strip_suffix(suffix) {
            let role = &suffix[1..];
            names.push(base.to_string());
            names.push(format!("{base}.{role}"));
            for ext in NAME_EXTS {
                names.push(format!("{base}.{role}{ext}"));
            }
        }
    }
    names
}

fn kind_specificity(kind: CodeNodeType) -> usize {
    match kind {
        CodeNodeType::Function => 0,
        CodeNodeType::Method => 1,
        CodeNodeType::Class => 2,
        CodeNodeType::Interface => 3,
        CodeNodeType::Type => 4,
        CodeNodeType::Module => 5,
    }
}

fn node_display_name(node_id: &str) -> &str {
    node_id.rsplit(':').next().unwrap_or(node_id)
}

/// Paths never surfaced by the file-lookup stage.
fn is_excluded_path(path: &str) -> bool {
    let p = path.to_lowercase();
    p.contains("/test/")
        || p.contains("/tests/")
        || p.contains("__tests__")
        || p.contains(".test.")
        || p.contains(".spec.")
        || p.starts_with("test/")
        || p.starts_with("tests/")
        || p.contains("/dist/")
        || p.starts_with("dist/")
        || p.contains("/build/")
        || p.starts_with("build/")
        || p.contains("/coverage/")
        || p.starts_with("coverage/")
        || p.contains("generated")
        || p.contains("node_modules")
        || p.ends_with(".d.ts")
}

/// Derive path hints from query terms and code candidates. Capped at 24.
pub fn build_hints(query_terms: &[String], candidates: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut hints = Vec::new();
    let mut push = |s: String| {
        if s.len() >= 3 && seen.insert(s.clone()) && hints.len() < HINT_CAP {
            hints.push(s);
        }
    };

    let is_weak = |t: &str| WEAK_TERMS.contains(t);

    // (i) long single terms; weak terms never hint alone.
    for t in query_terms {
        if t.len() >= 5 && !is_weak(t) {
            push(t.clone());
        }
    }

    // (ii) bigram/trigram joins of adjacent terms. Weak terms may join in
    // but a hint needs at least one non-weak part.
    // (iii) singular/plural expansion on the bigram tail, covering the
    // `access code(s)` family of path spellings.
    for window in query_terms.windows(2) {
        let (a, b) = (&window[0], &window[1]);
        if is_weak(a) && is_weak(b) {
            continue;
        }
        let mut tails = vec![b.clone()];
        if let Some(stripped) = b.strip_suffix('s') {
            if stripped.len() >= 3 {
                tails.push(stripped.to_string());
            }
        } else {
            tails.push(format!("{b}s"));
        }
        for tail in tails {
            push(format!("{a}-{tail}"));
            push(format!("{a}_{tail}"));
            push(format!("{a}{tail}"));
        }
    }
    for window in query_terms.windows(3) {
        let (a, b, c) = (&window[0], &window[1], &window[2]);
        if is_weak(a) && is_weak(b) && is_weak(c) {
            continue;
        }
        push(format!("{a}-{b}-{c}"));
        push(format!("{a}_{b}_{c}"));
        push(format!("{a}{b}{c}"));
    }

    // (iv) kebab-cased code candidates and their stripped-suffix forms.
    for cand in candidates {
        let kebab = to_kebab_case(cand);
        push(kebab.clone());
        for suffix in ROLE_SUFFIXES {
            if let Some(base) = kebab.strip_suffix(suffix) {
                push(base.to_string());
            }
        }
    }

    hints
}

#[derive(Debug, Clone)]
struct FileScore {
    path: String,
    score: f64,
    hint_matches: usize,
    node_count: usize,
    /// Set on traversal-only candidates: the anchor that linked them in.
    via_anchor: Option<String>,
}

fn lexical_file_score(
    path: &str,
    node_count: usize,
    hints: &[String],
    query_terms: &[String],
) -> Option<(f64, usize)> {
    let lower = path.to_lowercase();
    let filename = lower.rsplit('/').next().unwrap_or(&lower);
    let stem = filename.split('.').next().unwrap_or(filename);

    let mut score = 0.0f64;
    let mut matches = 0usize;
    let mut longest = 0usize;
    for hint in hints {
        let len = hint.len();
        let contribution = if hint == filename || hint == stem {
            (len as f64 + 7.0).clamp(10.0, 20.0)
        } else if lower.contains(&format!("/{hint}/"))
            || lower.contains(&format!("/{hint}."))
            || lower.ends_with(&format!("/{hint}"))
        {
            (len as f64 + 5.0).clamp(8.0, 18.0)
        } else if lower.contains(hint.as_str()) {
            ((len / 2) as f64).clamp(3.0, 10.0)
        } else {
            continue;
        };
        score += contribution;
        matches += 1;
        longest = longest.max(len);
    }
    if matches == 0 {
        return None;
    }

    let term_hits = query_terms
        .iter()
        .filter(|t| t.len() >= 4 && lower.contains(t.as_str()))
        .count();
    score += 2.5 * term_hits as f64;
    score += (node_count as f64 * 0.1).min(3.0);
    score += (longest as f64 * 0.15).min(4.0);
    Some((score, matches))
}

pub struct KagSource {
    db: Arc<Database>,
}

impl KagSource {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Run both sub-stages. Failures inside either stage degrade to the
    /// sections already produced.
    #[instrument(skip(self, query, query_terms), fields(file_limit = file_limit))]
    pub async fn fetch(
        &self,
        query: &str,
        query_terms: &[String],
        file_limit: usize,
    ) -> Result<Vec<ContextSection>, RagError> {
        let candidates = code_candidates(query);
        let mut sections = self.entity_stage(&candidates, query_terms)?;

        let lowered = query.to_lowercase();
        let file_lookup = FILE_LOOKUP_PATTERNS.iter().any(|p| p.is_match(&lowered))
            || sections.is_empty();
        if file_lookup && file_limit > 0 {
            sections.extend(self.file_lookup_stage(query_terms, &candidates, file_limit)?);
        }
        debug!(kag_sections = sections.len(), "kag fetch complete");
        Ok(sections)
    }

    fn lookup_node(
        &self,
        name: &str,
        modules: &[CodeNode],
    ) -> Result<Option<CodeNode>, RagError> {
        let mut by_name = self.db.find_nodes_by_name(name)?;
        by_name.sort_by_key(|n| kind_specificity(n.kind));
        if let Some(node) = by_name.into_iter().next() {
            return Ok(Some(node));
        }
        // File-shaped names probe module nodes by file name or stem.
        let found = modules.iter().find(|m| {
            let filename = m.file_path.rsplit('/').next().unwrap_or(&m.file_path);
            let stem = filename.split('.').next().unwrap_or(filename);
            filename == name || stem == name || m.file_path.ends_with(&format!("/{name}"))
        });
        Ok(found.cloned())
    }

    fn entity_stage(
        &self,
        candidates: &[String],
        query_terms: &[String],
    ) -> Result<Vec<ContextSection>, RagError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let modules = self.db.module_nodes()?;
        let mut sections = Vec::new();
        let mut matched_ids: HashSet<String> = HashSet::new();

        for candidate in candidates {
            let mut node = None;
            for name in name_family(candidate) {
                match self.lookup_node(&name, &modules) {
                    Ok(Some(n)) => {
                        node = Some(n);
                        break;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        debug!(name = %name, error = %e, "node lookup failed");
                    }
                }
            }
            let Some(node) = node else { continue };
            if !matched_ids.insert(node.id.clone()) {
                continue;
            }

            let traversal =
                self.db
                    .get_call_graph(&node.id, 2, TraversalDirection::Both)?;
            let callers: Vec<&str> = traversal
                .inbound
                .iter()
                .take(NEIGHBOR_LIMIT)
                .map(|n| node_display_name(&n.id))
                .collect();
            let callees: Vec<&str> = traversal
                .outbound
                .iter()
                .take(NEIGHBOR_LIMIT)
                .map(|n| node_display_name(&n.id))
                .collect();

            let mut content = String::new();
            if let Some(sig) = &node.signature {
                content.push_str(&format!("`{sig}`\n"));
            }
            if let Some(summary) = &node.summary {
                content.push_str(&format!("{summary}\n"));
            }
            content.push_str(&format!(
                "Callers: {}\n",
                if callers.is_empty() { "none".to_string() } else { callers.join(", ") }
            ));
            content.push_str(&format!(
                "Callees: {}",
                if callees.is_empty() { "none".to_string() } else { callees.join(", ") }
            ));

            let matched = find_matched_terms(
                query_terms,
                &[&node.name, &node.file_path, node.summary.as_deref().unwrap_or("")],
            );
            sections.push(ContextSection {
                id: node.id.clone(),
                title: format!("Code: {}", node.name),
                tokens: count_tokens(&content),
                content,
                relevance: CALL_GRAPH_RELEVANCE,
                source: SourceKind::Kag,
                evidence: SectionEvidence {
                    reason: format!(
                        "call graph for {} ({}); {} callers, {} callees",
                        node.name,
                        node.file_path,
                        traversal.inbound.len(),
                        traversal.outbound.len()
                    ),
                    query_terms: matched.clone(),
                    detail: Some(EvidenceDetail::Code {
                        node_id: Some(node.id.clone()),
                        file_path: Some(node.file_path.clone()),
                        hint_matches: 0,
                    }),
                },
                source_memory_ids: Vec::new(),
            });

            if node.kind == CodeNodeType::Interface {
                let implementations = self.db.find_implementations(&node.id)?;
                let names: Vec<&str> = implementations
                    .iter()
                    .take(NEIGHBOR_LIMIT)
                    .map(|id| node_display_name(id))
                    .collect();
                let content = if names.is_empty() {
                    "No implementations found".to_string()
                } else {
                    format!("Implemented by: {}", names.join(", "))
                };
                sections.push(ContextSection {
                    id: format!("impl:{}", node.id),
                    title: format!("Implementations: {}", node.name),
                    tokens: count_tokens(&content),
                    content,
                    relevance: IMPLEMENTATIONS_RELEVANCE,
                    source: SourceKind::Kag,
                    evidence: SectionEvidence {
                        reason: format!(
                            "{} implementation(s) of interface {}",
                            implementations.len(),
                            node.name
                        ),
                        query_terms: matched,
                        detail: Some(EvidenceDetail::Code {
                            node_id: Some(node.id.clone()),
                            file_path: Some(node.file_path.clone()),
                            hint_matches: 0,
                        }),
                    },
                    source_memory_ids: Vec::new(),
                });
            }
        }
        Ok(sections)
    }

    fn file_lookup_stage(
        &self,
        query_terms: &[String],
        candidates: &[String],
        limit: usize,
    ) -> Result<Vec<ContextSection>, RagError> {
        let hints = build_hints(query_terms, candidates);
        if hints.is_empty() {
            return Ok(Vec::new());
        }
        let node_counts = self.db.file_node_counts()?;

        let mut lexical: Vec<FileScore> = node_counts
            .iter()
            .filter(|(path, _)| !is_excluded_path(path))
            .filter_map(|(path, count)| {
                lexical_file_score(path, *count, &hints, query_terms).map(
                    |(score, hint_matches)| FileScore {
                        path: path.clone(),
                        score,
                        hint_matches,
                        node_count: *count,
                        via_anchor: None,
                    },
                )
            })
            .collect();
        lexical.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        // Graph expansion from the top lexical anchors.
        let anchors = lexical
            .iter()
            .take(ANCHOR_COUNT)
            .map(|f| f.path.clone())
            .collect_vec();
        let mut traversal: HashMap<String, FileScore> = HashMap::new();
        if !anchors.is_empty() {
            let links = self.db.file_link_counts()?;
            let lexical_paths: HashSet<&str> =
                lexical.iter().map(|f| f.path.as_str()).collect();
            let mut lexical_boost: HashMap<String, f64> = HashMap::new();

            for ((a, b), weight) in &links {
                for (anchor, other) in [(a, b), (b, a)] {
                    if !anchors.contains(anchor) || is_excluded_path(other) {
                        continue;
                    }
                    let raw = (*weight as f64 * 2.0).clamp(2.0, 18.0);
                    let boost = (raw * 0.45).min(6.0);
                    if lexical_paths.contains(other.as_str()) {
                        let extra = (boost * 0.4).min(4.0);
                        let slot = lexical_boost.entry(other.clone()).or_default();
                        *slot = slot.max(extra);
                    } else {
                        let entry =
                            traversal.entry(other.clone()).or_insert_with(|| FileScore {
                                path: other.clone(),
                                score: 0.0,
                                hint_matches: 0,
                                node_count: node_counts.get(other).copied().unwrap_or(0),
                                via_anchor: Some(anchor.clone()),
                            });
                        entry.score = entry.score.max(boost);
                    }
                }
            }
            for f in &mut lexical {
                if let Some(extra) = lexical_boost.get(&f.path) {
                    f.score += extra;
                }
            }
            lexical.sort_by(|a, b| {
                b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        let mut traversal: Vec<FileScore> = traversal.into_values().collect();
        traversal.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        // 70% of slots for lexical hits, 30% for traversal-only.
        let traversal_cap = (limit * 3) / 10;
        let traversal_take = traversal_cap.min(traversal.len());
        let lexical_take = lexical.len().min(limit - traversal_take);
        let mut selected: Vec<FileScore> = lexical.into_iter().take(lexical_take).collect();
        selected.extend(traversal.into_iter().take(traversal_take));
        selected.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        selected.truncate(limit);

        let mut sections = Vec::with_capacity(selected.len());
        for file in selected {
            let symbols: Vec<String> = self
                .db
                .nodes_by_file(&file.path)?
                .into_iter()
                .filter(|n| n.kind != CodeNodeType::Module)
                .take(5)
                .map(|n| n.name)
                .collect();
            let mut content = format!("`{}`\n{} code node(s)", file.path, file.node_count);
            if !symbols.is_empty() {
                content.push_str(&format!("\nSymbols: {}", symbols.join(", ")));
            }
            let reason = match &file.via_anchor {
                Some(anchor) => format!(
                    "linked to {} via code-graph edges (score {:.1})",
                    anchor, file.score
                ),
                None => format!(
                    "file lookup: {} hint match(es), lexical score {:.1}",
                    file.hint_matches, file.score
                ),
            };
            sections.push(ContextSection {
                id: format!("file:{}", file.path),
                title: format!("File: {}", file.path),
                tokens: count_tokens(&content),
                content,
                relevance: (0.75 + file.hint_matches as f64 * 0.04).min(0.92),
                source: SourceKind::Kag,
                evidence: SectionEvidence {
                    reason,
                    query_terms: find_matched_terms(query_terms, &[&file.path]),
                    detail: Some(EvidenceDetail::Code {
                        node_id: None,
                        file_path: Some(file.path.clone()),
                        hint_matches: file.hint_matches,
                    }),
                },
                source_memory_ids: Vec::new(),
            });
        }
        Ok(sections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mnemo_core::text::extract_query_terms;
    use mnemo_core::types::{node_id, CodeEdge, CodeEdgeType};
    use uuid::Uuid;

    fn node(path: &str, kind: CodeNodeType, name: &str) -> CodeNode {
        CodeNode {
            id: node_id(path, kind, name),
            kind,
            name: name.to_string(),
            file_path: path.to_string(),
            start_line: Some(1),
            end_line: Some(5),
            signature: Some(format!("function {name}()")),
            summary: None,
            summary_origin: None,
            summary_confidence: None,
            needs_ai_summary: false,
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn edge(from: &str, to: &str, kind: CodeEdgeType) -> CodeEdge {
        CodeEdge {
            id: Uuid::new_v4(),
            from_node: from.to_string(),
            to_node: to.to_string(),
            kind,
            metadata: None,
            created_at: Utc::now(),
        }
    }

    fn source_with_call_chain() -> KagSource {
        let db = Arc::new(Database::init_with_schema().unwrap());
        let handle = node("src/server.ts", CodeNodeType::Function, "handleRequest");
        let validate = node("src/auth.ts", CodeNodeType::Function, "validateToken");
        let log = node("src/log.ts", CodeNodeType::Function, "log");
        for n in [&handle, &validate, &log] {
            db.upsert_code_node(n).unwrap();
        }
        db.upsert_code_edge(&edge(&handle.id, &validate.id, CodeEdgeType::Calls))
            .unwrap();
        db.upsert_code_edge(&edge(&validate.id, &log.id, CodeEdgeType::Calls))
            .unwrap();
        KagSource::new(db)
    }

    #[test]
    fn candidates_detect_camel_and_call_syntax() {
        let c = code_candidates("what calls validateToken? and also parse(");
        assert!(c.contains(&"validateToken".to_string()));
        assert!(c.contains(&"parse".to_string()));
        assert!(!c.contains(&"what".to_string()));
    }

    #[test]
    fn name_family_probes_kebab_and_suffixes() {
        let names = name_family("AccessCodeService");
        assert_eq!(names[0], "AccessCodeService");
        assert!(names.contains(&"access-code-service".to_string()));
        assert!(names.contains(&"access-code-service.ts".to_string()));
        assert!(names.contains(&"access-code".to_string()));
        assert!(names.contains(&"access-code.service".to_string()));
    }

    #[tokio::test]
    async fn entity_stage_emits_call_graph_section() {
        let kag = source_with_call_chain();
        let terms = extract_query_terms("what calls validateToken?");
        let sections = kag
            .fetch("what calls validateToken?", &terms, 8)
            .await
            .unwrap();
        let code = sections
            .iter()
            .find(|s| s.title == "Code: validateToken")
            .expect("call graph section");
        assert_eq!(code.relevance, CALL_GRAPH_RELEVANCE);
        assert!(code.content.contains("Callers: handleRequest"));
        assert!(code.content.contains("Callees: log"));
    }

    #[tokio::test]
    async fn interface_match_adds_implementations_section() {
        let db = Arc::new(Database::init_with_schema().unwrap());
        let iface = node("src/store.ts", CodeNodeType::Interface, "TokenStore");
        let imp = node("src/disk.ts", CodeNodeType::Class, "DiskTokenStore");
        db.upsert_code_node(&iface).unwrap();
        db.upsert_code_node(&imp).unwrap();
        db.upsert_code_edge(&edge(&imp.id, &iface.id, CodeEdgeType::Implements))
            .unwrap();
        let kag = KagSource::new(db);
        let sections = kag.fetch("who implements TokenStore?", &[], 0).await.unwrap();
        let impl_section = sections
            .iter()
            .find(|s| s.title == "Implementations: TokenStore")
            .expect("implementations section");
        assert_eq!(impl_section.relevance, IMPLEMENTATIONS_RELEVANCE);
        assert!(impl_section.content.contains("DiskTokenStore"));
    }

    #[test]
    fn hints_expand_plurals_and_joins() {
        let terms = extract_query_terms("which files implement access code logic");
        let hints = build_hints(&terms, &[]);
        for expected in ["access-code", "access_code", "accesscode", "access-codes"] {
            assert!(hints.contains(&expected.to_string()), "missing {expected}: {hints:?}");
        }
        assert!(hints.len() <= HINT_CAP);
    }

    #[test]
    fn weak_terms_never_hint_alone() {
        let terms: Vec<String> = ["files", "paths", "code"].iter().map(|s| s.to_string()).collect();
        assert!(build_hints(&terms, &[]).is_empty());
    }

    #[test]
    fn lexical_scoring_tiers() {
        let hints = vec!["access-code".to_string()];
        // Exact stem match.
        let (exact, m) =
            lexical_file_score("apps/web/access-code.ts", 4, &hints, &[]).unwrap();
        assert_eq!(m, 1);
        // len 11 -> exact tier 11+7=18.
        assert!(exact >= 18.0);
        // Segment match.
        let (segment, _) =
            lexical_file_score("packages/access-code/index.ts", 4, &hints, &[]).unwrap();
        // Substring match only.
        let (substring, _) =
            lexical_file_score("apps/web/access-codes-util.ts", 4, &hints, &[]).unwrap();
        assert!(exact > segment && segment > substring);
    }

    #[tokio::test]
    async fn file_lookup_finds_hinted_paths() {
        let db = Arc::new(Database::init_with_schema().unwrap());
        for (path, name) in [
            ("apps/web/access-code.ts", "createAccessCode"),
            ("packages/core/access-codes.ts", "listAccessCodes"),
            ("apps/api/billing.ts", "charge"),
        ] {
            db.upsert_code_node(&node(path, CodeNodeType::Function, name)).unwrap();
        }
        let kag = KagSource::new(db);
        let query = "which files implement access code logic across apps and packages";
        let terms = extract_query_terms(query);
        let sections = kag.fetch(query, &terms, 8).await.unwrap();
        assert!(!sections.is_empty());
        assert!(sections[0].title.contains("access-code"));
        assert!(sections
            .iter()
            .all(|s| !s.title.contains("billing")), "unhinted file excluded");
        for s in &sections {
            assert!(s.relevance <= 0.92);
        }
    }

    #[tokio::test]
    async fn traversal_fills_at_most_thirty_percent() {
        let db = Arc::new(Database::init_with_schema().unwrap());
        // One lexical anchor linked to many unrelated files.
        let anchor = node("src/access-code.ts", CodeNodeType::Function, "check");
        db.upsert_code_node(&anchor).unwrap();
        let anchor_module = node("src/access-code.ts", CodeNodeType::Module, "access-code");
        db.upsert_code_node(&anchor_module).unwrap();
        for i in 0..6 {
            let other = node(&format!("src/linked{i}.ts"), CodeNodeType::Function, "f");
            db.upsert_code_node(&other).unwrap();
            db.upsert_code_edge(&edge(&anchor.id, &other.id, CodeEdgeType::Calls))
                .unwrap();
        }
        let kag = KagSource::new(db);
        let terms = extract_query_terms("which files hold access code checks");
        let sections = kag
            .fetch("which files hold access code checks", &terms, 10)
            .await
            .unwrap();
        let traversal_only = sections
            .iter()
            .filter(|s| s.evidence.reason.contains("via code-graph edges"))
            .count();
        assert!(traversal_only <= 3, "30% of 10 slots");
    }

    #[test]
    fn excluded_paths_filtered() {
        for p in [
            "src/__tests__/auth.test.ts",
            "dist/bundle.js",
            "coverage/lcov.info",
            "types/global.d.ts",
            "src/schema.generated.ts",
        ] {
            assert!(is_excluded_path(p), "{p}");
        }
        assert!(!is_excluded_path("src/auth/access-code.ts"));
    }
}
