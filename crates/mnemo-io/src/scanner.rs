//! Incremental scanner: hash-gated chunking into the code graph.
//!
//! Each input file is hashed (blake3) and compared against the stored
//! `file_hashes` row. Unchanged files are skipped. Changed files are chunked
//! and their nodes/edges replaced through one transactional
//! `Database::replace_file` call per file; import edges are resolved in a
//! second phase once every file of the batch has its module node, and
//! cross-file edges that pointed at a replaced file's stable module node are
//! re-asserted. Per-file failures land in the change log; the batch
//! continues. Cancellation is honored between files, never mid-file.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use mnemo_core::cancel::CancellationListener;
use mnemo_core::io_types::{ChangeKind, CodeChunk, FileChange, ScanOutcome, ScanStats};
use mnemo_core::types::{node_id, CodeEdge, CodeEdgeType, CodeNode, CodeNodeType};
use mnemo_db::{dt_to_ms, Database};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::chunker::chunk_file;
use crate::error::IoError;
use crate::summarize::{summarize_chunk, SummarizerConfig};

/// Scanner configuration. `patterns` and `exclude` are substring path
/// predicates applied to the supplied inputs (an empty `patterns` list
/// accepts everything); the default ignore list always applies. Callers own
/// directory walking.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub patterns: Vec<String>,
    pub exclude: Vec<String>,
    pub incremental: bool,
    pub extract_summaries: bool,
    pub summarizer: SummarizerConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            patterns: Vec::new(),
            exclude: Vec::new(),
            incremental: true,
            extract_summaries: true,
            summarizer: SummarizerConfig::default(),
        }
    }
}

/// One file handed to the scanner.
#[derive(Debug, Clone)]
pub struct ScanInput {
    pub path: String,
    pub content: String,
}

/// Default ignore predicates applied before hashing.
const DEFAULT_EXCLUDES: &[&str] = &[
    "node_modules/",
    "target/",
    ".git/",
    "dist/",
    "build/",
    "coverage/",
    "__pycache__/",
    ".next/",
];

fn is_default_excluded(path: &str) -> bool {
    DEFAULT_EXCLUDES.iter().any(|p| path.contains(p))
        || path.ends_with(".min.js")
        || path.ends_with(".d.ts")
        || path.contains(".generated.")
}

fn is_probably_binary(content: &str) -> bool {
    content.contains('\0')
}

fn file_stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.split('.').next().unwrap_or(name)
}

fn parent_dir(path: &str) -> &str {
    path.rfind('/').map(|i| &path[..i]).unwrap_or("")
}

fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

const IMPORT_EXTS: &[&str] = &["", ".ts", ".tsx", ".js", ".jsx", ".py", ".rs", ".go", ".java"];
const INDEX_SUFFIXES: &[&str] = &["/index.ts", "/index.js"];

/// Best-effort relative import resolution against the set of known files.
/// Anything that does not land on a known file is a non-edge.
fn resolve_import(from_path: &str, specifier: &str, known: &HashSet<String>) -> Option<String> {
    if !specifier.starts_with('.') {
        return None;
    }
    let joined = normalize_path(&format!("{}/{}", parent_dir(from_path), specifier));
    for ext in IMPORT_EXTS {
        let cand = format!("{joined}{ext}");
        if known.contains(&cand) {
            return Some(cand);
        }
    }
    for suffix in INDEX_SUFFIXES {
        let cand = format!("{joined}{suffix}");
        if known.contains(&cand) {
            return Some(cand);
        }
    }
    None
}

#[derive(Debug)]
pub struct Scanner {
    db: Arc<Database>,
    config: ScanConfig,
}

struct PendingFile {
    path: String,
    import_specs: Vec<String>,
    /// Cross-file edges that the replace will delete but whose endpoints
    /// remain valid (module ids are stable under modification).
    preserved_edges: Vec<(String, String, String)>,
}

impl Scanner {
    pub fn new(db: Arc<Database>, config: ScanConfig) -> Self {
        Self { db, config }
    }

    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }

    fn excluded(&self, path: &str) -> bool {
        if is_default_excluded(path)
            || self.config.exclude.iter().any(|e| path.contains(e.as_str()))
        {
            return true;
        }
        !self.config.patterns.is_empty()
            && !self.config.patterns.iter().any(|p| path.contains(p.as_str()))
    }

    /// Full-scan mode: paths stored in `file_hashes` but absent from the
    /// input are treated as deleted.
    #[instrument(skip(self, inputs, cancel), fields(inputs = inputs.len()))]
    pub fn scan(
        &self,
        inputs: &[ScanInput],
        cancel: &CancellationListener,
    ) -> Result<ScanOutcome, IoError> {
        let present: HashSet<String> = inputs.iter().map(|i| i.path.clone()).collect();
        let deleted: Vec<String> = self
            .db
            .all_file_hashes()?
            .into_iter()
            .map(|h| h.path)
            .filter(|p| !present.contains(p))
            .collect();
        let batch: Vec<(String, Option<String>)> = inputs
            .iter()
            .map(|i| (i.path.clone(), Some(i.content.clone())))
            .chain(deleted.into_iter().map(|p| (p, None)))
            .collect();
        self.scan_changes(&batch, cancel)
    }

    /// Watcher mode: deletions are explicit (`None` content).
    #[instrument(skip(self, batch, cancel), fields(batch = batch.len()))]
    pub fn scan_changes(
        &self,
        batch: &[(String, Option<String>)],
        cancel: &CancellationListener,
    ) -> Result<ScanOutcome, IoError> {
        let mut stats = ScanStats::default();
        let mut changes = Vec::new();
        let mut pending: Vec<PendingFile> = Vec::new();
        let mut completed = 0usize;

        // Known files for import resolution: everything already scanned plus
        // every non-deleted member of this batch.
        let mut known: HashSet<String> = self
            .db
            .all_file_hashes()?
            .into_iter()
            .map(|h| h.path)
            .collect();
        for (path, content) in batch {
            match content {
                Some(_) => {
                    known.insert(path.clone());
                }
                None => {
                    known.remove(path);
                }
            }
        }

        // Phase A: per-file hashing, chunking, and transactional replace.
        for (path, content) in batch {
            if cancel.is_cancelled() {
                warn!(completed, "scan cancelled between files");
                return Err(IoError::Cancelled { completed });
            }
            if self.excluded(path) {
                continue;
            }
            let result = match content {
                Some(text) => self.process_file(path, text, &mut stats, &mut changes),
                None => self.process_deletion(path, &mut stats, &mut changes),
            };
            match result {
                Ok(Some(p)) => pending.push(p),
                Ok(None) => {}
                Err(e) => {
                    debug!(path = %path, error = %e, "per-file scan error");
                    changes.push(FileChange {
                        path: path.clone(),
                        kind: content.as_ref().map_or(ChangeKind::Deleted, |_| ChangeKind::Modified),
                        error: Some(e.to_string()),
                    });
                }
            }
            completed += 1;
        }

        // Phase B: import edges, now that every module node of the batch
        // exists, plus re-assertion of preserved cross-file edges.
        for p in &pending {
            let from_module = node_id(&p.path, CodeNodeType::Module, file_stem(&p.path));
            for spec in &p.import_specs {
                if let Some(target) = resolve_import(&p.path, spec, &known) {
                    if target == p.path {
                        continue;
                    }
                    let to_module = node_id(&target, CodeNodeType::Module, file_stem(&target));
                    if self.db.get_code_node(&to_module)?.is_none() {
                        continue;
                    }
                    self.db.upsert_code_edge(&CodeEdge {
                        id: Uuid::new_v4(),
                        from_node: from_module.clone(),
                        to_node: to_module,
                        kind: CodeEdgeType::Imports,
                        metadata: None,
                        created_at: Utc::now(),
                    })?;
                    stats.edges_added += 1;
                }
            }
            for (from, to, kind) in &p.preserved_edges {
                let Some(kind) = CodeEdgeType::parse(kind) else {
                    continue;
                };
                if self.db.get_code_node(from)?.is_none()
                    || self.db.get_code_node(to)?.is_none()
                {
                    continue;
                }
                self.db.upsert_code_edge(&CodeEdge {
                    id: Uuid::new_v4(),
                    from_node: from.clone(),
                    to_node: to.clone(),
                    kind,
                    metadata: None,
                    created_at: Utc::now(),
                })?;
                stats.edges_added += 1;
            }
        }

        debug!(
            files = stats.files_scanned,
            nodes_added = stats.nodes_added,
            edges_added = stats.edges_added,
            "scan complete"
        );
        Ok(ScanOutcome { stats, changes })
    }

    fn process_file(
        &self,
        path: &str,
        content: &str,
        stats: &mut ScanStats,
        changes: &mut Vec<FileChange>,
    ) -> Result<Option<PendingFile>, IoError> {
        if is_probably_binary(content) {
            return Ok(None);
        }
        let hash = blake3::hash(content.as_bytes()).to_hex().to_string();
        let stored = self.db.get_file_hash(path)?;
        let kind = match &stored {
            None => ChangeKind::Added,
            Some(entry) if entry.hash == hash && self.config.incremental => {
                changes.push(FileChange {
                    path: path.to_string(),
                    kind: ChangeKind::Unchanged,
                    error: None,
                });
                return Ok(None);
            }
            Some(_) => ChangeKind::Modified,
        };

        let existing = self.db.nodes_by_file(path)?;
        let nodes_before = existing.len();
        let edges_before = self.db.edges_touching_file(path)?;

        // Cross-file edges survive the replace when both endpoints still
        // exist afterwards; same-file edges are rebuilt from the new content.
        let file_node_ids: HashSet<String> = existing.into_iter().map(|n| n.id).collect();
        let preserved_edges: Vec<(String, String, String)> = edges_before
            .iter()
            .filter(|(f, t, _)| !(file_node_ids.contains(f) && file_node_ids.contains(t)))
            .cloned()
            .collect();

        let chunks = chunk_file(path, content);
        let (nodes, import_specs) = self.build_nodes(path, &chunks);

        self.db
            .replace_file(path, &hash, dt_to_ms(Utc::now()), &nodes, &[])?;

        stats.files_scanned += 1;
        stats.nodes_added += nodes.len();
        stats.nodes_deleted += nodes_before;
        stats.edges_deleted += edges_before.len();
        changes.push(FileChange {
            path: path.to_string(),
            kind,
            error: None,
        });
        Ok(Some(PendingFile {
            path: path.to_string(),
            import_specs,
            preserved_edges,
        }))
    }

    fn process_deletion(
        &self,
        path: &str,
        stats: &mut ScanStats,
        changes: &mut Vec<FileChange>,
    ) -> Result<Option<PendingFile>, IoError> {
        let nodes_before = self.db.nodes_by_file(path)?.len();
        if nodes_before == 0 && self.db.get_file_hash(path)?.is_none() {
            // Deleting something never scanned is a no-op.
            return Ok(None);
        }
        let edges_before = self.db.edges_touching_file(path)?.len();
        self.db.remove_file(path)?;
        stats.nodes_deleted += nodes_before;
        stats.edges_deleted += edges_before;
        changes.push(FileChange {
            path: path.to_string(),
            kind: ChangeKind::Deleted,
            error: None,
        });
        Ok(None)
    }

    /// One module node per file, one node per named chunk. A duplicate node
    /// id within a file replaces the earlier occurrence.
    fn build_nodes(&self, path: &str, chunks: &[CodeChunk]) -> (Vec<CodeNode>, Vec<String>) {
        let now = Utc::now();
        let stem = file_stem(path);
        let mut ordered_ids: Vec<String> = Vec::new();
        let mut by_id: HashMap<String, CodeNode> = HashMap::new();

        let module = CodeNode {
            id: node_id(path, CodeNodeType::Module, stem),
            kind: CodeNodeType::Module,
            name: stem.to_string(),
            file_path: path.to_string(),
            start_line: Some(1),
            end_line: None,
            signature: None,
            summary: None,
            summary_origin: None,
            summary_confidence: None,
            needs_ai_summary: false,
            metadata: serde_json::json!({ "module": true }),
            created_at: now,
            updated_at: now,
        };
        ordered_ids.push(module.id.clone());
        by_id.insert(module.id.clone(), module);

        let mut import_specs = Vec::new();
        for chunk in chunks {
            if chunk.metadata.is_import {
                if let Some(spec) = &chunk.metadata.name {
                    import_specs.push(spec.clone());
                }
                continue;
            }
            let Some(name) = &chunk.metadata.name else {
                continue;
            };
            let id = node_id(path, chunk.metadata.node_type, name);
            let signature = chunk.content.lines().next().map(|l| l.trim().to_string());
            let summary = self
                .config
                .extract_summaries
                .then(|| summarize_chunk(chunk, &self.config.summarizer));
            let node = CodeNode {
                id: id.clone(),
                kind: chunk.metadata.node_type,
                name: name.clone(),
                file_path: path.to_string(),
                start_line: Some(chunk.metadata.start_line),
                end_line: Some(chunk.metadata.end_line),
                signature,
                summary: summary.as_ref().map(|s| s.summary.clone()),
                summary_origin: summary.as_ref().map(|s| s.generated_by),
                summary_confidence: summary.as_ref().map(|s| s.confidence),
                needs_ai_summary: summary.as_ref().is_some_and(|s| s.needs_ai_summary),
                metadata: serde_json::json!({
                    "parent": chunk.metadata.parent_name,
                    "language": chunk.metadata.language,
                    "tokens": chunk.token_count,
                }),
                created_at: now,
                updated_at: now,
            };
            if by_id.insert(id.clone(), node).is_none() {
                ordered_ids.push(id);
            }
        }

        let nodes = ordered_ids
            .into_iter()
            .filter_map(|id| by_id.remove(&id))
            .collect();
        (nodes, import_specs)
    }
}
