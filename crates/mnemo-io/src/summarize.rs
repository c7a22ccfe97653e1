//! Heuristic code summaries.
//!
//! Cheapest wins: a structured doc comment (0.9), else a line comment within
//! the first three lines (0.7), else a signature-derived stub (0.5). In
//! hybrid mode the `needs_ai_summary` flag marks chunks whose heuristic
//! result should be replaced through the AI write-back capability
//! (`Database::set_ai_summary`).

use lazy_static::lazy_static;
use mnemo_core::io_types::{CodeChunk, CodeSummary};
use mnemo_core::types::{CodeNodeType, SummaryOrigin};
use regex::Regex;

#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    /// Below this confidence the hybrid flag is set.
    pub min_confidence_threshold: f64,
    /// Exported/public chunks always get the flag when set.
    pub prefer_ai_for_exported: bool,
    /// Hybrid mode: compute `needs_ai_summary` at all.
    pub hybrid: bool,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            min_confidence_threshold: 0.8,
            prefer_ai_for_exported: false,
            hybrid: true,
        }
    }
}

lazy_static! {
    /// Structured doc comments: JSDoc `/** ... */`, Rust `///`, Python `"""`.
    static ref DOC_BLOCK: Regex = Regex::new(r#"/\*\*\s*\n?\s*\*?\s*([^\n*@]+)"#).unwrap();
    static ref DOC_LINE: Regex = Regex::new(r"^\s*///\s*(.+)$").unwrap();
    static ref DOC_PY: Regex = Regex::new(r#"^\s*(?:'''|""")\s*(.+?)\s*(?:'''|""")?\s*$"#).unwrap();
    static ref LINE_COMMENT: Regex = Regex::new(r"^\s*(?://|#)\s*(.+)$").unwrap();
    static ref EXPORT_MARKER: Regex = Regex::new(r"^\s*(?:export\s|pub\s|pub\(|public\s)").unwrap();
}

fn docstring_of(chunk: &CodeChunk) -> Option<String> {
    if let Some(c) = DOC_BLOCK.captures(&chunk.content) {
        return Some(c[1].trim().to_string());
    }
    for line in chunk.content.lines().take(4) {
        if let Some(c) = DOC_LINE.captures(line) {
            return Some(c[1].trim().to_string());
        }
    }
    if chunk.metadata.language == "python" {
        // The docstring sits on the line after the def.
        for line in chunk.content.lines().skip(1).take(2) {
            if let Some(c) = DOC_PY.captures(line) {
                return Some(c[1].trim().to_string());
            }
        }
    }
    None
}

fn leading_comment_of(chunk: &CodeChunk) -> Option<String> {
    chunk
        .content
        .lines()
        .take(3)
        .find_map(|line| {
            LINE_COMMENT
                .captures(line)
                .map(|c| c[1].trim().to_string())
        })
        .filter(|s| !s.is_empty())
}

/// True when the chunk's declaration carries a language export marker.
/// Doc comments may precede the declaration, so the first few lines are
/// scanned.
pub fn is_exported(chunk: &CodeChunk) -> bool {
    chunk
        .content
        .lines()
        .take(5)
        .any(|l| EXPORT_MARKER.is_match(l))
}

/// Produce a summary for a chunk. Never fails; the fallback tier always
/// yields something.
pub fn summarize_chunk(chunk: &CodeChunk, config: &SummarizerConfig) -> CodeSummary {
    let (summary, generated_by, confidence) = if let Some(doc) = docstring_of(chunk) {
        (doc, SummaryOrigin::Docstring, 0.9)
    } else if let Some(comment) = leading_comment_of(chunk) {
        (comment, SummaryOrigin::Comment, 0.7)
    } else {
        let label = match chunk.metadata.node_type {
            CodeNodeType::Function | CodeNodeType::Method => "Function",
            CodeNodeType::Class => "Class",
            _ => "Code unit",
        };
        let name = chunk.metadata.name.as_deref().unwrap_or("anonymous");
        (format!("{label} {name}"), SummaryOrigin::Signature, 0.5)
    };

    let needs_ai_summary = config.hybrid
        && (confidence < config.min_confidence_threshold
            || (config.prefer_ai_for_exported && is_exported(chunk)));

    CodeSummary {
        summary,
        generated_by,
        confidence,
        needs_ai_summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_core::io_types::ChunkMetadata;

    fn chunk(content: &str, lang: &str, name: &str) -> CodeChunk {
        CodeChunk {
            content: content.to_string(),
            token_count: 10,
            metadata: ChunkMetadata {
                start_line: 1,
                end_line: 5,
                node_type: CodeNodeType::Function,
                name: Some(name.to_string()),
                parent_name: None,
                is_function: true,
                is_class: false,
                is_import: false,
                language: lang.to_string(),
            },
        }
    }

    #[test]
    fn jsdoc_wins_at_point_nine() {
        let c = chunk(
            "/**\n * Validates a JWT token.\n */\nexport function validateToken() {}",
            "typescript",
            "validateToken",
        );
        let s = summarize_chunk(&c, &SummarizerConfig::default());
        assert_eq!(s.summary, "Validates a JWT token.");
        assert_eq!(s.generated_by, SummaryOrigin::Docstring);
        assert_eq!(s.confidence, 0.9);
        assert!(!s.needs_ai_summary);
    }

    #[test]
    fn line_comment_scores_point_seven() {
        let c = chunk(
            "// checks token expiry\nfunction isExpired() {}",
            "typescript",
            "isExpired",
        );
        let s = summarize_chunk(&c, &SummarizerConfig::default());
        assert_eq!(s.generated_by, SummaryOrigin::Comment);
        assert_eq!(s.confidence, 0.7);
        assert!(s.needs_ai_summary, "0.7 < default threshold 0.8");
    }

    #[test]
    fn signature_fallback() {
        let c = chunk("function plain() { return 1; }", "javascript", "plain");
        let s = summarize_chunk(&c, &SummarizerConfig::default());
        assert_eq!(s.summary, "Function plain");
        assert_eq!(s.generated_by, SummaryOrigin::Signature);
        assert_eq!(s.confidence, 0.5);
    }

    #[test]
    fn exported_flagged_when_preferred() {
        let c = chunk(
            "/** Good doc. */\nexport function f() {}",
            "typescript",
            "f",
        );
        let cfg = SummarizerConfig {
            prefer_ai_for_exported: true,
            ..Default::default()
        };
        let s = summarize_chunk(&c, &cfg);
        assert_eq!(s.confidence, 0.9);
        assert!(s.needs_ai_summary, "exported and prefer_ai_for_exported");
    }

    #[test]
    fn non_hybrid_never_flags() {
        let c = chunk("function bare() {}", "javascript", "bare");
        let cfg = SummarizerConfig {
            hybrid: false,
            ..Default::default()
        };
        assert!(!summarize_chunk(&c, &cfg).needs_ai_summary);
    }

    #[test]
    fn rust_doc_line() {
        let c = chunk("/// Packs sections under budget.\npub fn pack() {}", "rust", "pack");
        let s = summarize_chunk(&c, &SummarizerConfig::default());
        assert_eq!(s.summary, "Packs sections under budget.");
        assert_eq!(s.generated_by, SummaryOrigin::Docstring);
    }

    #[test]
    fn export_detection() {
        assert!(is_exported(&chunk("export const x = 1;", "typescript", "x")));
        assert!(is_exported(&chunk("pub fn f() {}", "rust", "f")));
        assert!(!is_exported(&chunk("fn private() {}", "rust", "private")));
    }
}
