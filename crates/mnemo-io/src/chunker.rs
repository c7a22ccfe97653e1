//! Language-aware chunking.
//!
//! Files are split on definition boundaries found by per-language regex
//! tables. Patterns are data, not code: each language carries its own set so
//! they can be regression-tested in isolation. A chunk runs from its
//! definition line to the line before the next top-level definition; import
//! lines become import chunks that the scanner turns into module edges.

use lazy_static::lazy_static;
use mnemo_core::io_types::{ChunkMetadata, CodeChunk};
use mnemo_core::token::count_tokens;
use mnemo_core::types::CodeNodeType;
use regex::Regex;

/// Chunks longer than this are split; the continuation carries no name and
/// therefore produces no node.
const MAX_CHUNK_LINES: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    TypeScript,
    JavaScript,
    Rust,
    Python,
    Go,
    Java,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
            Language::Rust => "rust",
            Language::Python => "python",
            Language::Go => "go",
            Language::Java => "java",
        }
    }

    /// Detect from the file extension; `None` means unsupported.
    pub fn detect(path: &str) -> Option<Self> {
        let ext = path.rsplit('.').next()?;
        match ext {
            "ts" | "tsx" => Some(Language::TypeScript),
            "js" | "jsx" | "mjs" | "cjs" => Some(Language::JavaScript),
            "rs" => Some(Language::Rust),
            "py" => Some(Language::Python),
            "go" => Some(Language::Go),
            "java" => Some(Language::Java),
            _ => None,
        }
    }
}

struct LangPatterns {
    import: Regex,
    import_target: Regex,
    function: Regex,
    class: Regex,
    interface: Regex,
    type_alias: Regex,
}

lazy_static! {
    static ref TS_PATTERNS: LangPatterns = LangPatterns {
        import: Regex::new(r#"^\s*(import\s|export\s+\{[^}]*\}\s+from\s|const\s+\w+\s*=\s*require\()"#).unwrap(),
        import_target: Regex::new(r#"(?:from\s+|require\()\s*['"]([^'"]+)['"]"#).unwrap(),
        function: Regex::new(r"^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s+(\w+)|^\s*(?:export\s+)?const\s+(\w+)\s*=\s*(?:async\s*)?(?:\([^)]*\)|\w+)\s*=>|^\s+(?:async\s+)?(\w+)\([^)]*\)\s*\{").unwrap(),
        class: Regex::new(r"^\s*(?:export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+(\w+)").unwrap(),
        interface: Regex::new(r"^\s*(?:export\s+)?interface\s+(\w+)").unwrap(),
        type_alias: Regex::new(r"^\s*(?:export\s+)?(?:type\s+(\w+)\s*=|enum\s+(\w+))").unwrap(),
    };
    static ref RUST_PATTERNS: LangPatterns = LangPatterns {
        import: Regex::new(r"^\s*(?:pub\s+)?use\s").unwrap(),
        import_target: Regex::new(r"use\s+([\w:]+)").unwrap(),
        function: Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?(?:unsafe\s+)?fn\s+(\w+)").unwrap(),
        class: Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:struct|enum)\s+(\w+)").unwrap(),
        interface: Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?trait\s+(\w+)").unwrap(),
        type_alias: Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?type\s+(\w+)\s*=").unwrap(),
    };
    static ref PY_PATTERNS: LangPatterns = LangPatterns {
        import: Regex::new(r"^\s*(?:import\s|from\s+\S+\s+import\s)").unwrap(),
        import_target: Regex::new(r"^\s*(?:from\s+(\S+)\s+import|import\s+(\S+))").unwrap(),
        function: Regex::new(r"^\s*(?:async\s+)?def\s+(\w+)").unwrap(),
        class: Regex::new(r"^\s*class\s+(\w+)").unwrap(),
        interface: Regex::new(r"$^").unwrap(),
        type_alias: Regex::new(r"$^").unwrap(),
    };
    static ref GO_PATTERNS: LangPatterns = LangPatterns {
        import: Regex::new(r#"^\s*import\s|^\s*"[\w/.-]+"$"#).unwrap(),
        import_target: Regex::new(r#""([\w/.-]+)""#).unwrap(),
        function: Regex::new(r"^\s*func\s+(?:\([^)]*\)\s+)?(\w+)").unwrap(),
        class: Regex::new(r"^\s*type\s+(\w+)\s+struct").unwrap(),
        interface: Regex::new(r"^\s*type\s+(\w+)\s+interface").unwrap(),
        type_alias: Regex::new(r"$^").unwrap(),
    };
    static ref JAVA_PATTERNS: LangPatterns = LangPatterns {
        import: Regex::new(r"^\s*import\s").unwrap(),
        import_target: Regex::new(r"import\s+(?:static\s+)?([\w.]+)").unwrap(),
        function: Regex::new(r"^\s*(?:public|private|protected)?\s*(?:static\s+)?(?:final\s+)?[\w<>\[\]]+\s+(\w+)\s*\([^;]*$").unwrap(),
        class: Regex::new(r"^\s*(?:public\s+)?(?:abstract\s+)?(?:final\s+)?class\s+(\w+)").unwrap(),
        interface: Regex::new(r"^\s*(?:public\s+)?interface\s+(\w+)").unwrap(),
        type_alias: Regex::new(r"^\s*(?:public\s+)?enum\s+(\w+)").unwrap(),
    };
}

fn patterns_for(lang: Language) -> &'static LangPatterns {
    match lang {
        Language::TypeScript | Language::JavaScript => &TS_PATTERNS,
        Language::Rust => &RUST_PATTERNS,
        Language::Python => &PY_PATTERNS,
        Language::Go => &GO_PATTERNS,
        Language::Java => &JAVA_PATTERNS,
    }
}

fn first_capture(re: &Regex, line: &str) -> Option<String> {
    re.captures(line).and_then(|c| {
        (1..c.len())
            .filter_map(|i| c.get(i))
            .next()
            .map(|m| m.as_str().to_string())
    })
}

struct DefLine {
    line: usize,
    name: Option<String>,
    node_type: CodeNodeType,
    is_import: bool,
    indent: usize,
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn classify_line(patterns: &LangPatterns, line: &str, lineno: usize) -> Option<DefLine> {
    if patterns.import.is_match(line) {
        return Some(DefLine {
            line: lineno,
            name: first_capture(&patterns.import_target, line),
            node_type: CodeNodeType::Module,
            is_import: true,
            indent: indent_of(line),
        });
    }
    if let Some(name) = first_capture(&patterns.class, line) {
        return Some(DefLine {
            line: lineno,
            name: Some(name),
            node_type: CodeNodeType::Class,
            is_import: false,
            indent: indent_of(line),
        });
    }
    if let Some(name) = first_capture(&patterns.interface, line) {
        return Some(DefLine {
            line: lineno,
            name: Some(name),
            node_type: CodeNodeType::Interface,
            is_import: false,
            indent: indent_of(line),
        });
    }
    if let Some(name) = first_capture(&patterns.type_alias, line) {
        return Some(DefLine {
            line: lineno,
            name: Some(name),
            node_type: CodeNodeType::Type,
            is_import: false,
            indent: indent_of(line),
        });
    }
    if let Some(name) = first_capture(&patterns.function, line) {
        // Control-flow keywords can look like method shorthand.
        const KEYWORDS: &[&str] = &["if", "for", "while", "switch", "catch", "return", "match"];
        if KEYWORDS.contains(&name.as_str()) {
            return None;
        }
        return Some(DefLine {
            line: lineno,
            name: Some(name),
            node_type: CodeNodeType::Function,
            is_import: false,
            indent: indent_of(line),
        });
    }
    None
}

/// Chunk a file. Returns an empty vec for unsupported languages.
pub fn chunk_file(path: &str, content: &str) -> Vec<CodeChunk> {
    let Some(lang) = Language::detect(path) else {
        return Vec::new();
    };
    let patterns = patterns_for(lang);
    let lines: Vec<&str> = content.lines().collect();

    let mut defs: Vec<DefLine> = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        if let Some(def) = classify_line(patterns, line, i) {
            defs.push(def);
        }
    }
    if defs.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::with_capacity(defs.len());
    for (idx, def) in defs.iter().enumerate() {
        let start = def.line;
        let end = if def.is_import {
            // An import chunk is its own line.
            start
        } else {
            defs[idx + 1..]
                .iter()
                .find(|d| d.indent <= def.indent)
                .map(|d| d.line.saturating_sub(1))
                .unwrap_or(lines.len().saturating_sub(1))
        };
        let end = end.max(start).min(start + MAX_CHUNK_LINES - 1);

        // A definition nested under a class is a method of that class.
        let parent = defs[..idx]
            .iter()
            .rev()
            .find(|d| {
                d.node_type == CodeNodeType::Class && !d.is_import && d.indent < def.indent
            })
            .and_then(|d| d.name.clone());
        let node_type = if def.node_type == CodeNodeType::Function && parent.is_some() {
            CodeNodeType::Method
        } else {
            def.node_type
        };

        let body = lines[start..=end].join("\n");
        chunks.push(CodeChunk {
            token_count: count_tokens(&body),
            content: body,
            metadata: ChunkMetadata {
                start_line: (start + 1) as i64,
                end_line: (end + 1) as i64,
                node_type,
                name: def.name.clone(),
                parent_name: parent,
                is_function: matches!(node_type, CodeNodeType::Function | CodeNodeType::Method),
                is_class: node_type == CodeNodeType::Class,
                is_import: def.is_import,
                language: lang.as_str().to_string(),
            },
        });
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    const TS_SAMPLE: &str = r#"import { db } from './db';
import express from 'express';

export function validateToken(token: string): boolean {
  return token.length > 0;
}

export class AuthService {
  validate(token: string) {
    return validateToken(token);
  }
}

export interface TokenStore {
  get(id: string): string;
}
"#;

    #[test]
    fn typescript_definitions_found() {
        let chunks = chunk_file("src/auth.ts", TS_SAMPLE);
        let names: Vec<_> = chunks
            .iter()
            .filter(|c| !c.metadata.is_import)
            .filter_map(|c| c.metadata.name.as_deref())
            .collect();
        assert!(names.contains(&"validateToken"));
        assert!(names.contains(&"AuthService"));
        assert!(names.contains(&"TokenStore"));
    }

    #[test]
    fn imports_become_import_chunks() {
        let chunks = chunk_file("src/auth.ts", TS_SAMPLE);
        let imports: Vec<_> = chunks.iter().filter(|c| c.metadata.is_import).collect();
        assert_eq!(imports.len(), 2);
        assert_eq!(imports[0].metadata.name.as_deref(), Some("./db"));
        assert_eq!(imports[1].metadata.name.as_deref(), Some("express"));
    }

    #[test]
    fn nested_function_is_a_method() {
        let chunks = chunk_file("src/auth.ts", TS_SAMPLE);
        let validate = chunks
            .iter()
            .find(|c| c.metadata.name.as_deref() == Some("validate"))
            .expect("method chunk");
        assert_eq!(validate.metadata.node_type, CodeNodeType::Method);
        assert_eq!(validate.metadata.parent_name.as_deref(), Some("AuthService"));
    }

    #[test]
    fn interface_chunk_typed() {
        let chunks = chunk_file("src/auth.ts", TS_SAMPLE);
        let iface = chunks
            .iter()
            .find(|c| c.metadata.name.as_deref() == Some("TokenStore"))
            .unwrap();
        assert_eq!(iface.metadata.node_type, CodeNodeType::Interface);
    }

    #[test]
    fn rust_definitions_found() {
        let src = "use std::fmt;\n\npub struct Packer;\n\npub trait Store {}\n\npub fn pack() {}\n";
        let chunks = chunk_file("src/pack.rs", src);
        let kinds: Vec<_> = chunks
            .iter()
            .filter(|c| !c.metadata.is_import)
            .map(|c| c.metadata.node_type)
            .collect();
        assert!(kinds.contains(&CodeNodeType::Class));
        assert!(kinds.contains(&CodeNodeType::Interface));
        assert!(kinds.contains(&CodeNodeType::Function));
    }

    #[test]
    fn unsupported_extension_yields_nothing() {
        assert!(chunk_file("README.md", "# hello\n").is_empty());
    }

    #[test]
    fn line_numbers_are_one_based() {
        let chunks = chunk_file("a.ts", "function f() {}\n");
        assert_eq!(chunks[0].metadata.start_line, 1);
    }
}
