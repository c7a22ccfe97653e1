//! Persisted data model: memories, code graph, knowledge graph.
//!
//! Identity rules worth keeping in mind:
//! - `Memory`, `GraphEntity`, `Community` and vector points are keyed by `Uuid`.
//! - `CodeNode` is keyed by the stable string `"<filePath>:<type>:<name>"`;
//!   every downstream component joins on it, so it must never be derived any
//!   other way than [`node_id`].
//! - Edge identity is the triple `(from_node, to_node, edge_type)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Category of a stored memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    Decision,
    Solution,
    Pattern,
    Architecture,
    Note,
}

impl MemoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Decision => "decision",
            MemoryType::Solution => "solution",
            MemoryType::Pattern => "pattern",
            MemoryType::Architecture => "architecture",
            MemoryType::Note => "note",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "decision" => Some(MemoryType::Decision),
            "solution" => Some(MemoryType::Solution),
            "pattern" => Some(MemoryType::Pattern),
            "architecture" => Some(MemoryType::Architecture),
            "note" => Some(MemoryType::Note),
            _ => None,
        }
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A project memory. The relational row owns the lifetime of the associated
/// vector point (`vector_id`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: Uuid,
    pub kind: MemoryType,
    pub title: String,
    pub content: String,
    pub summary: Option<String>,
    /// Subjective weight in `[0, 1]`.
    pub importance: f64,
    pub tags: Vec<String>,
    pub related_files: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub accessed_at: DateTime<Utc>,
    pub access_count: i64,
    pub vector_id: Option<Uuid>,
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

/// Kind of a code-graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeNodeType {
    Module,
    Function,
    Class,
    Interface,
    Method,
    Type,
}

impl CodeNodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeNodeType::Module => "module",
            CodeNodeType::Function => "function",
            CodeNodeType::Class => "class",
            CodeNodeType::Interface => "interface",
            CodeNodeType::Method => "method",
            CodeNodeType::Type => "type",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "module" => Some(CodeNodeType::Module),
            "function" => Some(CodeNodeType::Function),
            "class" => Some(CodeNodeType::Class),
            "interface" => Some(CodeNodeType::Interface),
            "method" => Some(CodeNodeType::Method),
            "type" => Some(CodeNodeType::Type),
            _ => None,
        }
    }
}

impl std::fmt::Display for CodeNodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The stable node id every component joins on.
pub fn node_id(file_path: &str, kind: CodeNodeType, name: &str) -> String {
    format!("{}:{}:{}", file_path, kind.as_str(), name)
}

/// Where a node summary came from, in ascending order of cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryOrigin {
    Docstring,
    Comment,
    Signature,
    Ai,
}

impl SummaryOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryOrigin::Docstring => "docstring",
            SummaryOrigin::Comment => "comment",
            SummaryOrigin::Signature => "signature",
            SummaryOrigin::Ai => "ai",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "docstring" => Some(SummaryOrigin::Docstring),
            "comment" => Some(SummaryOrigin::Comment),
            "signature" => Some(SummaryOrigin::Signature),
            "ai" => Some(SummaryOrigin::Ai),
            _ => None,
        }
    }
}

/// A node in the code graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeNode {
    /// `"<filePath>:<type>:<name>"`, see [`node_id`].
    pub id: String,
    pub kind: CodeNodeType,
    pub name: String,
    pub file_path: String,
    pub start_line: Option<i64>,
    pub end_line: Option<i64>,
    pub signature: Option<String>,
    pub summary: Option<String>,
    pub summary_origin: Option<SummaryOrigin>,
    pub summary_confidence: Option<f64>,
    pub needs_ai_summary: bool,
    /// Free-form mapping carried through from the chunker.
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Kind of a code-graph edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeEdgeType {
    Calls,
    Imports,
    Implements,
    Extends,
    References,
}

impl CodeEdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeEdgeType::Calls => "calls",
            CodeEdgeType::Imports => "imports",
            CodeEdgeType::Implements => "implements",
            CodeEdgeType::Extends => "extends",
            CodeEdgeType::References => "references",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "calls" => Some(CodeEdgeType::Calls),
            "imports" => Some(CodeEdgeType::Imports),
            "implements" => Some(CodeEdgeType::Implements),
            "extends" => Some(CodeEdgeType::Extends),
            "references" => Some(CodeEdgeType::References),
            _ => None,
        }
    }
}

impl std::fmt::Display for CodeEdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An edge in the code graph. `(from_node, to_node, kind)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeEdge {
    pub id: Uuid,
    pub from_node: String,
    pub to_node: String,
    pub kind: CodeEdgeType,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Content-addressed gate for incremental scans. A row exists iff the path
/// has at least one code node in the current snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileHashEntry {
    pub path: String,
    pub hash: String,
    pub updated_at: DateTime<Utc>,
}

/// Entity class in the knowledge graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityType {
    Person,
    Organization,
    Technology,
    Concept,
    Location,
    Event,
    Product,
    Other,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Person => "PERSON",
            EntityType::Organization => "ORGANIZATION",
            EntityType::Technology => "TECHNOLOGY",
            EntityType::Concept => "CONCEPT",
            EntityType::Location => "LOCATION",
            EntityType::Event => "EVENT",
            EntityType::Product => "PRODUCT",
            EntityType::Other => "OTHER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PERSON" => Some(EntityType::Person),
            "ORGANIZATION" => Some(EntityType::Organization),
            "TECHNOLOGY" => Some(EntityType::Technology),
            "CONCEPT" => Some(EntityType::Concept),
            "LOCATION" => Some(EntityType::Location),
            "EVENT" => Some(EntityType::Event),
            "PRODUCT" => Some(EntityType::Product),
            "OTHER" => Some(EntityType::Other),
            _ => None,
        }
    }
}

/// A named entity extracted from memories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEntity {
    pub id: Uuid,
    pub canonical_name: String,
    pub entity_type: EntityType,
    pub description: Option<String>,
    pub mention_count: i64,
    /// Extractor confidence in `[0, 1]`.
    pub extraction_confidence: f64,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub embedding_id: Option<Uuid>,
}

/// A relationship between two entities. Undirected for community detection,
/// directed when traversed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub id: Uuid,
    pub source_entity_id: Uuid,
    pub target_entity_id: Uuid,
    pub relationship_type: String,
    /// Strength in `[1, 10]`.
    pub strength: f64,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A detected entity community.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Community {
    pub id: Uuid,
    pub level: i64,
    pub parent_id: Option<Uuid>,
    pub entity_count: i64,
}

/// One-to-one report for a community.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityReport {
    pub community_id: Uuid,
    pub title: String,
    pub summary: String,
    pub full_content: String,
    pub key_findings: Vec<String>,
    pub rating: Option<f64>,
}

/// Link between an entity and the memory it was extracted from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityMemoryLink {
    pub entity_id: Uuid,
    pub memory_id: Uuid,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

/// Typed relation between two memories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRelation {
    pub from_id: Uuid,
    pub to_id: Uuid,
    pub relation_type: String,
    pub created_at: DateTime<Utc>,
}

/// Communities are surfaced to users by an 8-char prefix; the internal id is
/// preserved everywhere else.
pub fn display_community_id(id: &Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_is_path_type_name() {
        assert_eq!(
            node_id("src/auth.ts", CodeNodeType::Function, "validateToken"),
            "src/auth.ts:function:validateToken"
        );
    }

    #[test]
    fn enum_string_round_trips() {
        for ty in [
            CodeEdgeType::Calls,
            CodeEdgeType::Imports,
            CodeEdgeType::Implements,
            CodeEdgeType::Extends,
            CodeEdgeType::References,
        ] {
            assert_eq!(CodeEdgeType::parse(ty.as_str()), Some(ty));
        }
        for ty in [
            MemoryType::Decision,
            MemoryType::Solution,
            MemoryType::Pattern,
            MemoryType::Architecture,
            MemoryType::Note,
        ] {
            assert_eq!(MemoryType::parse(ty.as_str()), Some(ty));
        }
        assert_eq!(EntityType::parse("TECHNOLOGY"), Some(EntityType::Technology));
        assert_eq!(EntityType::parse("technology"), None);
    }

    #[test]
    fn community_display_id_is_eight_chars() {
        let id = Uuid::new_v4();
        assert_eq!(display_community_id(&id).len(), 8);
    }
}
