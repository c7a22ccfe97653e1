//! Code-graph store: node/edge CRUD, BFS traversals, file hashes.
//!
//! Nodes upsert on `id`, edges on `(from_node, to_node, edge_type)`.
//! Traversals load the edge set for one edge type and BFS over in-memory
//! adjacency maps; the stored relations stay authoritative. Depth is always
//! clamped to `1..=5` and a visited set guards against cycles.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use cozo::{DataValue, ScriptMutability};
use mnemo_core::types::{
    CodeEdge, CodeEdgeType, CodeNode, CodeNodeType, FileHashEntry, SummaryOrigin,
};

use crate::database::*;
use crate::error::DbError;

const NODE_COLS: &str = "id, kind, name, file_path, start_line, end_line, signature, summary, summary_origin, summary_confidence, needs_ai_summary, metadata, created_at, updated_at";
const NODE_PUT: &str = ":put code_nodes { id => kind, name, file_path, start_line, end_line, signature, summary, summary_origin, summary_confidence, needs_ai_summary, metadata, created_at, updated_at }";

fn node_row(n: &CodeNode) -> DataValue {
    DataValue::List(vec![
        dv_str(&n.id),
        dv_str(n.kind.as_str()),
        dv_str(&n.name),
        dv_str(&n.file_path),
        dv_opt_i64(n.start_line),
        dv_opt_i64(n.end_line),
        dv_opt_str(n.signature.as_deref()),
        dv_opt_str(n.summary.as_deref()),
        dv_opt_str(n.summary_origin.map(|o| o.as_str())),
        dv_opt_f64(n.summary_confidence),
        dv_bool(n.needs_ai_summary),
        dv_json(n.metadata.clone()),
        dv_f64(dt_to_ms(n.created_at)),
        dv_f64(dt_to_ms(n.updated_at)),
    ])
}

fn edge_row(e: &CodeEdge) -> DataValue {
    DataValue::List(vec![
        dv_str(&e.from_node),
        dv_str(&e.to_node),
        dv_str(e.kind.as_str()),
        dv_uuid(e.id),
        dv_opt_json(e.metadata.clone()),
        dv_f64(dt_to_ms(e.created_at)),
    ])
}

fn node_from_row(row: &[DataValue]) -> Result<CodeNode, DbError> {
    let kind_s = row_str(&row[1], "code_nodes", "kind")?;
    Ok(CodeNode {
        id: row_str(&row[0], "code_nodes", "id")?,
        kind: CodeNodeType::parse(&kind_s).ok_or(DbError::Decode {
            relation: "code_nodes",
            column: "kind",
            message: format!("unknown node type `{kind_s}`"),
        })?,
        name: row_str(&row[2], "code_nodes", "name")?,
        file_path: row_str(&row[3], "code_nodes", "file_path")?,
        start_line: row_opt_i64(&row[4]),
        end_line: row_opt_i64(&row[5]),
        signature: row_opt_str(&row[6]),
        summary: row_opt_str(&row[7]),
        summary_origin: row_opt_str(&row[8]).and_then(|s| SummaryOrigin::parse(&s)),
        summary_confidence: row_opt_f64(&row[9]),
        needs_ai_summary: row_bool(&row[10], "code_nodes", "needs_ai_summary")?,
        metadata: row_json(&row[11]),
        created_at: ms_to_dt(row_f64(&row[12], "code_nodes", "created_at")?),
        updated_at: ms_to_dt(row_f64(&row[13], "code_nodes", "updated_at")?),
    })
}

/// Direction of a BFS traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalDirection {
    /// Follow edges from the origin outward (callees / imports).
    Forward,
    /// Follow edges pointing at the origin (callers / imported-by).
    Reverse,
    Both,
}

/// A node reached by a traversal, with its BFS depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalNode {
    pub id: String,
    pub depth: usize,
}

/// Result of a call-graph or dependency-tree traversal.
#[derive(Debug, Clone, Default)]
pub struct Traversal {
    pub origin: String,
    /// Nodes reached following edge direction (callees, imports).
    pub outbound: Vec<TraversalNode>,
    /// Nodes reached against edge direction (callers, imported-by).
    pub inbound: Vec<TraversalNode>,
}

fn bfs(
    adjacency: &HashMap<&str, Vec<&str>>,
    origin: &str,
    max_depth: usize,
) -> Vec<TraversalNode> {
    let mut visited: HashSet<&str> = HashSet::new();
    visited.insert(origin);
    let mut queue: VecDeque<(&str, usize)> = VecDeque::new();
    queue.push_back((origin, 0));
    let mut out = Vec::new();
    while let Some((node, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        if let Some(neighbors) = adjacency.get(node) {
            for &next in neighbors {
                if visited.insert(next) {
                    out.push(TraversalNode {
                        id: next.to_string(),
                        depth: depth + 1,
                    });
                    queue.push_back((next, depth + 1));
                }
            }
        }
    }
    out
}

impl Database {
    /// Insert or replace a code node.
    pub fn upsert_code_node(&self, node: &CodeNode) -> Result<(), DbError> {
        let script = format!("?[{NODE_COLS}] <- $rows\n{NODE_PUT}");
        let mut params = BTreeMap::new();
        params.insert("rows".into(), DataValue::List(vec![node_row(node)]));
        self.run_script(&script, params, ScriptMutability::Mutable)?;
        Ok(())
    }

    pub fn get_code_node(&self, id: &str) -> Result<Option<CodeNode>, DbError> {
        let script = format!("?[{NODE_COLS}] := *code_nodes{{{NODE_COLS}}}, id = $id");
        let mut params = BTreeMap::new();
        params.insert("id".into(), dv_str(id));
        let rows = self.run_script(&script, params, ScriptMutability::Immutable)?;
        rows.rows.first().map(|r| node_from_row(r)).transpose()
    }

    /// All nodes carrying the given name, any kind.
    pub fn find_nodes_by_name(&self, name: &str) -> Result<Vec<CodeNode>, DbError> {
        let script = format!("?[{NODE_COLS}] := *code_nodes{{{NODE_COLS}}}, name = $name");
        let mut params = BTreeMap::new();
        params.insert("name".into(), dv_str(name));
        let rows = self.run_script(&script, params, ScriptMutability::Immutable)?;
        rows.rows.iter().map(|r| node_from_row(r)).collect()
    }

    pub fn nodes_by_file(&self, path: &str) -> Result<Vec<CodeNode>, DbError> {
        let script = format!("?[{NODE_COLS}] := *code_nodes{{{NODE_COLS}}}, file_path = $path");
        let mut params = BTreeMap::new();
        params.insert("path".into(), dv_str(path));
        let rows = self.run_script(&script, params, ScriptMutability::Immutable)?;
        rows.rows.iter().map(|r| node_from_row(r)).collect()
    }

    /// Module nodes only; used by symbol lookup to probe file-name families.
    pub fn module_nodes(&self) -> Result<Vec<CodeNode>, DbError> {
        let script =
            format!("?[{NODE_COLS}] := *code_nodes{{{NODE_COLS}}}, kind = \"module\"");
        let rows = self.run_immutable(&script)?;
        rows.rows.iter().map(|r| node_from_row(r)).collect()
    }

    /// Insert or replace an edge; the `(from, to, type)` key dedupes.
    pub fn upsert_code_edge(&self, edge: &CodeEdge) -> Result<(), DbError> {
        let script = r#"
?[from_node, to_node, edge_type, id, metadata, created_at] <- $rows
:put code_edges { from_node, to_node, edge_type => id, metadata, created_at }
"#;
        let mut params = BTreeMap::new();
        params.insert("rows".into(), DataValue::List(vec![edge_row(edge)]));
        self.run_script(script, params, ScriptMutability::Mutable)?;
        Ok(())
    }

    /// Every `(from, to)` pair for one edge type.
    pub fn edges_of_type(&self, kind: CodeEdgeType) -> Result<Vec<(String, String)>, DbError> {
        let script = r#"
?[from_node, to_node] := *code_edges{from_node, to_node, edge_type}, edge_type = $kind
"#;
        let mut params = BTreeMap::new();
        params.insert("kind".into(), dv_str(kind.as_str()));
        let rows = self.run_script(script, params, ScriptMutability::Immutable)?;
        rows.rows
            .iter()
            .map(|r| {
                Ok((
                    row_str(&r[0], "code_edges", "from_node")?,
                    row_str(&r[1], "code_edges", "to_node")?,
                ))
            })
            .collect()
    }

    /// Edge keys touching any node of a file; used for scan statistics.
    pub fn edges_touching_file(&self, path: &str) -> Result<Vec<(String, String, String)>, DbError> {
        let script = r#"
node_ids[id] := *code_nodes{id, file_path}, file_path = $path
touching[f, t, k] := *code_edges{from_node: f, to_node: t, edge_type: k}, node_ids[f]
touching[f, t, k] := *code_edges{from_node: f, to_node: t, edge_type: k}, node_ids[t]
?[f, t, k] := touching[f, t, k]
"#;
        let mut params = BTreeMap::new();
        params.insert("path".into(), dv_str(path));
        let rows = self.run_script(script, params, ScriptMutability::Immutable)?;
        rows.rows
            .iter()
            .map(|r| {
                Ok((
                    row_str(&r[0], "code_edges", "from_node")?,
                    row_str(&r[1], "code_edges", "to_node")?,
                    row_str(&r[2], "code_edges", "edge_type")?,
                ))
            })
            .collect()
    }

    /// Delete one node and every edge touching it.
    pub fn delete_code_node(&self, id: &str) -> Result<(), DbError> {
        let script = r#"
{
    del[f, t, k] := *code_edges{from_node: f, to_node: t, edge_type: k}, f = $id
    del[f, t, k] := *code_edges{from_node: f, to_node: t, edge_type: k}, t = $id
    ?[from_node, to_node, edge_type] := del[from_node, to_node, edge_type]
    :rm code_edges { from_node, to_node, edge_type }
}
{
    ?[id] <- [[$id]]
    :rm code_nodes { id }
}
"#;
        let mut params = BTreeMap::new();
        params.insert("id".into(), dv_str(id));
        self.run_script(script, params, ScriptMutability::Mutable)?;
        Ok(())
    }

    /// Delete every edge touching a node, leaving the node in place.
    pub fn delete_edges_by_node(&self, id: &str) -> Result<(), DbError> {
        let script = r#"
del[f, t, k] := *code_edges{from_node: f, to_node: t, edge_type: k}, f = $id
del[f, t, k] := *code_edges{from_node: f, to_node: t, edge_type: k}, t = $id
?[from_node, to_node, edge_type] := del[from_node, to_node, edge_type]
:rm code_edges { from_node, to_node, edge_type }
"#;
        let mut params = BTreeMap::new();
        params.insert("id".into(), dv_str(id));
        self.run_script(script, params, ScriptMutability::Mutable)?;
        Ok(())
    }

    /// Delete all nodes of a file, cascading to their edges. The caller is
    /// responsible for erasing the matching file-hash row.
    pub fn delete_nodes_by_file(&self, path: &str) -> Result<(), DbError> {
        let script = r#"
{
    node_ids[id] := *code_nodes{id, file_path}, file_path = $path
    del[f, t, k] := *code_edges{from_node: f, to_node: t, edge_type: k}, node_ids[f]
    del[f, t, k] := *code_edges{from_node: f, to_node: t, edge_type: k}, node_ids[t]
    ?[from_node, to_node, edge_type] := del[from_node, to_node, edge_type]
    :rm code_edges { from_node, to_node, edge_type }
}
{
    ?[id] := *code_nodes{id, file_path}, file_path = $path
    :rm code_nodes { id }
}
"#;
        let mut params = BTreeMap::new();
        params.insert("path".into(), dv_str(path));
        self.run_script(script, params, ScriptMutability::Mutable)?;
        Ok(())
    }

    /// Atomically replace a file's nodes and edges and write its hash row.
    /// Either all of the file's graph rows are swapped or none are.
    pub fn replace_file(
        &self,
        path: &str,
        hash: &str,
        now_ms: f64,
        nodes: &[CodeNode],
        edges: &[CodeEdge],
    ) -> Result<(), DbError> {
        let script = format!(
            r#"
{{
    node_ids[id] := *code_nodes{{id, file_path}}, file_path = $path
    del[f, t, k] := *code_edges{{from_node: f, to_node: t, edge_type: k}}, node_ids[f]
    del[f, t, k] := *code_edges{{from_node: f, to_node: t, edge_type: k}}, node_ids[t]
    ?[from_node, to_node, edge_type] := del[from_node, to_node, edge_type]
    :rm code_edges {{ from_node, to_node, edge_type }}
}}
{{
    ?[id] := *code_nodes{{id, file_path}}, file_path = $path
    :rm code_nodes {{ id }}
}}
{{
    ?[{NODE_COLS}] <- $nodes
    {NODE_PUT}
}}
{{
    ?[from_node, to_node, edge_type, id, metadata, created_at] <- $edges
    :put code_edges {{ from_node, to_node, edge_type => id, metadata, created_at }}
}}
{{
    ?[path, hash, updated_at] <- [[$path, $hash, $now]]
    :put file_hashes {{ path => hash, updated_at }}
}}
"#
        );
        let mut params = BTreeMap::new();
        params.insert("path".into(), dv_str(path));
        params.insert("hash".into(), dv_str(hash));
        params.insert("now".into(), dv_f64(now_ms));
        params.insert(
            "nodes".into(),
            DataValue::List(nodes.iter().map(node_row).collect()),
        );
        params.insert(
            "edges".into(),
            DataValue::List(edges.iter().map(edge_row).collect()),
        );
        self.run_script(&script, params, ScriptMutability::Mutable)?;
        Ok(())
    }

    /// Remove a file entirely: nodes, edges, and the hash row, atomically.
    pub fn remove_file(&self, path: &str) -> Result<(), DbError> {
        let script = r#"
{
    node_ids[id] := *code_nodes{id, file_path}, file_path = $path
    del[f, t, k] := *code_edges{from_node: f, to_node: t, edge_type: k}, node_ids[f]
    del[f, t, k] := *code_edges{from_node: f, to_node: t, edge_type: k}, node_ids[t]
    ?[from_node, to_node, edge_type] := del[from_node, to_node, edge_type]
    :rm code_edges { from_node, to_node, edge_type }
}
{
    ?[id] := *code_nodes{id, file_path}, file_path = $path
    :rm code_nodes { id }
}
{
    ?[path] <- [[$path]]
    :rm file_hashes { path }
}
"#;
        let mut params = BTreeMap::new();
        params.insert("path".into(), dv_str(path));
        self.run_script(script, params, ScriptMutability::Mutable)?;
        Ok(())
    }

    // --- file hashes --------------------------------------------------------

    pub fn get_file_hash(&self, path: &str) -> Result<Option<FileHashEntry>, DbError> {
        let script = "?[path, hash, updated_at] := *file_hashes{path, hash, updated_at}, path = $path";
        let mut params = BTreeMap::new();
        params.insert("path".into(), dv_str(path));
        let rows = self.run_script(script, params, ScriptMutability::Immutable)?;
        rows.rows
            .first()
            .map(|r| {
                Ok(FileHashEntry {
                    path: row_str(&r[0], "file_hashes", "path")?,
                    hash: row_str(&r[1], "file_hashes", "hash")?,
                    updated_at: ms_to_dt(row_f64(&r[2], "file_hashes", "updated_at")?),
                })
            })
            .transpose()
    }

    pub fn all_file_hashes(&self) -> Result<Vec<FileHashEntry>, DbError> {
        let script = "?[path, hash, updated_at] := *file_hashes{path, hash, updated_at}";
        let rows = self.run_immutable(script)?;
        rows.rows
            .iter()
            .map(|r| {
                Ok(FileHashEntry {
                    path: row_str(&r[0], "file_hashes", "path")?,
                    hash: row_str(&r[1], "file_hashes", "hash")?,
                    updated_at: ms_to_dt(row_f64(&r[2], "file_hashes", "updated_at")?),
                })
            })
            .collect()
    }

    // --- traversals ---------------------------------------------------------

    /// BFS over `calls` edges from a node.
    pub fn get_call_graph(
        &self,
        node_id: &str,
        depth: usize,
        direction: TraversalDirection,
    ) -> Result<Traversal, DbError> {
        self.traverse(node_id, depth, direction, CodeEdgeType::Calls)
    }

    /// BFS over `imports` edges from a module; reverse is "imported by".
    pub fn get_dependency_tree(
        &self,
        module_id: &str,
        depth: usize,
        direction: TraversalDirection,
    ) -> Result<Traversal, DbError> {
        self.traverse(module_id, depth, direction, CodeEdgeType::Imports)
    }

    fn traverse(
        &self,
        origin: &str,
        depth: usize,
        direction: TraversalDirection,
        kind: CodeEdgeType,
    ) -> Result<Traversal, DbError> {
        let depth = depth.clamp(1, 5);
        let edges = self.edges_of_type(kind)?;

        let mut forward: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut reverse: HashMap<&str, Vec<&str>> = HashMap::new();
        for (from, to) in &edges {
            forward.entry(from.as_str()).or_default().push(to.as_str());
            reverse.entry(to.as_str()).or_default().push(from.as_str());
        }

        let mut result = Traversal {
            origin: origin.to_string(),
            ..Default::default()
        };
        if matches!(direction, TraversalDirection::Forward | TraversalDirection::Both) {
            result.outbound = bfs(&forward, origin, depth);
        }
        if matches!(direction, TraversalDirection::Reverse | TraversalDirection::Both) {
            result.inbound = bfs(&reverse, origin, depth);
        }
        Ok(result)
    }

    /// Sources of `implements` edges targeting the interface.
    pub fn find_implementations(&self, interface_id: &str) -> Result<Vec<String>, DbError> {
        let script = r#"
?[from_node] := *code_edges{from_node, to_node, edge_type}, to_node = $id, edge_type = "implements"
"#;
        let mut params = BTreeMap::new();
        params.insert("id".into(), dv_str(interface_id));
        let rows = self.run_script(script, params, ScriptMutability::Immutable)?;
        rows.rows
            .iter()
            .map(|r| row_str(&r[0], "code_edges", "from_node"))
            .collect()
    }

    // --- aggregates for the file-lookup stage -------------------------------

    /// Node count per file path.
    pub fn file_node_counts(&self) -> Result<HashMap<String, usize>, DbError> {
        let script = "?[file_path, id] := *code_nodes{id, file_path}";
        let rows = self.run_immutable(script)?;
        let mut counts: HashMap<String, usize> = HashMap::new();
        for r in rows.rows.iter() {
            *counts
                .entry(row_str(&r[0], "code_nodes", "file_path")?)
                .or_default() += 1;
        }
        Ok(counts)
    }

    /// Cross-file edge counts: how many edges connect file A's nodes to
    /// file B's nodes (self-links excluded).
    pub fn file_link_counts(&self) -> Result<HashMap<(String, String), usize>, DbError> {
        let script = r#"
?[fa, fb] := *code_edges{from_node: f, to_node: t},
    *code_nodes{id: f, file_path: fa},
    *code_nodes{id: t, file_path: fb}
"#;
        let rows = self.run_immutable(script)?;
        let mut counts: HashMap<(String, String), usize> = HashMap::new();
        for r in rows.rows.iter() {
            let fa = row_str(&r[0], "code_nodes", "file_path")?;
            let fb = row_str(&r[1], "code_nodes", "file_path")?;
            if fa != fb {
                *counts.entry((fa, fb)).or_default() += 1;
            }
        }
        Ok(counts)
    }

    // --- summaries ----------------------------------------------------------

    /// AI write-back: set the summary, mark it AI-generated at confidence
    /// 0.95, clear the needs-AI flag.
    pub fn set_ai_summary(&self, node_id: &str, summary: &str) -> Result<(), DbError> {
        let node = self
            .get_code_node(node_id)?
            .ok_or_else(|| DbError::NotFound(format!("code node `{node_id}`")))?;
        let updated = CodeNode {
            summary: Some(summary.to_string()),
            summary_origin: Some(SummaryOrigin::Ai),
            summary_confidence: Some(0.95),
            needs_ai_summary: false,
            ..node
        };
        self.upsert_code_node(&updated)
    }

    pub fn code_node_count(&self) -> Result<usize, DbError> {
        self.count_relation("code_nodes", "id")
    }

    pub fn code_edge_count(&self) -> Result<usize, DbError> {
        self.count_relation("code_edges", "from_node")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mnemo_core::types::node_id;
    use uuid::Uuid;

    fn node(path: &str, kind: CodeNodeType, name: &str) -> CodeNode {
        CodeNode {
            id: node_id(path, kind, name),
            kind,
            name: name.to_string(),
            file_path: path.to_string(),
            start_line: Some(1),
            end_line: Some(10),
            signature: Some(format!("fn {name}()")),
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

    fn seed_call_chain(db: &Database) -> (String, String, String) {
        let a = node("a.ts", CodeNodeType::Function, "handleRequest");
        let b = node("a.ts", CodeNodeType::Function, "validateToken");
        let c = node("b.ts", CodeNodeType::Function, "log");
        for n in [&a, &b, &c] {
            db.upsert_code_node(n).unwrap();
        }
        db.upsert_code_edge(&edge(&a.id, &b.id, CodeEdgeType::Calls)).unwrap();
        db.upsert_code_edge(&edge(&b.id, &c.id, CodeEdgeType::Calls)).unwrap();
        (a.id, b.id, c.id)
    }

    #[test]
    fn call_graph_walks_both_directions() {
        let db = Database::init_with_schema().unwrap();
        let (a, b, c) = seed_call_chain(&db);
        let t = db.get_call_graph(&b, 2, TraversalDirection::Both).unwrap();
        assert_eq!(t.outbound.len(), 1);
        assert_eq!(t.outbound[0].id, c);
        assert_eq!(t.inbound.len(), 1);
        assert_eq!(t.inbound[0].id, a);
    }

    #[test]
    fn duplicate_edge_upsert_is_idempotent() {
        let db = Database::init_with_schema().unwrap();
        let (a, b, _) = seed_call_chain(&db);
        db.upsert_code_edge(&edge(&a, &b, CodeEdgeType::Calls)).unwrap();
        assert_eq!(db.code_edge_count().unwrap(), 2);
    }

    #[test]
    fn bfs_respects_depth_and_cycles() {
        let db = Database::init_with_schema().unwrap();
        let a = node("x.ts", CodeNodeType::Function, "a");
        let b = node("x.ts", CodeNodeType::Function, "b");
        for n in [&a, &b] {
            db.upsert_code_node(n).unwrap();
        }
        // Cycle a -> b -> a must terminate.
        db.upsert_code_edge(&edge(&a.id, &b.id, CodeEdgeType::Calls)).unwrap();
        db.upsert_code_edge(&edge(&b.id, &a.id, CodeEdgeType::Calls)).unwrap();
        let t = db.get_call_graph(&a.id, 5, TraversalDirection::Forward).unwrap();
        assert_eq!(t.outbound.len(), 1, "origin is never revisited");
    }

    #[test]
    fn delete_node_cascades_edges() {
        let db = Database::init_with_schema().unwrap();
        let (_, b, _) = seed_call_chain(&db);
        db.delete_code_node(&b).unwrap();
        assert_eq!(db.code_edge_count().unwrap(), 0);
        assert!(db.get_code_node(&b).unwrap().is_none());
    }

    #[test]
    fn replace_file_swaps_atomically() {
        let db = Database::init_with_schema().unwrap();
        seed_call_chain(&db);
        assert_eq!(db.nodes_by_file("a.ts").unwrap().len(), 2);

        let fresh = vec![node("a.ts", CodeNodeType::Function, "newFn")];
        db.replace_file("a.ts", "hash2", 0.0, &fresh, &[]).unwrap();

        let after = db.nodes_by_file("a.ts").unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].name, "newFn");
        // Edges into the removed nodes are gone too.
        assert_eq!(db.code_edge_count().unwrap(), 0);
        assert!(db.get_file_hash("a.ts").unwrap().is_some());
    }

    #[test]
    fn remove_file_clears_hash_row() {
        let db = Database::init_with_schema().unwrap();
        seed_call_chain(&db);
        db.replace_file("a.ts", "h", 0.0, &[node("a.ts", CodeNodeType::Module, "a")], &[])
            .unwrap();
        db.remove_file("a.ts").unwrap();
        assert!(db.get_file_hash("a.ts").unwrap().is_none());
        assert!(db.nodes_by_file("a.ts").unwrap().is_empty());
    }

    #[test]
    fn implementations_lookup() {
        let db = Database::init_with_schema().unwrap();
        let iface = node("i.ts", CodeNodeType::Interface, "Storage");
        let imp = node("s.ts", CodeNodeType::Class, "DiskStorage");
        db.upsert_code_node(&iface).unwrap();
        db.upsert_code_node(&imp).unwrap();
        db.upsert_code_edge(&edge(&imp.id, &iface.id, CodeEdgeType::Implements))
            .unwrap();
        assert_eq!(db.find_implementations(&iface.id).unwrap(), vec![imp.id]);
    }

    #[test]
    fn ai_summary_write_back() {
        let db = Database::init_with_schema().unwrap();
        let n = node("a.ts", CodeNodeType::Function, "f");
        db.upsert_code_node(&n).unwrap();
        db.set_ai_summary(&n.id, "Validates JWT tokens").unwrap();
        let got = db.get_code_node(&n.id).unwrap().unwrap();
        assert_eq!(got.summary.as_deref(), Some("Validates JWT tokens"));
        assert_eq!(got.summary_origin, Some(SummaryOrigin::Ai));
        assert_eq!(got.summary_confidence, Some(0.95));
        assert!(!got.needs_ai_summary);
    }
}
