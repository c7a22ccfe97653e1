//! Memory CRUD and access bookkeeping.
//!
//! The relational row owns the lifetime of the memory's vector point:
//! deleting a memory here also removes its point from `vec_points`.

use std::collections::BTreeMap;

use cozo::{DataValue, ScriptMutability};
use mnemo_core::types::{Memory, MemoryType};
use uuid::Uuid;

use crate::database::*;
use crate::error::DbError;

const MEMORY_COLS: &str = "id, kind, title, content, summary, importance, tags, related_files, created_at, accessed_at, access_count, vector_id, last_refreshed_at";

fn memory_params(m: &Memory) -> BTreeMap<String, DataValue> {
    let mut params = BTreeMap::new();
    params.insert("id".into(), dv_uuid(m.id));
    params.insert("kind".into(), dv_str(m.kind.as_str()));
    params.insert("title".into(), dv_str(&m.title));
    params.insert("content".into(), dv_str(&m.content));
    params.insert("summary".into(), dv_opt_str(m.summary.as_deref()));
    params.insert("importance".into(), dv_f64(m.importance));
    params.insert("tags".into(), dv_str_list(&m.tags));
    params.insert("related_files".into(), dv_str_list(&m.related_files));
    params.insert("created_at".into(), dv_f64(dt_to_ms(m.created_at)));
    params.insert("accessed_at".into(), dv_f64(dt_to_ms(m.accessed_at)));
    params.insert("access_count".into(), dv_i64(m.access_count));
    params.insert("vector_id".into(), dv_opt_uuid(m.vector_id));
    params.insert(
        "last_refreshed_at".into(),
        dv_opt_f64(m.last_refreshed_at.map(dt_to_ms)),
    );
    params
}

fn memory_from_row(row: &[DataValue]) -> Result<Memory, DbError> {
    let kind_s = row_str(&row[1], "memories", "kind")?;
    Ok(Memory {
        id: row_uuid(&row[0], "memories", "id")?,
        kind: MemoryType::parse(&kind_s).ok_or(DbError::Decode {
            relation: "memories",
            column: "kind",
            message: format!("unknown memory type `{kind_s}`"),
        })?,
        title: row_str(&row[2], "memories", "title")?,
        content: row_str(&row[3], "memories", "content")?,
        summary: row_opt_str(&row[4]),
        importance: row_f64(&row[5], "memories", "importance")?,
        tags: row_str_list(&row[6]),
        related_files: row_str_list(&row[7]),
        created_at: ms_to_dt(row_f64(&row[8], "memories", "created_at")?),
        accessed_at: ms_to_dt(row_f64(&row[9], "memories", "accessed_at")?),
        access_count: row_i64(&row[10], "memories", "access_count")?,
        vector_id: row_opt_uuid(&row[11]),
        last_refreshed_at: row_opt_f64(&row[12]).map(ms_to_dt),
    })
}

impl Database {
    /// Insert or replace a memory row.
    pub fn store_memory(&self, memory: &Memory) -> Result<(), DbError> {
        let script = r#"
?[id, kind, title, content, summary, importance, tags, related_files, created_at, accessed_at, access_count, vector_id, last_refreshed_at] <-
    [[$id, $kind, $title, $content, $summary, $importance, $tags, $related_files, $created_at, $accessed_at, $access_count, $vector_id, $last_refreshed_at]]
:put memories { id => kind, title, content, summary, importance, tags, related_files, created_at, accessed_at, access_count, vector_id, last_refreshed_at }
"#;
        self.run_script(script, memory_params(memory), ScriptMutability::Mutable)?;
        Ok(())
    }

    /// Fetch a memory without touching access bookkeeping.
    pub fn get_memory(&self, id: Uuid) -> Result<Option<Memory>, DbError> {
        let script = format!("?[{MEMORY_COLS}] := *memories{{{MEMORY_COLS}}}, id = $id");
        let mut params = BTreeMap::new();
        params.insert("id".into(), dv_uuid(id));
        let rows = self.run_script(&script, params, ScriptMutability::Immutable)?;
        rows.rows.first().map(|r| memory_from_row(r)).transpose()
    }

    /// Bump `accessed_at` and `access_count` after a read.
    pub fn mark_memory_accessed(&self, id: Uuid, now_ms: f64) -> Result<(), DbError> {
        let script = r#"
?[id, kind, title, content, summary, importance, tags, related_files, created_at, accessed_at, access_count, vector_id, last_refreshed_at] :=
    *memories{id, kind, title, content, summary, importance, tags, related_files, created_at, access_count: old_count, vector_id, last_refreshed_at},
    id = $id,
    accessed_at = $now,
    access_count = old_count + 1
:put memories { id => kind, title, content, summary, importance, tags, related_files, created_at, accessed_at, access_count, vector_id, last_refreshed_at }
"#;
        let mut params = BTreeMap::new();
        params.insert("id".into(), dv_uuid(id));
        params.insert("now".into(), dv_f64(now_ms));
        self.run_script(script, params, ScriptMutability::Mutable)?;
        Ok(())
    }

    /// Delete a memory and its vector point.
    pub fn delete_memory(&self, id: Uuid) -> Result<(), DbError> {
        let script = r#"
{
    ?[id] := *vec_points{id, owner_id}, owner_id = $id
    :rm vec_points { id }
}
{
    ?[id] <- [[$id]]
    :rm memories { id }
}
"#;
        let mut params = BTreeMap::new();
        params.insert("id".into(), dv_uuid(id));
        self.run_script(script, params, ScriptMutability::Mutable)?;
        Ok(())
    }

    /// All memories, unordered. Local stores are small; callers filter.
    pub fn all_memories(&self) -> Result<Vec<Memory>, DbError> {
        let script = format!("?[{MEMORY_COLS}] := *memories{{{MEMORY_COLS}}}");
        let rows = self.run_immutable(&script)?;
        rows.rows.iter().map(|r| memory_from_row(r)).collect()
    }

    pub fn memory_count(&self) -> Result<usize, DbError> {
        self.count_relation("memories", "id")
    }
}
