//! Vector-store adapter over the `vec_points` relation and its HNSW index.
//!
//! One logical collection: one point per memory, one per graph entity.
//! Scores are cosine similarity (`1 - distance`), so monotonicity holds for
//! downstream rank normalization. Payload filters are conjunctive; the
//! adapter over-fetches (4x the limit, floor 32) and post-filters rather
//! than pushing predicates into the index query.

use std::collections::BTreeMap;

use cozo::{DataValue, ScriptMutability};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::*;
use crate::error::DbError;

/// Who owns a vector point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerKind {
    Memory,
    Entity,
}

impl OwnerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerKind::Memory => "memory",
            OwnerKind::Entity => "entity",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "memory" => Some(OwnerKind::Memory),
            "entity" => Some(OwnerKind::Entity),
            _ => None,
        }
    }
}

/// Payload stored beside each point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorPayload {
    pub owner_id: Uuid,
    pub owner_kind: OwnerKind,
    pub mem_type: Option<String>,
    pub title: Option<String>,
    pub tags: Vec<String>,
    pub related_files: Vec<String>,
    pub importance: Option<f64>,
}

/// A search hit: similarity score plus the stored payload.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: Uuid,
    pub payload: VectorPayload,
    /// Cosine similarity in `[-1, 1]`.
    pub score: f64,
}

impl VectorHit {
    /// The owning memory id, when the point belongs to a memory.
    pub fn memory_id(&self) -> Option<Uuid> {
        (self.payload.owner_kind == OwnerKind::Memory).then_some(self.payload.owner_id)
    }
}

/// Conjunctive payload filters: every supplied field must match.
#[derive(Debug, Clone, Default)]
pub struct VectorFilters {
    pub owner_kind: Option<OwnerKind>,
    pub mem_type: Option<String>,
    pub tags: Vec<String>,
    pub related_files: Vec<String>,
    pub min_importance: Option<f64>,
}

impl VectorFilters {
    fn matches(&self, p: &VectorPayload) -> bool {
        if let Some(kind) = self.owner_kind {
            if p.owner_kind != kind {
                return false;
            }
        }
        if let Some(ty) = &self.mem_type {
            if p.mem_type.as_deref() != Some(ty.as_str()) {
                return false;
            }
        }
        if !self.tags.is_empty() && !self.tags.iter().all(|t| p.tags.contains(t)) {
            return false;
        }
        if !self.related_files.is_empty()
            && !self
                .related_files
                .iter()
                .all(|f| p.related_files.contains(f))
        {
            return false;
        }
        if let Some(min) = self.min_importance {
            if p.importance.unwrap_or(0.0) < min {
                return false;
            }
        }
        true
    }
}

/// Collection statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub vectors_count: usize,
    pub points_count: usize,
}

/// Related-files payload entries are clamped so filter evaluation stays
/// O(small) per point.
const MAX_PAYLOAD_RELATED_FILES: usize = 16;

impl Database {
    /// Insert or replace a vector point.
    pub fn vector_upsert(
        &self,
        id: Uuid,
        vector: &[f32],
        payload: &VectorPayload,
    ) -> Result<(), DbError> {
        if vector.len() != self.embedding_dim() {
            return Err(DbError::DimensionMismatch {
                expected: self.embedding_dim(),
                got: vector.len(),
            });
        }
        let script = r#"
?[id, owner_id, owner_kind, mem_type, title, tags, related_files, importance, embedding] :=
    id = $id,
    owner_id = $owner_id,
    owner_kind = $owner_kind,
    mem_type = $mem_type,
    title = $title,
    tags = $tags,
    related_files = $related_files,
    importance = $importance,
    embedding = vec($embedding)
:put vec_points { id => owner_id, owner_kind, mem_type, title, tags, related_files, importance, embedding }
"#;
        let mut related = payload.related_files.clone();
        related.truncate(MAX_PAYLOAD_RELATED_FILES);
        let mut params = BTreeMap::new();
        params.insert("id".into(), dv_uuid(id));
        params.insert("owner_id".into(), dv_uuid(payload.owner_id));
        params.insert("owner_kind".into(), dv_str(payload.owner_kind.as_str()));
        params.insert("mem_type".into(), dv_opt_str(payload.mem_type.as_deref()));
        params.insert("title".into(), dv_opt_str(payload.title.as_deref()));
        params.insert("tags".into(), dv_str_list(&payload.tags));
        params.insert("related_files".into(), dv_str_list(&related));
        params.insert("importance".into(), dv_opt_f64(payload.importance));
        params.insert("embedding".into(), dv_f32_list(vector));
        self.run_script(script, params, ScriptMutability::Mutable)?;
        Ok(())
    }

    /// HNSW search with conjunctive payload filters.
    pub fn vector_search(
        &self,
        vector: &[f32],
        filters: &VectorFilters,
        limit: usize,
    ) -> Result<Vec<VectorHit>, DbError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        if vector.len() != self.embedding_dim() {
            return Err(DbError::DimensionMismatch {
                expected: self.embedding_dim(),
                got: vector.len(),
            });
        }
        let fetch = (limit * 4).max(32);
        let script = r#"
?[dist, id, owner_id, owner_kind, mem_type, title, tags, related_files, importance] :=
    ~vec_points:semantic{ id, owner_id, owner_kind, mem_type, title, tags, related_files, importance |
        query: vec($q),
        k: $k,
        ef: $ef,
        bind_distance: dist
    }
:sort dist
"#;
        let mut params = BTreeMap::new();
        params.insert("q".into(), dv_f32_list(vector));
        params.insert("k".into(), dv_i64(fetch as i64));
        params.insert("ef".into(), dv_i64((fetch * 2).max(64) as i64));
        let rows = self.run_script(script, params, ScriptMutability::Immutable)?;

        let mut hits = Vec::with_capacity(limit);
        for row in rows.rows.iter() {
            let dist = row_f64(&row[0], "vec_points", "distance")?;
            let owner_kind_s = row_str(&row[3], "vec_points", "owner_kind")?;
            let payload = VectorPayload {
                owner_id: row_uuid(&row[2], "vec_points", "owner_id")?,
                owner_kind: OwnerKind::parse(&owner_kind_s).ok_or(DbError::Decode {
                    relation: "vec_points",
                    column: "owner_kind",
                    message: format!("unknown owner kind `{owner_kind_s}`"),
                })?,
                mem_type: row_opt_str(&row[4]),
                title: row_opt_str(&row[5]),
                tags: row_str_list(&row[6]),
                related_files: row_str_list(&row[7]),
                importance: row_opt_f64(&row[8]),
            };
            if !filters.matches(&payload) {
                continue;
            }
            hits.push(VectorHit {
                id: row_uuid(&row[1], "vec_points", "id")?,
                payload,
                score: 1.0 - dist,
            });
            if hits.len() >= limit {
                break;
            }
        }
        Ok(hits)
    }

    /// Delete a single point by id.
    pub fn vector_delete(&self, id: Uuid) -> Result<(), DbError> {
        let script = "?[id] <- [[$id]] :rm vec_points { id }";
        let mut params = BTreeMap::new();
        params.insert("id".into(), dv_uuid(id));
        self.run_script(script, params, ScriptMutability::Mutable)?;
        Ok(())
    }

    /// Delete every point owned by a memory.
    pub fn vector_delete_by_memory(&self, memory_id: Uuid) -> Result<(), DbError> {
        let script = r#"
?[id] := *vec_points{id, owner_id, owner_kind}, owner_id = $owner, owner_kind = "memory"
:rm vec_points { id }
"#;
        let mut params = BTreeMap::new();
        params.insert("owner".into(), dv_uuid(memory_id));
        self.run_script(script, params, ScriptMutability::Mutable)?;
        Ok(())
    }

    pub fn vector_collection_info(&self) -> Result<CollectionInfo, DbError> {
        let n = self.count_relation("vec_points", "id")?;
        Ok(CollectionInfo {
            vectors_count: n,
            points_count: n,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_vec(dim: usize, hot: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; dim];
        v[hot % dim] = 1.0;
        v
    }

    fn payload(kind: OwnerKind, ty: Option<&str>, tags: &[&str]) -> VectorPayload {
        VectorPayload {
            owner_id: Uuid::new_v4(),
            owner_kind: kind,
            mem_type: ty.map(|s| s.to_string()),
            title: Some("t".into()),
            tags: tags.iter().map(|s| s.to_string()).collect(),
            related_files: vec![],
            importance: Some(0.5),
        }
    }

    #[test]
    fn upsert_search_delete() {
        let db = Database::init_with_dim(8).unwrap();
        let id = Uuid::new_v4();
        db.vector_upsert(id, &unit_vec(8, 0), &payload(OwnerKind::Memory, Some("decision"), &[]))
            .unwrap();
        let hits = db
            .vector_search(&unit_vec(8, 0), &VectorFilters::default(), 5)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, id);
        assert!(hits[0].score > 0.99, "exact match should score ~1");

        db.vector_delete(id).unwrap();
        let info = db.vector_collection_info().unwrap();
        assert_eq!(info.points_count, 0);
    }

    #[test]
    fn filters_are_conjunctive() {
        let db = Database::init_with_dim(8).unwrap();
        db.vector_upsert(
            Uuid::new_v4(),
            &unit_vec(8, 0),
            &payload(OwnerKind::Memory, Some("decision"), &["auth", "jwt"]),
        )
        .unwrap();
        db.vector_upsert(
            Uuid::new_v4(),
            &unit_vec(8, 1),
            &payload(OwnerKind::Memory, Some("note"), &["auth"]),
        )
        .unwrap();

        let f = VectorFilters {
            mem_type: Some("decision".into()),
            tags: vec!["auth".into(), "jwt".into()],
            ..Default::default()
        };
        let hits = db.vector_search(&unit_vec(8, 0), &f, 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].payload.mem_type.as_deref(), Some("decision"));

        let f2 = VectorFilters {
            mem_type: Some("decision".into()),
            tags: vec!["missing".into()],
            ..Default::default()
        };
        assert!(db.vector_search(&unit_vec(8, 0), &f2, 10).unwrap().is_empty());
    }

    #[test]
    fn dimension_mismatch_rejected() {
        let db = Database::init_with_dim(8).unwrap();
        let err = db
            .vector_upsert(
                Uuid::new_v4(),
                &unit_vec(4, 0),
                &payload(OwnerKind::Entity, None, &[]),
            )
            .unwrap_err();
        assert!(matches!(err, DbError::DimensionMismatch { expected: 8, got: 4 }));
    }

    #[test]
    fn delete_by_memory_removes_owned_points() {
        let db = Database::init_with_dim(8).unwrap();
        let mut p = payload(OwnerKind::Memory, None, &[]);
        let owner = p.owner_id;
        db.vector_upsert(Uuid::new_v4(), &unit_vec(8, 0), &p).unwrap();
        p.owner_id = Uuid::new_v4();
        db.vector_upsert(Uuid::new_v4(), &unit_vec(8, 1), &p).unwrap();

        db.vector_delete_by_memory(owner).unwrap();
        assert_eq!(db.vector_collection_info().unwrap().points_count, 1);
    }
}
