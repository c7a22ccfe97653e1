//! Knowledge-graph store: entities, relationships, links, communities,
//! reports, memory relations.

use std::collections::BTreeMap;

use cozo::{DataValue, ScriptMutability};
use mnemo_core::types::{
    Community, CommunityReport, EntityMemoryLink, EntityType, GraphEntity, MemoryRelation,
    Relationship,
};
use uuid::Uuid;

use crate::database::*;
use crate::error::DbError;

/// Which side of a relationship the entity sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelDirection {
    Source,
    Target,
    Both,
}

const ENTITY_COLS: &str = "id, canonical_name, entity_type, description, mention_count, extraction_confidence, first_seen_at, last_seen_at, embedding_id";
const REL_COLS: &str =
    "id, source_entity_id, target_entity_id, relationship_type, strength, description, created_at";

fn entity_from_row(row: &[DataValue]) -> Result<GraphEntity, DbError> {
    let ty_s = row_str(&row[2], "graph_entities", "entity_type")?;
    Ok(GraphEntity {
        id: row_uuid(&row[0], "graph_entities", "id")?,
        canonical_name: row_str(&row[1], "graph_entities", "canonical_name")?,
        entity_type: EntityType::parse(&ty_s).ok_or(DbError::Decode {
            relation: "graph_entities",
            column: "entity_type",
            message: format!("unknown entity type `{ty_s}`"),
        })?,
        description: row_opt_str(&row[3]),
        mention_count: row_i64(&row[4], "graph_entities", "mention_count")?,
        extraction_confidence: row_f64(&row[5], "graph_entities", "extraction_confidence")?,
        first_seen_at: ms_to_dt(row_f64(&row[6], "graph_entities", "first_seen_at")?),
        last_seen_at: ms_to_dt(row_f64(&row[7], "graph_entities", "last_seen_at")?),
        embedding_id: row_opt_uuid(&row[8]),
    })
}

fn relationship_from_row(row: &[DataValue]) -> Result<Relationship, DbError> {
    Ok(Relationship {
        id: row_uuid(&row[0], "graph_relationships", "id")?,
        source_entity_id: row_uuid(&row[1], "graph_relationships", "source_entity_id")?,
        target_entity_id: row_uuid(&row[2], "graph_relationships", "target_entity_id")?,
        relationship_type: row_str(&row[3], "graph_relationships", "relationship_type")?,
        strength: row_f64(&row[4], "graph_relationships", "strength")?,
        description: row_opt_str(&row[5]),
        created_at: ms_to_dt(row_f64(&row[6], "graph_relationships", "created_at")?),
    })
}

impl Database {
    // --- entities -----------------------------------------------------------

    pub fn upsert_entity(&self, e: &GraphEntity) -> Result<(), DbError> {
        let script = format!(
            "?[{ENTITY_COLS}] <- [[$id, $canonical_name, $entity_type, $description, $mention_count, $extraction_confidence, $first_seen_at, $last_seen_at, $embedding_id]]\n:put graph_entities {{ id => canonical_name, entity_type, description, mention_count, extraction_confidence, first_seen_at, last_seen_at, embedding_id }}"
        );
        let mut params = BTreeMap::new();
        params.insert("id".into(), dv_uuid(e.id));
        params.insert("canonical_name".into(), dv_str(&e.canonical_name));
        params.insert("entity_type".into(), dv_str(e.entity_type.as_str()));
        params.insert("description".into(), dv_opt_str(e.description.as_deref()));
        params.insert("mention_count".into(), dv_i64(e.mention_count));
        params.insert(
            "extraction_confidence".into(),
            dv_f64(e.extraction_confidence),
        );
        params.insert("first_seen_at".into(), dv_f64(dt_to_ms(e.first_seen_at)));
        params.insert("last_seen_at".into(), dv_f64(dt_to_ms(e.last_seen_at)));
        params.insert("embedding_id".into(), dv_opt_uuid(e.embedding_id));
        self.run_script(&script, params, ScriptMutability::Mutable)?;
        Ok(())
    }

    pub fn get_entity(&self, id: Uuid) -> Result<Option<GraphEntity>, DbError> {
        let script = format!("?[{ENTITY_COLS}] := *graph_entities{{{ENTITY_COLS}}}, id = $id");
        let mut params = BTreeMap::new();
        params.insert("id".into(), dv_uuid(id));
        let rows = self.run_script(&script, params, ScriptMutability::Immutable)?;
        rows.rows.first().map(|r| entity_from_row(r)).transpose()
    }

    pub fn all_entities(&self) -> Result<Vec<GraphEntity>, DbError> {
        let script = format!("?[{ENTITY_COLS}] := *graph_entities{{{ENTITY_COLS}}}");
        let rows = self.run_immutable(&script)?;
        rows.rows.iter().map(|r| entity_from_row(r)).collect()
    }

    pub fn entity_count(&self) -> Result<usize, DbError> {
        self.count_relation("graph_entities", "id")
    }

    // --- relationships ------------------------------------------------------

    pub fn upsert_relationship(&self, r: &Relationship) -> Result<(), DbError> {
        let script = format!(
            "?[{REL_COLS}] <- [[$id, $source_entity_id, $target_entity_id, $relationship_type, $strength, $description, $created_at]]\n:put graph_relationships {{ id => source_entity_id, target_entity_id, relationship_type, strength, description, created_at }}"
        );
        let mut params = BTreeMap::new();
        params.insert("id".into(), dv_uuid(r.id));
        params.insert("source_entity_id".into(), dv_uuid(r.source_entity_id));
        params.insert("target_entity_id".into(), dv_uuid(r.target_entity_id));
        params.insert("relationship_type".into(), dv_str(&r.relationship_type));
        params.insert("strength".into(), dv_f64(r.strength));
        params.insert("description".into(), dv_opt_str(r.description.as_deref()));
        params.insert("created_at".into(), dv_f64(dt_to_ms(r.created_at)));
        self.run_script(&script, params, ScriptMutability::Mutable)?;
        Ok(())
    }

    /// Relationships where the entity appears on the requested side, sorted
    /// by strength descending.
    pub fn relationships_for_entity(
        &self,
        entity_id: Uuid,
        direction: RelDirection,
    ) -> Result<Vec<Relationship>, DbError> {
        let script = match direction {
            RelDirection::Source => format!(
                "?[{REL_COLS}] := *graph_relationships{{{REL_COLS}}}, source_entity_id = $id"
            ),
            RelDirection::Target => format!(
                "?[{REL_COLS}] := *graph_relationships{{{REL_COLS}}}, target_entity_id = $id"
            ),
            RelDirection::Both => format!(
                "hit[{REL_COLS}] := *graph_relationships{{{REL_COLS}}}, source_entity_id = $id\nhit[{REL_COLS}] := *graph_relationships{{{REL_COLS}}}, target_entity_id = $id\n?[{REL_COLS}] := hit[{REL_COLS}]"
            ),
        };
        let mut params = BTreeMap::new();
        params.insert("id".into(), dv_uuid(entity_id));
        let rows = self.run_script(&script, params, ScriptMutability::Immutable)?;
        let mut rels: Vec<Relationship> = rows
            .rows
            .iter()
            .map(|r| relationship_from_row(r))
            .collect::<Result<_, _>>()?;
        rels.sort_by(|a, b| {
            b.strength
                .partial_cmp(&a.strength)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(rels)
    }

    pub fn relationship_count(&self) -> Result<usize, DbError> {
        self.count_relation("graph_relationships", "id")
    }

    // --- entity-memory links ------------------------------------------------

    pub fn link_entity_memory(&self, link: &EntityMemoryLink) -> Result<(), DbError> {
        let script = r#"
?[entity_id, memory_id, confidence, created_at] <- [[$entity_id, $memory_id, $confidence, $created_at]]
:put graph_entity_memories { entity_id, memory_id => confidence, created_at }
"#;
        let mut params = BTreeMap::new();
        params.insert("entity_id".into(), dv_uuid(link.entity_id));
        params.insert("memory_id".into(), dv_uuid(link.memory_id));
        params.insert("confidence".into(), dv_f64(link.confidence));
        params.insert("created_at".into(), dv_f64(dt_to_ms(link.created_at)));
        self.run_script(script, params, ScriptMutability::Mutable)?;
        Ok(())
    }

    /// Memory ids linked to an entity, highest confidence first.
    pub fn memories_for_entity(&self, entity_id: Uuid) -> Result<Vec<(Uuid, f64)>, DbError> {
        let script = r#"
?[memory_id, confidence] := *graph_entity_memories{entity_id, memory_id, confidence}, entity_id = $id
"#;
        let mut params = BTreeMap::new();
        params.insert("id".into(), dv_uuid(entity_id));
        let rows = self.run_script(script, params, ScriptMutability::Immutable)?;
        let mut links: Vec<(Uuid, f64)> = rows
            .rows
            .iter()
            .map(|r| {
                Ok((
                    row_uuid(&r[0], "graph_entity_memories", "memory_id")?,
                    row_f64(&r[1], "graph_entity_memories", "confidence")?,
                ))
            })
            .collect::<Result<_, DbError>>()?;
        links.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(links)
    }

    // --- communities --------------------------------------------------------

    pub fn upsert_community(&self, c: &Community) -> Result<(), DbError> {
        let script = r#"
?[id, level, parent_id, entity_count] <- [[$id, $level, $parent_id, $entity_count]]
:put graph_communities { id => level, parent_id, entity_count }
"#;
        let mut params = BTreeMap::new();
        params.insert("id".into(), dv_uuid(c.id));
        params.insert("level".into(), dv_i64(c.level));
        params.insert("parent_id".into(), dv_opt_uuid(c.parent_id));
        params.insert("entity_count".into(), dv_i64(c.entity_count));
        self.run_script(script, params, ScriptMutability::Mutable)?;
        Ok(())
    }

    pub fn add_community_member(&self, community_id: Uuid, entity_id: Uuid) -> Result<(), DbError> {
        let script = r#"
?[community_id, entity_id] <- [[$community_id, $entity_id]]
:put graph_community_members { community_id, entity_id }
"#;
        let mut params = BTreeMap::new();
        params.insert("community_id".into(), dv_uuid(community_id));
        params.insert("entity_id".into(), dv_uuid(entity_id));
        self.run_script(script, params, ScriptMutability::Mutable)?;
        Ok(())
    }

    /// Communities containing an entity, lowest level first.
    pub fn communities_for_entity(&self, entity_id: Uuid) -> Result<Vec<Community>, DbError> {
        let script = r#"
?[id, level, parent_id, entity_count] :=
    *graph_community_members{community_id: id, entity_id},
    *graph_communities{id, level, parent_id, entity_count},
    entity_id = $id
:sort level
"#;
        let mut params = BTreeMap::new();
        params.insert("id".into(), dv_uuid(entity_id));
        let rows = self.run_script(script, params, ScriptMutability::Immutable)?;
        rows.rows
            .iter()
            .map(|r| {
                Ok(Community {
                    id: row_uuid(&r[0], "graph_communities", "id")?,
                    level: row_i64(&r[1], "graph_communities", "level")?,
                    parent_id: row_opt_uuid(&r[2]),
                    entity_count: row_i64(&r[3], "graph_communities", "entity_count")?,
                })
            })
            .collect()
    }

    pub fn community_count(&self) -> Result<usize, DbError> {
        self.count_relation("graph_communities", "id")
    }

    // --- reports ------------------------------------------------------------

    pub fn upsert_report(&self, report: &CommunityReport) -> Result<(), DbError> {
        let script = r#"
?[community_id, title, summary, full_content, key_findings, rating] <-
    [[$community_id, $title, $summary, $full_content, $key_findings, $rating]]
:put graph_community_reports { community_id => title, summary, full_content, key_findings, rating }
"#;
        let mut params = BTreeMap::new();
        params.insert("community_id".into(), dv_uuid(report.community_id));
        params.insert("title".into(), dv_str(&report.title));
        params.insert("summary".into(), dv_str(&report.summary));
        params.insert("full_content".into(), dv_str(&report.full_content));
        params.insert("key_findings".into(), dv_str_list(&report.key_findings));
        params.insert("rating".into(), dv_opt_f64(report.rating));
        self.run_script(script, params, ScriptMutability::Mutable)?;
        Ok(())
    }

    pub fn get_report(&self, community_id: Uuid) -> Result<Option<CommunityReport>, DbError> {
        let script = r#"
?[community_id, title, summary, full_content, key_findings, rating] :=
    *graph_community_reports{community_id, title, summary, full_content, key_findings, rating},
    community_id = $id
"#;
        let mut params = BTreeMap::new();
        params.insert("id".into(), dv_uuid(community_id));
        let rows = self.run_script(script, params, ScriptMutability::Immutable)?;
        rows.rows
            .first()
            .map(|r| {
                Ok(CommunityReport {
                    community_id: row_uuid(&r[0], "graph_community_reports", "community_id")?,
                    title: row_str(&r[1], "graph_community_reports", "title")?,
                    summary: row_str(&r[2], "graph_community_reports", "summary")?,
                    full_content: row_str(&r[3], "graph_community_reports", "full_content")?,
                    key_findings: row_str_list(&r[4]),
                    rating: row_opt_f64(&r[5]),
                })
            })
            .transpose()
    }

    // --- memory relations ---------------------------------------------------

    pub fn relate_memories(&self, rel: &MemoryRelation) -> Result<(), DbError> {
        let script = r#"
?[from_id, to_id, relation_type, created_at] <- [[$from_id, $to_id, $relation_type, $created_at]]
:put memory_relations { from_id, to_id => relation_type, created_at }
"#;
        let mut params = BTreeMap::new();
        params.insert("from_id".into(), dv_uuid(rel.from_id));
        params.insert("to_id".into(), dv_uuid(rel.to_id));
        params.insert("relation_type".into(), dv_str(&rel.relation_type));
        params.insert("created_at".into(), dv_f64(dt_to_ms(rel.created_at)));
        self.run_script(script, params, ScriptMutability::Mutable)?;
        Ok(())
    }

    pub fn relations_for_memory(&self, memory_id: Uuid) -> Result<Vec<MemoryRelation>, DbError> {
        let script = r#"
hit[from_id, to_id, relation_type, created_at] := *memory_relations{from_id, to_id, relation_type, created_at}, from_id = $id
hit[from_id, to_id, relation_type, created_at] := *memory_relations{from_id, to_id, relation_type, created_at}, to_id = $id
?[from_id, to_id, relation_type, created_at] := hit[from_id, to_id, relation_type, created_at]
"#;
        let mut params = BTreeMap::new();
        params.insert("id".into(), dv_uuid(memory_id));
        let rows = self.run_script(script, params, ScriptMutability::Immutable)?;
        rows.rows
            .iter()
            .map(|r| {
                Ok(MemoryRelation {
                    from_id: row_uuid(&r[0], "memory_relations", "from_id")?,
                    to_id: row_uuid(&r[1], "memory_relations", "to_id")?,
                    relation_type: row_str(&r[2], "memory_relations", "relation_type")?,
                    created_at: ms_to_dt(row_f64(&r[3], "memory_relations", "created_at")?),
                })
            })
            .collect()
    }
}
