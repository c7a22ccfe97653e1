//! Database handle and CozoScript plumbing.
//!
//! [`Database`] wraps an embedded `cozo::Db<MemStorage>`. All stores in this
//! crate run CozoScript through [`Database::run_script`]; multi-statement
//! scripts (`{ ... } { ... }`) execute in a single transaction, which is what
//! the scanner's per-file replace relies on.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use cozo::{DataValue, Db, MemStorage, NamedRows, Num, ScriptMutability, UuidWrapper};
use uuid::Uuid;

use crate::error::DbError;
use crate::schema::create_schema;

/// Default embedding dimension for the vector collection.
pub const DEFAULT_EMBEDDING_DIM: usize = 384;

#[derive(Debug)]
pub struct Database {
    db: Db<MemStorage>,
    embedding_dim: usize,
}

impl Database {
    /// Create an in-memory database with the full schema initialized.
    pub fn init_with_schema() -> Result<Self, DbError> {
        Self::init_with_dim(DEFAULT_EMBEDDING_DIM)
    }

    /// Create an in-memory database with a non-default embedding dimension.
    pub fn init_with_dim(embedding_dim: usize) -> Result<Self, DbError> {
        if embedding_dim == 0 {
            return Err(DbError::InvalidArgument(
                "embedding dimension must be positive".into(),
            ));
        }
        let db = Db::new(MemStorage::default()).map_err(|e| DbError::Cozo(e.to_string()))?;
        db.initialize().map_err(|e| DbError::Cozo(e.to_string()))?;
        let this = Self { db, embedding_dim };
        create_schema(&this)?;
        Ok(this)
    }

    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    /// Execute a CozoScript with parameters.
    pub fn run_script(
        &self,
        script: &str,
        params: BTreeMap<String, DataValue>,
        mutability: ScriptMutability,
    ) -> Result<NamedRows, DbError> {
        self.db
            .run_script(script, params, mutability)
            .map_err(|e| DbError::Cozo(e.to_string()))
    }

    /// Execute a read-only script with no parameters.
    pub fn run_immutable(&self, script: &str) -> Result<NamedRows, DbError> {
        self.run_script(script, BTreeMap::new(), ScriptMutability::Immutable)
    }

    /// Count the rows of a stored relation by its first key column.
    pub fn count_relation(&self, relation: &str, key: &str) -> Result<usize, DbError> {
        let script = format!("?[count({key})] := *{relation}{{{key}}}");
        let rows = self.run_immutable(&script)?;
        Ok(rows
            .rows
            .first()
            .and_then(|r| r.first())
            .and_then(|v| v.get_int())
            .unwrap_or(0) as usize)
    }
}

// --- DataValue constructors -------------------------------------------------

pub fn dv_str(s: &str) -> DataValue {
    DataValue::Str(s.into())
}

pub fn dv_opt_str(s: Option<&str>) -> DataValue {
    s.map(dv_str).unwrap_or(DataValue::Null)
}

pub fn dv_i64(n: i64) -> DataValue {
    DataValue::from(n)
}

pub fn dv_f64(f: f64) -> DataValue {
    DataValue::Num(Num::Float(f))
}

pub fn dv_opt_f64(f: Option<f64>) -> DataValue {
    f.map(dv_f64).unwrap_or(DataValue::Null)
}

pub fn dv_opt_i64(n: Option<i64>) -> DataValue {
    n.map(dv_i64).unwrap_or(DataValue::Null)
}

pub fn dv_bool(b: bool) -> DataValue {
    DataValue::Bool(b)
}

pub fn dv_uuid(u: Uuid) -> DataValue {
    DataValue::Uuid(UuidWrapper(u))
}

pub fn dv_opt_uuid(u: Option<Uuid>) -> DataValue {
    u.map(dv_uuid).unwrap_or(DataValue::Null)
}

pub fn dv_str_list(items: &[String]) -> DataValue {
    DataValue::List(items.iter().map(|s| dv_str(s)).collect())
}

pub fn dv_f32_list(values: &[f32]) -> DataValue {
    DataValue::List(values.iter().map(|f| dv_f64(*f as f64)).collect())
}

pub fn dv_json(value: serde_json::Value) -> DataValue {
    DataValue::Json(cozo::JsonData(value))
}

pub fn dv_opt_json(value: Option<serde_json::Value>) -> DataValue {
    value.map(dv_json).unwrap_or(DataValue::Null)
}

// --- Row decoding -----------------------------------------------------------

fn decode_err(relation: &'static str, column: &'static str, v: &DataValue) -> DbError {
    DbError::Decode {
        relation,
        column,
        message: format!("unexpected value {v:?}"),
    }
}

pub fn row_str(
    v: &DataValue,
    relation: &'static str,
    column: &'static str,
) -> Result<String, DbError> {
    v.get_str()
        .map(|s| s.to_string())
        .ok_or_else(|| decode_err(relation, column, v))
}

pub fn row_opt_str(v: &DataValue) -> Option<String> {
    v.get_str().map(|s| s.to_string())
}

pub fn row_i64(
    v: &DataValue,
    relation: &'static str,
    column: &'static str,
) -> Result<i64, DbError> {
    v.get_int().ok_or_else(|| decode_err(relation, column, v))
}

pub fn row_f64(
    v: &DataValue,
    relation: &'static str,
    column: &'static str,
) -> Result<f64, DbError> {
    v.get_float()
        .or_else(|| v.get_int().map(|i| i as f64))
        .ok_or_else(|| decode_err(relation, column, v))
}

pub fn row_opt_f64(v: &DataValue) -> Option<f64> {
    v.get_float().or_else(|| v.get_int().map(|i| i as f64))
}

pub fn row_opt_i64(v: &DataValue) -> Option<i64> {
    v.get_int()
}

pub fn row_bool(
    v: &DataValue,
    relation: &'static str,
    column: &'static str,
) -> Result<bool, DbError> {
    v.get_bool().ok_or_else(|| decode_err(relation, column, v))
}

pub fn row_uuid(
    v: &DataValue,
    relation: &'static str,
    column: &'static str,
) -> Result<Uuid, DbError> {
    if let DataValue::Uuid(UuidWrapper(u)) = v {
        Ok(*u)
    } else {
        Err(decode_err(relation, column, v))
    }
}

pub fn row_opt_uuid(v: &DataValue) -> Option<Uuid> {
    if let DataValue::Uuid(UuidWrapper(u)) = v {
        Some(*u)
    } else {
        None
    }
}

pub fn row_str_list(v: &DataValue) -> Vec<String> {
    match v {
        DataValue::List(items) => items
            .iter()
            .filter_map(|i| i.get_str().map(|s| s.to_string()))
            .collect(),
        _ => Vec::new(),
    }
}

pub fn row_f32_list(v: &DataValue) -> Vec<f32> {
    match v {
        DataValue::List(items) => items
            .iter()
            .filter_map(|i| i.get_float().map(|f| f as f32))
            .collect(),
        _ => Vec::new(),
    }
}

pub fn row_json(v: &DataValue) -> serde_json::Value {
    match v {
        DataValue::Json(cozo::JsonData(j)) => j.clone(),
        _ => serde_json::Value::Null,
    }
}

// --- Timestamp conversion ---------------------------------------------------

/// Timestamps are persisted as epoch milliseconds (`Float`).
pub fn dt_to_ms(dt: DateTime<Utc>) -> f64 {
    dt.timestamp_millis() as f64
}

pub fn ms_to_dt(ms: f64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms as i64)
        .single()
        .unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_creates_schema() {
        let db = Database::init_with_schema().expect("init db");
        assert_eq!(db.count_relation("memories", "id").unwrap(), 0);
        assert_eq!(db.count_relation("code_nodes", "id").unwrap(), 0);
        assert_eq!(db.count_relation("vec_points", "id").unwrap(), 0);
    }

    #[test]
    fn timestamps_round_trip_at_ms_precision() {
        let now = Utc::now();
        let back = ms_to_dt(dt_to_ms(now));
        assert_eq!(now.timestamp_millis(), back.timestamp_millis());
    }

    #[test]
    fn zero_dim_rejected() {
        assert!(matches!(
            Database::init_with_dim(0),
            Err(DbError::InvalidArgument(_))
        ));
    }
}
