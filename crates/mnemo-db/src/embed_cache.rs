//! Persistent embedding cache keyed by `(model, content_hash)`.

use std::collections::BTreeMap;

use cozo::ScriptMutability;

use crate::database::*;
use crate::error::DbError;

impl Database {
    pub fn get_cached_embedding(
        &self,
        model: &str,
        content_hash: &str,
    ) -> Result<Option<Vec<f32>>, DbError> {
        let script = r#"
?[embedding] := *embedding_cache{model, content_hash, embedding}, model = $model, content_hash = $hash
"#;
        let mut params = BTreeMap::new();
        params.insert("model".into(), dv_str(model));
        params.insert("hash".into(), dv_str(content_hash));
        let rows = self.run_script(script, params, ScriptMutability::Immutable)?;
        Ok(rows.rows.first().map(|r| row_f32_list(&r[0])))
    }

    pub fn put_cached_embedding(
        &self,
        model: &str,
        content_hash: &str,
        embedding: &[f32],
        now_ms: f64,
    ) -> Result<(), DbError> {
        let script = r#"
?[model, content_hash, embedding, created_at] <- [[$model, $hash, $embedding, $now]]
:put embedding_cache { model, content_hash => embedding, created_at }
"#;
        let mut params = BTreeMap::new();
        params.insert("model".into(), dv_str(model));
        params.insert("hash".into(), dv_str(content_hash));
        params.insert("embedding".into(), dv_f32_list(embedding));
        params.insert("now".into(), dv_f64(now_ms));
        self.run_script(script, params, ScriptMutability::Mutable)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_round_trip() {
        let db = Database::init_with_schema().unwrap();
        assert!(db.get_cached_embedding("m", "h").unwrap().is_none());
        db.put_cached_embedding("m", "h", &[0.25, -0.5], 0.0).unwrap();
        let got = db.get_cached_embedding("m", "h").unwrap().unwrap();
        assert_eq!(got, vec![0.25, -0.5]);
        // Same hash under a different model is a distinct key.
        assert!(db.get_cached_embedding("other", "h").unwrap().is_none());
    }
}
