//! One named collection of canonical JSON documents plus its indexes.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::trace;

use crate::storage::query::ListQuery;
use crate::storage::EntityKind;

/// JSON type of an index key. Historical rows may store the same logical key
/// as a number in one document and a string in another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum KeyType {
    Bool,
    Number,
    String,
}

/// Typed key of a single-field index.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum IndexKey {
    Null,
    Bool(bool),
    Number(String),
    String(String),
}

impl IndexKey {
    /// Scalars only; arrays and objects are not indexed
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(IndexKey::Null),
            Value::Bool(b) => Some(IndexKey::Bool(*b)),
            Value::Number(n) => Some(IndexKey::Number(n.to_string())),
            Value::String(s) => Some(IndexKey::String(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    fn key_type(&self) -> Option<KeyType> {
        match self {
            IndexKey::Null => None,
            IndexKey::Bool(_) => Some(KeyType::Bool),
            IndexKey::Number(_) => Some(KeyType::Number),
            IndexKey::String(_) => Some(KeyType::String),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct FieldIndex {
    entries: BTreeMap<IndexKey, BTreeSet<String>>,
    type_counts: BTreeMap<KeyType, usize>,
}

impl FieldIndex {
    fn add(&mut self, key: IndexKey, id: &str) {
        if let Some(t) = key.key_type() {
            *self.type_counts.entry(t).or_default() += 1;
        }
        self.entries.entry(key).or_default().insert(id.to_string());
    }

    fn remove(&mut self, key: &IndexKey, id: &str) {
        let Some(ids) = self.entries.get_mut(key) else {
            return;
        };
        if ids.remove(id) {
            if let Some(t) = key.key_type() {
                if let Some(count) = self.type_counts.get_mut(&t) {
                    *count -= 1;
                    if *count == 0 {
                        self.type_counts.remove(&t);
                    }
                }
            }
        }
        if ids.is_empty() {
            self.entries.remove(key);
        }
    }

    /// Ids whose key equals `value`, or `None` when the index cannot answer
    /// exactly: a null probe, or stored keys whose types are mixed or differ
    /// from the probe's type. The caller then scans.
    fn lookup(&self, value: &Value) -> Option<Vec<String>> {
        let key = IndexKey::from_value(value)?;
        let probe_type = key.key_type()?;
        let mut types = self.type_counts.keys();
        match (types.next(), types.next()) {
            (None, _) => Some(Vec::new()),
            (Some(stored), None) if *stored == probe_type => Some(
                self.entries
                    .get(&key)
                    .map(|ids| ids.iter().cloned().collect())
                    .unwrap_or_default(),
            ),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Collection {
    kind: EntityKind,
    docs: BTreeMap<String, Value>,
    indexes: BTreeMap<&'static str, FieldIndex>,
}

impl Collection {
    pub fn new(kind: EntityKind) -> Self {
        let indexes = kind
            .schema()
            .indexes
            .iter()
            .map(|field| (*field, FieldIndex::default()))
            .collect();
        Self {
            kind,
            docs: BTreeMap::new(),
            indexes,
        }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.docs.get(id)
    }

    pub fn documents(&self) -> impl Iterator<Item = &Value> {
        self.docs.values()
    }

    /// Insert or replace a document, keeping indexes current
    pub fn insert(&mut self, id: String, doc: Value) {
        self.unindex(&id);
        for (field, index) in self.indexes.iter_mut() {
            if let Some(key) = IndexKey::from_value(doc.get(*field).unwrap_or(&Value::Null)) {
                index.add(key, &id);
            }
        }
        self.docs.insert(id, doc);
    }

    pub fn remove(&mut self, id: &str) -> Option<Value> {
        self.unindex(id);
        self.docs.remove(id)
    }

    fn unindex(&mut self, id: &str) {
        let Some(old) = self.docs.get(id) else {
            return;
        };
        for (field, index) in self.indexes.iter_mut() {
            if let Some(key) = IndexKey::from_value(old.get(*field).unwrap_or(&Value::Null)) {
                index.remove(&key, id);
            }
        }
    }

    /// Candidate ids for a query before the per-document predicate runs.
    ///
    /// Filters covering a declared compound index always scan: the predicate
    /// compares string-coerced values, which a typed compound key lookup cannot
    /// do when historical rows mix number, string and bool for one key.
    fn candidates(&self, query: &ListQuery) -> Option<Vec<String>> {
        if let Some(fields) = query.covered_compound_index(self.kind) {
            trace!(collection = self.kind.collection(), ?fields, "Compound filter, scanning");
            return None;
        }
        query.filters.iter().find_map(|(field, value)| {
            self.indexes
                .get(field.as_str())
                .and_then(|index| index.lookup(value))
        })
    }

    /// Matching documents ordered by (created_at, id)
    pub fn select(&self, query: &ListQuery) -> Vec<Value> {
        let mut matched: Vec<&Value> = match self.candidates(query) {
            Some(ids) => ids.iter().filter_map(|id| self.docs.get(id)).collect(),
            None => self.docs.values().collect(),
        };
        matched.retain(|doc| query.matches(self.kind, doc));
        matched.sort_by_cached_key(|doc| (created_at(doc), id_of(doc)));
        matched.into_iter().cloned().collect()
    }
}

fn created_at(doc: &Value) -> Option<DateTime<Utc>> {
    doc.get("created_at")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn id_of(doc: &Value) -> String {
    doc.get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, ministry_id: Value, cycle_id: Value, created: &str) -> Value {
        json!({
            "id": id,
            "child_id": format!("child-{}", id),
            "ministry_id": ministry_id,
            "cycle_id": cycle_id,
            "status": "enrolled",
            "custom_fields": {},
            "created_at": created,
            "updated_at": created,
        })
    }

    #[test]
    fn test_single_index_lookup_typed() {
        let mut c = Collection::new(EntityKind::MinistryEnrollment);
        c.insert("a".into(), doc("a", json!("m1"), json!("2025"), "2025-01-01T00:00:00Z"));
        c.insert("b".into(), doc("b", json!("m2"), json!("2025"), "2025-01-02T00:00:00Z"));

        let q = ListQuery::new().eq("ministry_id", "m1");
        assert_eq!(c.candidates(&q), Some(vec!["a".to_string()]));
        let ids: Vec<String> = c.select(&q).iter().map(id_of).collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn test_mixed_key_types_fall_back_to_scan() {
        let mut c = Collection::new(EntityKind::MinistryEnrollment);
        c.insert("a".into(), doc("a", json!("m1"), json!(2025), "2025-01-01T00:00:00Z"));
        c.insert("b".into(), doc("b", json!("m1"), json!("2025"), "2025-01-02T00:00:00Z"));

        let q = ListQuery::new().eq("cycle_id", "2025");
        assert_eq!(c.candidates(&q), None);
        assert_eq!(c.select(&q).len(), 2);
    }

    #[test]
    fn test_compound_filter_scans_with_coercion() {
        let mut c = Collection::new(EntityKind::MinistryEnrollment);
        c.insert("a".into(), doc("a", json!(7), json!(2025), "2025-01-01T00:00:00Z"));
        c.insert("b".into(), doc("b", json!("7"), json!("2025"), "2025-01-02T00:00:00Z"));
        c.insert("c".into(), doc("c", json!("8"), json!("2025"), "2025-01-03T00:00:00Z"));

        let q = ListQuery::new().eq("ministry_id", "7").eq("cycle_id", 2025);
        assert_eq!(c.candidates(&q), None);
        let ids: Vec<String> = c.select(&q).iter().map(id_of).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_replace_and_remove_keep_index_current() {
        let mut c = Collection::new(EntityKind::MinistryEnrollment);
        c.insert("a".into(), doc("a", json!("m1"), json!("2025"), "2025-01-01T00:00:00Z"));
        c.insert("a".into(), doc("a", json!("m2"), json!("2025"), "2025-01-01T00:00:00Z"));
        assert_eq!(c.candidates(&ListQuery::new().eq("ministry_id", "m1")), Some(vec![]));
        assert_eq!(
            c.candidates(&ListQuery::new().eq("ministry_id", "m2")),
            Some(vec!["a".to_string()])
        );

        assert!(c.remove("a").is_some());
        assert_eq!(c.len(), 0);
        assert_eq!(c.candidates(&ListQuery::new().eq("ministry_id", "m2")), Some(vec![]));
    }

    #[test]
    fn test_select_orders_by_created_at() {
        let mut c = Collection::new(EntityKind::MinistryEnrollment);
        c.insert("z".into(), doc("z", json!("m1"), json!("c"), "2025-01-01T00:00:00Z"));
        c.insert("a".into(), doc("a", json!("m1"), json!("c"), "2025-01-01T00:00:00.500Z"));
        let ids: Vec<String> = c.select(&ListQuery::new()).iter().map(id_of).collect();
        assert_eq!(ids, vec!["z", "a"]);
    }
}
