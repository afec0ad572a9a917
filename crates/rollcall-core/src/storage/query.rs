//! List filters.
//!
//! A `ListQuery` is a fixed shape: equality filters on a per-entity allowlist
//! of fields, an optional case-insensitive free-text search over the entity's
//! searchable fields, and limit/offset paging. It is not a query language.

use serde_json::Value;

use crate::error::{Result, StorageError};
use crate::storage::EntityKind;
use crate::utils::contains_ignore_case;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub filters: Vec<(String, Value)>,
    pub search: Option<String>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field` to equal `value`
    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push((field.to_string(), value.into()));
        self
    }

    pub fn search(mut self, text: &str) -> Self {
        let trimmed = text.trim();
        self.search = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Reject filters on fields the entity does not expose
    pub fn validate(&self, kind: EntityKind) -> Result<()> {
        let schema = kind.schema();
        for (field, _) in &self.filters {
            if field != "id" && !schema.filterable.contains(&field.as_str()) {
                return Err(StorageError::InvalidFilter {
                    entity: kind,
                    field: field.clone(),
                });
            }
        }
        Ok(())
    }

    /// The first declared compound index fully covered by this query's filters
    pub fn covered_compound_index(&self, kind: EntityKind) -> Option<&'static [&'static str]> {
        kind.schema()
            .compound_indexes
            .iter()
            .copied()
            .find(|fields| {
                fields
                    .iter()
                    .all(|f| self.filters.iter().any(|(name, _)| name == f))
            })
    }

    /// Whether a canonical document passes every equality filter and the search
    pub fn matches(&self, kind: EntityKind, doc: &Value) -> bool {
        self.filters
            .iter()
            .all(|(field, expected)| loose_eq(doc.get(field).unwrap_or(&Value::Null), expected))
            && self.matches_search(kind, doc)
    }

    fn matches_search(&self, kind: EntityKind, doc: &Value) -> bool {
        let Some(ref term) = self.search else {
            return true;
        };
        kind.schema().searchable.iter().any(|field| {
            doc.get(*field)
                .and_then(coerce_to_string)
                .map(|text| contains_ignore_case(&text, term))
                .unwrap_or(false)
        })
    }

    /// Apply offset and limit to an already ordered result set
    pub fn paginate<T>(&self, items: Vec<T>) -> Vec<T> {
        let iter = items.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        }
    }
}

/// String form of a scalar JSON value. `None` for null.
pub fn coerce_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Equality after coercing both sides to string, so `5`, `"5"` match and
/// `true`, `"true"` match. Historical rows mix these for the same key.
pub fn loose_eq(left: &Value, right: &Value) -> bool {
    coerce_to_string(left) == coerce_to_string(right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_loose_eq_coerces_mixed_types() {
        assert!(loose_eq(&json!(5), &json!("5")));
        assert!(loose_eq(&json!(true), &json!("true")));
        assert!(loose_eq(&json!("abc"), &json!("abc")));
        assert!(loose_eq(&Value::Null, &Value::Null));
        assert!(!loose_eq(&json!(5), &json!(6)));
        assert!(!loose_eq(&json!(false), &Value::Null));
    }

    #[test]
    fn test_validate_rejects_unknown_field() {
        let ok = ListQuery::new().eq("household_id", "h1").eq("is_active", true);
        assert!(ok.validate(EntityKind::Child).is_ok());

        let bad = ListQuery::new().eq("allergies", "peanuts");
        assert!(matches!(
            bad.validate(EntityKind::Child),
            Err(StorageError::InvalidFilter { ref field, .. }) if field == "allergies"
        ));
    }

    #[test]
    fn test_covered_compound_index() {
        let q = ListQuery::new().eq("cycle_id", "c1").eq("ministry_id", "m1");
        assert_eq!(
            q.covered_compound_index(EntityKind::MinistryEnrollment),
            Some(&["ministry_id", "cycle_id"][..])
        );
        let single = ListQuery::new().eq("cycle_id", "c1");
        assert_eq!(single.covered_compound_index(EntityKind::MinistryEnrollment), None);
    }

    #[test]
    fn test_matches_search_case_insensitive() {
        let doc = json!({"first_name": "Ada", "last_name": "Lovelace", "is_active": true});
        assert!(ListQuery::new().search("love").matches(EntityKind::Child, &doc));
        assert!(!ListQuery::new().search("babbage").matches(EntityKind::Child, &doc));
        assert!(ListQuery::new().eq("is_active", "true").matches(EntityKind::Child, &doc));
    }

    #[test]
    fn test_paginate() {
        let q = ListQuery::new().offset(1).limit(2);
        assert_eq!(q.paginate(vec![1, 2, 3, 4]), vec![2, 3]);
        assert_eq!(ListQuery::new().offset(3).paginate(vec![1, 2, 3, 4]), vec![4]);
    }
}
