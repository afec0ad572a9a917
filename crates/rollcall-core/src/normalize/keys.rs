//! Key casing normalization.
//!
//! Submissions arrive with a mix of snake_case and legacy camelCase keys.
//! Everything is rewritten to snake_case except the contents of data maps,
//! whose keys are ministry codes, ids or question ids rather than field names.
//! Older field names (`dob`, `mobile_phone`, ...) are then folded into their
//! current names section by section.

use serde_json::{Map, Value};

use crate::utils::camel_to_snake;

/// Maps whose keys are data and must be kept verbatim
pub const DATA_MAP_KEYS: &[&str] = &["ministry_selections", "interest_selections", "custom_data"];

/// Rewrite object keys to snake_case, recursively.
///
/// When a legacy key and its snake_case form are both present the snake_case
/// value wins regardless of order.
pub fn normalize_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, value) in map {
                let snake = camel_to_snake(&key);
                let value = if DATA_MAP_KEYS.contains(&snake.as_str()) {
                    value
                } else {
                    normalize_keys(value)
                };
                if snake == key {
                    out.insert(snake, value);
                } else {
                    out.entry(snake).or_insert(value);
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_keys).collect()),
        other => other,
    }
}

const HOUSEHOLD_ALIASES: &[(&str, &str)] = &[
    ("id", "household_id"),
    ("address", "address_line1"),
    ("zip_code", "zip"),
    ("email", "primary_email"),
    ("phone", "primary_phone"),
];

const PERSON_ALIASES: &[(&str, &str)] = &[("mobile_phone", "phone")];

const CHILD_ALIASES: &[(&str, &str)] = &[
    ("id", "child_id"),
    ("dob", "date_of_birth"),
    ("birth_date", "date_of_birth"),
];

/// Fold older field names of a snake_cased submission into the current ones.
///
/// The current name wins when both are present; among aliases the first one
/// listed wins. Alias keys never survive.
pub fn fold_aliases(value: Value) -> Value {
    let Value::Object(mut root) = value else {
        return value;
    };
    if let Some(Value::Object(household)) = root.get_mut("household") {
        fold(household, HOUSEHOLD_ALIASES);
    }
    if let Some(Value::Object(contact)) = root.get_mut("emergency_contact") {
        fold(contact, PERSON_ALIASES);
    }
    for (section, aliases) in [("guardians", PERSON_ALIASES), ("children", CHILD_ALIASES)] {
        if let Some(Value::Array(items)) = root.get_mut(section) {
            for item in items.iter_mut() {
                if let Value::Object(map) = item {
                    fold(map, aliases);
                }
            }
        }
    }
    Value::Object(root)
}

fn fold(map: &mut Map<String, Value>, aliases: &[(&str, &str)]) {
    for (alias, canonical) in aliases {
        if let Some(value) = map.remove(*alias) {
            map.entry(canonical.to_string()).or_insert(value);
        }
    }
}

/// Whether any object key anywhere outside a data map still contains an uppercase letter
pub fn has_legacy_keys(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.iter().any(|(key, value)| {
            key.chars().any(|c| c.is_ascii_uppercase())
                || (!DATA_MAP_KEYS.contains(&key.as_str()) && has_legacy_keys(value))
        }),
        Value::Array(items) => items.iter().any(has_legacy_keys),
        _ => false,
    }
}
