//! JSON text columns for nested fields.
//!
//! Consents, custom fields, custom questions and time slots are written as
//! JSON text. Older rows may hold native JSON instead; both read the same.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::error::{Result, StorageError};
use crate::storage::EntityKind;

/// Serialize a nested field to the JSON text stored in its column
pub fn encode_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Parse a nested field stored as JSON text or native JSON. Null, absent and
/// empty text read as the default value.
pub fn decode_json<T>(entity: EntityKind, column: &str, raw: Option<Value>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let parsed = match raw {
        None | Some(Value::Null) => return Ok(T::default()),
        Some(Value::String(text)) if text.trim().is_empty() => return Ok(T::default()),
        Some(Value::String(text)) => serde_json::from_str(&text),
        Some(native) => serde_json::from_value(native),
    };
    parsed.map_err(|e| StorageError::invalid_data(entity, format!("column {}: {}", column, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Consent;
    use serde_json::json;

    #[test]
    fn test_decode_json_text_or_native() {
        let text = Some(json!(r#"[{"type":"liability","accepted_at":null}]"#));
        let native = Some(json!([{"type": "liability", "accepted_at": null}]));
        let a: Vec<Consent> = decode_json(EntityKind::Registration, "consents", text).unwrap();
        let b: Vec<Consent> = decode_json(EntityKind::Registration, "consents", native).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 1);

        let empty: Vec<Consent> =
            decode_json(EntityKind::Registration, "consents", Some(json!(""))).unwrap();
        assert!(empty.is_empty());

        let bad: Result<Vec<Consent>> =
            decode_json(EntityKind::Registration, "consents", Some(json!("{not json")));
        assert!(matches!(bad, Err(StorageError::InvalidData { .. })));
    }

    #[test]
    fn test_encode_json_is_text() {
        let encoded = encode_json(&vec!["a", "b"]).unwrap();
        assert_eq!(encoded, r#"["a","b"]"#);
    }
}
