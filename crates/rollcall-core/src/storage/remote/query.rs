//! Translation of a `ListQuery` into PostgREST query parameters.

use crate::error::Result;
use crate::storage::query::{coerce_to_string, ListQuery};

use super::mappers::RemoteRecord;

/// Characters with meaning inside PostgREST `or=(...)` groups
const RESERVED: &[char] = &[',', '.', ':', '(', ')', '"', '\\', ' '];

/// Quote a value for use inside a logical group
fn quote(value: &str) -> String {
    if value.contains(RESERVED) {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

/// Strip characters that would change the shape of an `ilike` pattern or group
fn sanitize_search(term: &str) -> String {
    term.chars()
        .filter(|c| !matches!(c, '*' | '%' | ',' | '(' | ')' | '"' | '\\'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Parameters for a filtered, ordered, paged select on `E`'s table
pub(crate) fn list_params<E: RemoteRecord>(query: &ListQuery) -> Result<Vec<(String, String)>> {
    query.validate(E::KIND)?;

    let mut params = vec![("select".to_string(), "*".to_string())];
    let mut groups: Vec<String> = Vec::new();

    for (field, value) in &query.filters {
        let column = E::column(field);
        match coerce_to_string(value) {
            None => params.push((column.to_string(), "is.null".to_string())),
            Some(text) => match E::legacy_column(column) {
                Some(legacy) => groups.push(format!(
                    "or({}.eq.{},{}.eq.{})",
                    column,
                    quote(&text),
                    legacy,
                    quote(&text)
                )),
                None => params.push((column.to_string(), format!("eq.{}", text))),
            },
        }
    }

    if let Some(term) = query.search.as_deref().map(sanitize_search) {
        let searchable = E::KIND.schema().searchable;
        if !term.is_empty() && !searchable.is_empty() {
            let pattern = quote(&format!("*{}*", term));
            let clauses: Vec<String> = searchable
                .iter()
                .map(|field| format!("{}.ilike.{}", E::column(field), pattern))
                .collect();
            groups.push(format!("or({})", clauses.join(",")));
        }
    }

    match groups.as_slice() {
        [] => {}
        // A lone `or(...)` group goes in the `or` parameter without its prefix
        [only] => params.push((
            "or".to_string(),
            only.strip_prefix("or").unwrap_or(only).to_string(),
        )),
        many => params.push(("and".to_string(), format!("({})", many.join(",")))),
    }

    params.push((
        "order".to_string(),
        format!("created_at.asc,{}.asc", E::PRIMARY_KEY),
    ));
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    if query.offset > 0 {
        params.push(("offset".to_string(), query.offset.to_string()));
    }
    Ok(params)
}

/// Parameters selecting one row by primary key
pub(crate) fn key_params<E: RemoteRecord>(id: &str) -> Vec<(String, String)> {
    vec![(E::PRIMARY_KEY.to_string(), format!("eq.{}", id))]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::models::{Child, Enrollment, Guardian, Household};

    fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_plain_filters_use_columns() {
        let q = ListQuery::new().eq("household_id", "h1").eq("phone", "5551234567");
        let params = list_params::<Guardian>(&q).unwrap();
        assert_eq!(param(&params, "household_id"), Some("eq.h1"));
        assert_eq!(param(&params, "mobile_phone"), Some("eq.5551234567"));
        assert_eq!(param(&params, "order"), Some("created_at.asc,guardian_id.asc"));
        assert_eq!(param(&params, "select"), Some("*"));
    }

    #[test]
    fn test_legacy_filter_matches_either_column() {
        let q = ListQuery::new().eq("competition_cycle_id", 2025);
        let params = list_params::<Enrollment>(&q).unwrap();
        assert_eq!(
            param(&params, "or"),
            Some("(bible_bee_cycle_id.eq.2025,year_id.eq.2025)")
        );
        assert_eq!(param(&params, "bible_bee_cycle_id"), None);
    }

    #[test]
    fn test_legacy_filter_and_search_combine() {
        let q = ListQuery::new()
            .eq("preferred_scripture_translation", "NIV")
            .search("Love, lace");
        let params = list_params::<Household>(&q).unwrap();
        let and = param(&params, "and").unwrap();
        assert!(and.starts_with("(or(preferred_scripture_translation.eq.NIV,preferredScriptureTranslation.eq.NIV),or("));
        assert!(and.contains("name.ilike.\"*Love lace*\""));
        assert!(and.contains("email.ilike."));
        assert_eq!(param(&params, "or"), None);
    }

    #[test]
    fn test_null_filter_and_paging() {
        let q = ListQuery::new()
            .eq("grade", serde_json::Value::Null)
            .limit(10)
            .offset(20);
        let params = list_params::<Child>(&q).unwrap();
        assert_eq!(param(&params, "grade"), Some("is.null"));
        assert_eq!(param(&params, "limit"), Some("10"));
        assert_eq!(param(&params, "offset"), Some("20"));
    }

    #[test]
    fn test_rejects_unknown_field() {
        let q = ListQuery::new().eq("dob", "2015-01-01");
        assert!(matches!(
            list_params::<Child>(&q),
            Err(StorageError::InvalidFilter { .. })
        ));
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("abc"), "abc");
        assert_eq!(quote("a,b"), "\"a,b\"");
        assert_eq!(quote("say \"hi\""), "\"say \\\"hi\\\"\"");
    }
}
