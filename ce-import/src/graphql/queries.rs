//! Read queries against the CE

use crate::models::EntityKind;
use serde_json::Value;

use super::GqlValue;

/// `query { <Type>(source: "...") { identifier } }`
pub fn query_by_source(kind: EntityKind, source: &str) -> String {
    format!(
        "query {{\n  {}(source: {}) {{\n    identifier\n  }}\n}}",
        kind.type_name(),
        GqlValue::Str(source.to_string()).render()
    )
}

/// Look up a MediaObject by identifier, returning the requested fields
pub fn query_media_object(identifier: &str, fields: &[&str]) -> String {
    format!(
        "query {{\n  MediaObject(identifier: {}) {{\n    identifier\n{}\n  }}\n}}",
        GqlValue::Str(identifier.to_string()).render(),
        fields
            .iter()
            .map(|f| format!("    {}", f))
            .collect::<Vec<_>>()
            .join("\n")
    )
}

/// First element of `data.<Type>` in a query response
///
/// The store is expected to hold at most one entity per source, so only the
/// first result is looked at.
pub fn first_result<'a>(response: &'a Value, kind: EntityKind) -> Option<&'a Value> {
    response
        .get("data")
        .and_then(|d| d.get(kind.type_name()))
        .and_then(Value::as_array)
        .and_then(|results| results.first())
}
