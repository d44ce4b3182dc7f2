//! GraphQL plumbing for the Contribution Environment
//!
//! Queries and mutations are built as strings and submitted through a
//! [`Submitter`]. Responses come back as the raw `{"data": ...}` envelope.

pub mod connection;
pub mod mutations;
pub mod queries;

pub use connection::{HttpConnection, Submitter};

use crate::error::{ImportError, ImportResult};
use serde_json::Value;

/// A single GraphQL argument value
#[derive(Debug, Clone, PartialEq)]
pub enum GqlValue {
    /// Quoted and escaped string literal
    Str(String),
    /// Bare enum value (e.g. `language: en`)
    Enum(String),
    Int(i64),
}

impl GqlValue {
    pub fn render(&self) -> String {
        match self {
            // JSON string escaping is valid GraphQL string escaping
            GqlValue::Str(s) => Value::String(s.clone()).to_string(),
            GqlValue::Enum(e) => e.clone(),
            GqlValue::Int(i) => i.to_string(),
        }
    }
}

/// Ordered argument list for a create/update mutation
///
/// Unset (`None`) values are skipped so the mutation only carries fields the
/// record actually has.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationArgs {
    args: Vec<(String, GqlValue)>,
}

impl MutationArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn str(mut self, key: &str, value: Option<&str>) -> Self {
        if let Some(v) = value {
            self.args.push((key.to_string(), GqlValue::Str(v.to_string())));
        }
        self
    }

    pub fn enumeration(mut self, key: &str, value: Option<&str>) -> Self {
        if let Some(v) = value {
            self.args.push((key.to_string(), GqlValue::Enum(v.to_string())));
        }
        self
    }

    pub fn int(mut self, key: &str, value: Option<i64>) -> Self {
        if let Some(v) = value {
            self.args.push((key.to_string(), GqlValue::Int(v)));
        }
        self
    }

    /// Set or replace a string argument
    pub fn set_str(&mut self, key: &str, value: &str) {
        let value = GqlValue::Str(value.to_string());
        match self.args.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.args.push((key.to_string(), value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&GqlValue> {
        self.args.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.args.iter().map(|(k, _)| k.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// One `key: value` line per argument, indented for a mutation body
    pub fn render(&self, indent: &str) -> String {
        self.args
            .iter()
            .map(|(k, v)| format!("{}{}: {}", indent, k, v.render()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// `data.<operation>` from a response envelope
pub fn data_field<'a>(response: &'a Value, operation: &str) -> Option<&'a Value> {
    response.get("data").and_then(|d| d.get(operation))
}

/// `data.<operation>.identifier` from a create/update response
pub fn identifier_of(response: &Value, operation: &str) -> ImportResult<String> {
    data_field(response, operation)
        .and_then(|v| v.get("identifier"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ImportError::MissingField {
            operation: operation.to_string(),
            field: "identifier".to_string(),
        })
}
