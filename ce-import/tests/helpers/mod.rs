//! Test helper utilities
//!
//! `FakeCe` is an in-memory stand-in for the CE GraphQL endpoint. It
//! understands exactly the query and mutation shapes the loader emits.

use async_trait::async_trait;
use ce_import::graphql::Submitter;
use ce_import::ImportResult;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct StoredEntity {
    pub kind: String,
    pub identifier: String,
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Merge {
    pub mutation: String,
    pub from: String,
    pub to: String,
}

#[derive(Default)]
struct State {
    entities: Vec<StoredEntity>,
    merges: Vec<Merge>,
    submitted: Vec<String>,
}

pub struct FakeCe {
    state: Mutex<State>,
    by_source: Regex,
    by_identifier: Regex,
    create: Regex,
    update: Regex,
    merge: Regex,
    argument: Regex,
}

impl FakeCe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State::default()),
            by_source: Regex::new(r#"^query \{\s+(\w+)\(source: ("(?:[^"\\]|\\.)*")\)"#).unwrap(),
            by_identifier: Regex::new(r#"^query \{\s+(\w+)\(identifier: ("(?:[^"\\]|\\.)*")\) \{([^}]*)\}"#)
                .unwrap(),
            create: Regex::new(r"^mutation \{\s+Create(\w+)\(").unwrap(),
            update: Regex::new(r"^mutation \{\s+Update(\w+)\(").unwrap(),
            merge: Regex::new(
                r#"(Merge\w+)\(\s+from: \{identifier: ("(?:[^"\\]|\\.)*")\}\s+to: \{identifier: ("(?:[^"\\]|\\.)*")\}"#,
            )
            .unwrap(),
            argument: Regex::new(r"(?m)^    (\w+): (.+)$").unwrap(),
        })
    }

    /// Add an entity directly, as if created by an earlier run
    pub fn seed(&self, kind: &str, fields: Value) -> String {
        let identifier = uuid::Uuid::new_v4().to_string();
        let fields = fields.as_object().cloned().unwrap_or_default();
        self.state.lock().unwrap().entities.push(StoredEntity {
            kind: kind.to_string(),
            identifier: identifier.clone(),
            fields,
        });
        identifier
    }

    pub fn entities(&self, kind: &str) -> Vec<StoredEntity> {
        let state = self.state.lock().unwrap();
        state.entities.iter().filter(|e| e.kind == kind).cloned().collect()
    }

    pub fn entity(&self, identifier: &str) -> Option<StoredEntity> {
        let state = self.state.lock().unwrap();
        state.entities.iter().find(|e| e.identifier == identifier).cloned()
    }

    pub fn merges(&self, mutation: &str) -> Vec<Merge> {
        let state = self.state.lock().unwrap();
        state.merges.iter().filter(|m| m.mutation == mutation).cloned().collect()
    }

    pub fn submitted(&self) -> Vec<String> {
        self.state.lock().unwrap().submitted.clone()
    }

    fn arguments(&self, mutation: &str) -> Map<String, Value> {
        self.argument
            .captures_iter(mutation)
            .map(|c| {
                let raw = &c[2];
                // Enum values are bare words
                let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
                (c[1].to_string(), value)
            })
            .collect()
    }

    fn handle(&self, query: &str) -> Value {
        let mut state = self.state.lock().unwrap();
        state.submitted.push(query.to_string());

        if let Some(c) = self.by_source.captures(query) {
            let kind = c[1].to_string();
            let source: String = serde_json::from_str(&c[2]).unwrap();
            let results: Vec<Value> = state
                .entities
                .iter()
                .filter(|e| e.kind == kind && e.fields.get("source") == Some(&Value::String(source.clone())))
                .map(|e| json!({"identifier": e.identifier}))
                .collect();
            return json!({"data": {kind: results}});
        }

        if let Some(c) = self.by_identifier.captures(query) {
            let kind = c[1].to_string();
            let identifier: String = serde_json::from_str(&c[2]).unwrap();
            let requested: Vec<&str> = c[3].split_whitespace().collect();
            let results: Vec<Value> = state
                .entities
                .iter()
                .filter(|e| e.kind == kind && e.identifier == identifier)
                .map(|e| {
                    let mut out = Map::new();
                    for field in &requested {
                        let value = if *field == "identifier" {
                            Value::String(e.identifier.clone())
                        } else {
                            e.fields.get(*field).cloned().unwrap_or(Value::Null)
                        };
                        out.insert(field.to_string(), value);
                    }
                    Value::Object(out)
                })
                .collect();
            return json!({"data": {kind: results}});
        }

        if let Some(c) = self.create.captures(query) {
            let kind = c[1].to_string();
            let identifier = uuid::Uuid::new_v4().to_string();
            state.entities.push(StoredEntity {
                kind: kind.clone(),
                identifier: identifier.clone(),
                fields: self.arguments(query),
            });
            return json!({"data": {format!("Create{}", kind): {"identifier": identifier}}});
        }

        if let Some(c) = self.update.captures(query) {
            let kind = c[1].to_string();
            let mut args = self.arguments(query);
            let identifier = args
                .remove("identifier")
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            return match state.entities.iter_mut().find(|e| e.identifier == identifier) {
                Some(entity) => {
                    entity.fields.extend(args);
                    json!({"data": {format!("Update{}", kind): {"identifier": identifier}}})
                }
                None => json!({"data": {format!("Update{}", kind): null}}),
            };
        }

        if let Some(c) = self.merge.captures(query) {
            let merge = Merge {
                mutation: c[1].to_string(),
                from: serde_json::from_str(&c[2]).unwrap(),
                to: serde_json::from_str(&c[3]).unwrap(),
            };
            let response = json!({"data": {merge.mutation.clone(): {
                "from": {"identifier": merge.from},
                "to": {"identifier": merge.to}
            }}});
            state.merges.push(merge);
            return response;
        }

        json!({"errors": [{"message": format!("FakeCe cannot handle: {}", query)}]})
    }
}

#[async_trait]
impl Submitter for FakeCe {
    async fn submit(&self, query: &str) -> ImportResult<Value> {
        let response = self.handle(query);
        if let Some(errors) = response.get("errors") {
            return Err(ce_import::ImportError::GraphQl(errors.to_string()));
        }
        Ok(response)
    }
}
