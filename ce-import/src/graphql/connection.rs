//! CE connection
//!
//! POSTs `{"query": "..."}` to the configured endpoint and returns the parsed
//! JSON envelope. Authentication is an opaque bearer token from configuration.

use async_trait::async_trait;
use ce_common::config::ServerConfig;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ImportError, ImportResult};

const USER_AGENT: &str = concat!("ce-import/", env!("CARGO_PKG_VERSION"));
/// Retries on connection-level errors only
const MAX_CONNECT_RETRIES: u32 = 5;

/// Anything that can run a query or mutation string against the CE
#[async_trait]
pub trait Submitter: Send + Sync {
    /// Submit a query/mutation and return the response envelope
    async fn submit(&self, query: &str) -> ImportResult<Value>;
}

/// reqwest-backed CE connection
pub struct HttpConnection {
    http_client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpConnection {
    pub fn new(server: &ServerConfig) -> ImportResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http_client,
            endpoint: server.url.clone(),
            token: server.token.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, body: &Value) -> ImportResult<reqwest::Response> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut request = self.http_client.post(&self.endpoint).json(body);
            if let Some(token) = &self.token {
                request = request.bearer_auth(token);
            }

            match request.send().await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_connect() && attempt <= MAX_CONNECT_RETRIES => {
                    warn!(attempt, endpoint = %self.endpoint, "CE connection failed, retrying: {}", e);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[async_trait]
impl Submitter for HttpConnection {
    async fn submit(&self, query: &str) -> ImportResult<Value> {
        debug!(endpoint = %self.endpoint, "Submitting query:\n{}", query);

        let response = self.post(&json!({ "query": query })).await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            // The server usually explains itself in a GraphQL errors array
            if let Ok(body) = serde_json::from_str::<Value>(&text) {
                if let Some(message) = graphql_errors(&body) {
                    return Err(ImportError::GraphQl(message));
                }
            }
            return Err(ImportError::Status {
                url: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }

        let body: Value = serde_json::from_str(&text)?;
        if let Some(message) = graphql_errors(&body) {
            return Err(ImportError::GraphQl(message));
        }

        Ok(body)
    }
}

/// Joined messages of a non-empty `errors` array
fn graphql_errors(body: &Value) -> Option<String> {
    let errors = body.get("errors")?.as_array()?;
    if errors.is_empty() {
        return None;
    }
    Some(
        errors
            .iter()
            .map(|e| {
                e.get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| e.to_string())
            })
            .collect::<Vec<_>>()
            .join("; "),
    )
}
