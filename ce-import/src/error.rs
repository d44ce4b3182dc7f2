//! Error types for ce-import
//!
//! Site adapters and the loader return `ImportResult`. Batch importers log and
//! skip an item on error; single-item commands propagate it to `main`.

use thiserror::Error;

/// Importer error type
#[derive(Debug, Error)]
pub enum ImportError {
    /// Transport-level HTTP failure (after retries)
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status from an external site or the CE
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// Response body was not the JSON we expected
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The CE answered with a GraphQL `errors` array
    #[error("GraphQL error: {0}")]
    GraphQl(String),

    /// A CE response lacked a field the importer needs (e.g. `CreatePerson.identifier`)
    #[error("Response to {operation} is missing field '{field}'")]
    MissingField { operation: String, field: String },

    /// Page content could not be interpreted
    #[error("Parse error: {0}")]
    Parse(String),

    /// Bad argument (URL of the wrong kind, etc.)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP response cache failure
    #[error("Cache error: {0}")]
    Cache(#[from] sqlx::Error),

    /// Archive could not be read
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for importer operations
pub type ImportResult<T> = Result<T, ImportError>;
