//! Common error types for the CE importers

use thiserror::Error;

/// Common result type for CE import operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the importer crates
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}
