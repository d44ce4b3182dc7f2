//! # CE Common Library
//!
//! Shared code for the Contribution Environment importers:
//! - Error types
//! - Configuration loading (TOML file + environment overrides)
//! - Tracing subscriber initialisation

pub mod config;
pub mod error;
pub mod logging;

pub use config::{ConfigSource, ImportConfig, SitesConfig};
pub use error::{Error, Result};
