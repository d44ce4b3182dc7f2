//! ce-import library interface
//!
//! Scrapes composers, works and score files from public music catalogs and
//! writes them into the Contribution Environment (CE) over GraphQL.
//!
//! - [`sites`]: one adapter per catalog, fetch and parse into flat records
//! - [`models`]: the flat records
//! - [`loader`]: get-or-create by source and relation linking against the CE
//! - [`importers`]: pipelines joining the two

pub mod cache;
pub mod error;
pub mod graphql;
pub mod importers;
pub mod loader;
pub mod models;
pub mod sites;

pub use crate::error::{ImportError, ImportResult};
pub use crate::importers::{BatchSummary, Importer};
pub use crate::loader::Loader;
