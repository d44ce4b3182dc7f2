//! Import pipelines
//!
//! Each pipeline reads from one or more site adapters and writes through the
//! [`Loader`]. Pipelines are linear and not restartable; re-running one picks
//! up through get-or-create. Batch pipelines log a failed item and move on,
//! single-item pipelines return the error.

pub mod artist;
pub mod cpdl;
pub mod encodings;
pub mod imslp_zip;
pub mod work;

use std::fmt;

use crate::loader::Loader;
use crate::sites::Sites;

/// Site clients plus the CE writer
pub struct Importer {
    pub loader: Loader,
    pub sites: Sites,
}

impl Importer {
    pub fn new(loader: Loader, sites: Sites) -> Self {
        Self { loader, sites }
    }
}

/// Outcome counts of a batch pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub imported: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} items: {} imported, {} skipped, {} failed",
            self.total, self.imported, self.skipped, self.failed
        )
    }
}
