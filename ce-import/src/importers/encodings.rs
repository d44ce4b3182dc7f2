//! Third-party score encodings attached to IMSLP works
//!
//! Input is a JSON list of rows:
//!
//! ```json
//! [{"imslp": "https://imslp.org/wiki/Special:ReverseLookup/52946",
//!   "mediaobject": {"source": "...", "contributor": "...", "encodingformat": "application/mei+xml"}}]
//! ```

use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use super::{BatchSummary, Importer};
use crate::error::ImportResult;
use crate::models::MediaObject;

pub const ENCODING_LICENSE: &str = "CC-BY 4.0";

#[derive(Debug, Clone, Deserialize)]
pub struct EncodingRow {
    /// `Special:ReverseLookup` URL of the IMSLP file the encoding was made from
    pub imslp: String,
    pub mediaobject: MediaObject,
}

pub async fn read_encoding_rows(path: &Path) -> ImportResult<Vec<EncodingRow>> {
    let data = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&data)?)
}

impl Importer {
    /// Import the IMSLP work of one row and attach the encoding to it
    pub async fn import_encoding(&self, row: &EncodingRow) -> ImportResult<String> {
        let composition_id = self
            .load_musiccomposition_from_imslp_by_file(&row.imslp)
            .await?;

        let mut encoding = row.mediaobject.clone();
        encoding.license = Some(ENCODING_LICENSE.to_string());
        let mo_id = self.loader.get_or_create_media_object(&encoding).await?;
        self.loader
            .link_media_object_example_of_work(&mo_id, &composition_id)
            .await?;
        Ok(mo_id)
    }

    pub async fn import_encodings(&self, rows: &[EncodingRow]) -> BatchSummary {
        let mut summary = BatchSummary::new(rows.len());
        for (i, row) in rows.iter().enumerate() {
            info!("Importing encoding {}/{} {}", i + 1, summary.total, row.mediaobject.source);
            match self.import_encoding(row).await {
                Ok(_) => summary.imported += 1,
                Err(e) => {
                    warn!("Failed to import encoding {}: {}", row.mediaobject.source, e);
                    summary.failed += 1;
                }
            }
        }
        info!("Encodings: {}", summary);
        summary
    }
}
