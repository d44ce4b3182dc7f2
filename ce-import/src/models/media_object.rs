//! MediaObject record (a score file: MusicXML, PDF, archive, MEI)

use serde::{Deserialize, Serialize};

use super::{Entity, EntityKind, FORMAT_HTML, MIME_MUSICXML, MIME_MUSICXML_COMPRESSED, MIME_PDF, MIME_ZIP};
use crate::graphql::MutationArgs;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaObject {
    /// Web page about the file
    pub source: String,
    pub title: Option<String>,
    /// File name
    pub name: Option<String>,
    pub description: Option<String>,
    pub contributor: Option<String>,
    pub url: Option<String>,
    /// Location of the file itself
    #[serde(alias = "contenturl")]
    pub content_url: Option<String>,
    /// Mimetype of the file itself
    #[serde(alias = "encodingformat")]
    pub encoding_format: Option<String>,
    /// Mimetype of the source page
    #[serde(alias = "format_")]
    pub format: Option<String>,
    pub language: Option<String>,
    pub license: Option<String>,
}

impl MediaObject {
    pub fn new(source: impl Into<String>, contributor: &str) -> Self {
        Self {
            source: source.into(),
            contributor: Some(contributor.to_string()),
            format: Some(FORMAT_HTML.to_string()),
            ..Default::default()
        }
    }

    pub fn is_pdf(&self) -> bool {
        self.encoding_format.as_deref() == Some(MIME_PDF)
    }
}

/// Mimetype for a score file name, by extension
pub fn encoding_format_for(file_name: &str) -> Option<&'static str> {
    let lower = file_name.to_lowercase();
    if lower.ends_with(".xml") || lower.ends_with(".musicxml") {
        Some(MIME_MUSICXML)
    } else if lower.ends_with(".mxl") {
        Some(MIME_MUSICXML_COMPRESSED)
    } else if lower.ends_with(".pdf") {
        Some(MIME_PDF)
    } else if lower.ends_with(".zip") {
        Some(MIME_ZIP)
    } else {
        None
    }
}

impl Entity for MediaObject {
    const KIND: EntityKind = EntityKind::MediaObject;

    fn source(&self) -> &str {
        &self.source
    }

    fn to_args(&self) -> MutationArgs {
        MutationArgs::new()
            .str("title", self.title.as_deref())
            .str("name", self.name.as_deref())
            .str("description", self.description.as_deref())
            .str("contributor", self.contributor.as_deref())
            .str("source", Some(self.source.as_str()))
            .str("url", self.url.as_deref())
            .str("contentUrl", self.content_url.as_deref())
            .str("encodingFormat", self.encoding_format.as_deref())
            .str("format", self.format.as_deref())
            .enumeration("language", self.language.as_deref())
            .str("license", self.license.as_deref())
    }
}
