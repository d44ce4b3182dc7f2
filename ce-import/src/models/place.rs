//! Place record (birth and death places of a Person)

use serde::{Deserialize, Serialize};

use super::{Entity, EntityKind, FORMAT_HTML, LANGUAGE_EN};
use crate::graphql::MutationArgs;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub source: String,
    pub title: Option<String>,
    pub name: Option<String>,
    pub contributor: Option<String>,
    #[serde(alias = "format_")]
    pub format: Option<String>,
    pub language: Option<String>,
}

impl Place {
    /// Page-backed place with the default html format and English language
    pub fn new(source: impl Into<String>, contributor: &str) -> Self {
        Self {
            source: source.into(),
            contributor: Some(contributor.to_string()),
            format: Some(FORMAT_HTML.to_string()),
            language: Some(LANGUAGE_EN.to_string()),
            ..Default::default()
        }
    }
}

impl Entity for Place {
    const KIND: EntityKind = EntityKind::Place;

    fn source(&self) -> &str {
        &self.source
    }

    fn to_args(&self) -> MutationArgs {
        MutationArgs::new()
            .str("title", self.title.as_deref())
            .str("name", self.name.as_deref())
            .str("contributor", self.contributor.as_deref())
            .str("source", Some(self.source.as_str()))
            .str("format", self.format.as_deref())
            .enumeration("language", self.language.as_deref())
    }
}
