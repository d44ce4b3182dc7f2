//! Flat schema.org-style records produced by the site adapters
//!
//! Every record carries a `source`: the canonical URL of the page it was
//! scraped from, used as the de-duplication key in the CE.

pub mod composition;
pub mod media_object;
pub mod person;
pub mod place;

pub use composition::MusicComposition;
pub use media_object::MediaObject;
pub use person::Person;
pub use place::Place;

use crate::graphql::MutationArgs;

/// Mimetype of every scraped source page
pub const FORMAT_HTML: &str = "text/html";
pub const LANGUAGE_EN: &str = "en";

pub const MIME_MUSICXML: &str = "application/vnd.recordare.musicxml+xml";
pub const MIME_MUSICXML_COMPRESSED: &str = "application/vnd.recordare.musicxml";
pub const MIME_PDF: &str = "application/pdf";
pub const MIME_ZIP: &str = "application/zip";

/// CE node types this importer writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Person,
    Place,
    MusicComposition,
    MediaObject,
}

impl EntityKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            EntityKind::Person => "Person",
            EntityKind::Place => "Place",
            EntityKind::MusicComposition => "MusicComposition",
            EntityKind::MediaObject => "MediaObject",
        }
    }
}

/// A record that can be created in the CE
pub trait Entity {
    const KIND: EntityKind;

    fn source(&self) -> &str;

    /// Arguments of the create mutation, without `creator`
    fn to_args(&self) -> MutationArgs;
}

/// Keep the first record for each distinct non-empty source, preserving order
pub fn dedup_by_source<E: Entity>(records: Vec<E>) -> Vec<E> {
    let mut seen = std::collections::HashSet::new();
    records
        .into_iter()
        .filter(|r| !r.source().is_empty() && seen.insert(r.source().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_keeps_first_and_drops_empty() {
        let people = vec![
            Person::new("https://viaf.org/viaf/1", "https://viaf.org").with_title("first"),
            Person::new("", "https://isni.org/"),
            Person::new("https://isni.org/isni/2", "https://isni.org/"),
            Person::new("https://viaf.org/viaf/1", "https://viaf.org").with_title("second"),
        ];

        let deduped = dedup_by_source(people);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].title.as_deref(), Some("first"));
        assert_eq!(deduped[1].source, "https://isni.org/isni/2");
    }
}
