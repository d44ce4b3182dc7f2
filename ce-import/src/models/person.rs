//! Person record

use serde::{Deserialize, Serialize};

use super::{Entity, EntityKind, Place, FORMAT_HTML};
use crate::graphql::MutationArgs;

/// A composer or other person as described by one external page
///
/// `birthplace`/`deathplace` are nested places that are created as separate
/// Place nodes and linked after the person exists; they are never part of the
/// Person create mutation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub source: String,
    pub title: Option<String>,
    pub name: Option<String>,
    pub family_name: Option<String>,
    pub given_name: Option<String>,
    pub gender: Option<String>,
    pub birth_date: Option<String>,
    pub death_date: Option<String>,
    pub image: Option<String>,
    pub description: Option<String>,
    pub contributor: Option<String>,
    #[serde(alias = "format_")]
    pub format: Option<String>,
    pub language: Option<String>,
    pub birthplace: Option<Place>,
    pub deathplace: Option<Place>,
}

impl Person {
    /// Page-backed person with the default html format
    pub fn new(source: impl Into<String>, contributor: &str) -> Self {
        Self {
            source: source.into(),
            contributor: Some(contributor.to_string()),
            format: Some(FORMAT_HTML.to_string()),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Remove and return (birthplace, deathplace)
    pub fn take_places(&mut self) -> (Option<Place>, Option<Place>) {
        (self.birthplace.take(), self.deathplace.take())
    }
}

impl Entity for Person {
    const KIND: EntityKind = EntityKind::Person;

    fn source(&self) -> &str {
        &self.source
    }

    fn to_args(&self) -> MutationArgs {
        MutationArgs::new()
            .str("title", self.title.as_deref())
            .str("name", self.name.as_deref())
            .str("familyName", self.family_name.as_deref())
            .str("givenName", self.given_name.as_deref())
            .str("gender", self.gender.as_deref())
            .str("birthDate", self.birth_date.as_deref())
            .str("deathDate", self.death_date.as_deref())
            .str("image", self.image.as_deref())
            .str("description", self.description.as_deref())
            .str("contributor", self.contributor.as_deref())
            .str("source", Some(self.source.as_str()))
            .str("format", self.format.as_deref())
            .enumeration("language", self.language.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_places_never_in_args() {
        let mut person = Person::new("https://musicbrainz.org/artist/1", "https://musicbrainz.org");
        person.name = Some("Josquin".to_string());
        person.birthplace = Some(Place::new("https://musicbrainz.org/area/a", "https://musicbrainz.org"));
        person.deathplace = Some(Place::new("https://musicbrainz.org/area/b", "https://musicbrainz.org"));

        let args = person.to_args();
        assert!(args.keys().all(|k| !k.to_lowercase().contains("place")));
        assert!(args.contains("name"));

        let (birth, death) = person.take_places();
        assert!(birth.is_some() && death.is_some());
        assert!(person.birthplace.is_none() && person.deathplace.is_none());
    }
}
