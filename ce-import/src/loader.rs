//! Get-or-create-and-link reconciliation against the CE
//!
//! Entities are resolved by their `source` URL: a lookup query runs first and
//! the create mutation only runs when nothing matches. The check-then-act is
//! not atomic, so concurrent importer runs can still create duplicates.
//! Existing entities are never updated or merged with new fields.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{ImportError, ImportResult};
use crate::graphql::mutations::{self, Relation};
use crate::graphql::{identifier_of, queries, MutationArgs, Submitter};
use crate::models::{Entity, EntityKind, MediaObject, MusicComposition, Person, Place};

/// Writes records and relations to the CE through a [`Submitter`]
#[derive(Clone)]
pub struct Loader {
    submitter: Arc<dyn Submitter>,
    creator: String,
}

impl Loader {
    /// `creator` is the attribution URL stamped on every created entity
    pub fn new(submitter: Arc<dyn Submitter>, creator: impl Into<String>) -> Self {
        Self {
            submitter,
            creator: creator.into(),
        }
    }

    pub fn creator(&self) -> &str {
        &self.creator
    }

    /// Submit a raw query or mutation
    pub async fn submit(&self, query: &str) -> ImportResult<Value> {
        self.submitter.submit(query).await
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Identifier of the entity of `kind` whose source is exactly `source`
    pub async fn find_by_source(
        &self,
        kind: EntityKind,
        source: &str,
    ) -> ImportResult<Option<String>> {
        if source.is_empty() {
            return Err(ImportError::InvalidInput(format!(
                "{} lookup needs a non-empty source",
                kind.type_name()
            )));
        }

        let response = self.submit(&queries::query_by_source(kind, source)).await?;
        let identifier = queries::first_result(&response, kind)
            .and_then(|r| r.get("identifier"))
            .and_then(Value::as_str)
            .map(str::to_string);

        debug!(kind = kind.type_name(), source, found = identifier.is_some(), "Source lookup");
        Ok(identifier)
    }

    // ========================================================================
    // Creation
    // ========================================================================

    async fn create<E: Entity + Sync>(&self, entity: &E) -> ImportResult<String> {
        let mut args = entity.to_args();
        args.set_str("creator", &self.creator);

        let mutation = mutations::create(E::KIND, &args);
        let response = self.submit(&mutation).await?;
        let identifier = identifier_of(&response, &mutations::create_operation(E::KIND))?;

        info!(
            kind = E::KIND.type_name(),
            source = entity.source(),
            identifier = %identifier,
            "Created entity"
        );
        Ok(identifier)
    }

    async fn get_or_create<E: Entity + Sync>(&self, entity: &E) -> ImportResult<String> {
        if let Some(existing) = self.find_by_source(E::KIND, entity.source()).await? {
            return Ok(existing);
        }
        self.create(entity).await
    }

    pub async fn create_place(&self, place: &Place) -> ImportResult<String> {
        self.create(place).await
    }

    /// Create a person, then create and link its birth and death places
    ///
    /// The places are removed from the record before the Person mutation is
    /// built. If a place fails after the person was created, the person stays
    /// without that link.
    pub async fn create_person(&self, mut person: Person) -> ImportResult<String> {
        let (birthplace, deathplace) = person.take_places();
        let person_id = self.create(&person).await?;

        if let Some(place) = birthplace {
            let place_id = self.create_place(&place).await?;
            self.link(Relation::BirthPlace, &person_id, &place_id).await?;
        }

        if let Some(place) = deathplace {
            let place_id = self.create_place(&place).await?;
            self.link(Relation::DeathPlace, &person_id, &place_id).await?;
        }

        Ok(person_id)
    }

    pub async fn get_or_create_person(&self, person: Person) -> ImportResult<String> {
        if let Some(existing) = self.find_by_source(EntityKind::Person, &person.source).await? {
            return Ok(existing);
        }
        self.create_person(person).await
    }

    pub async fn get_or_create_place(&self, place: &Place) -> ImportResult<String> {
        self.get_or_create(place).await
    }

    pub async fn get_or_create_composition(
        &self,
        composition: &MusicComposition,
    ) -> ImportResult<String> {
        self.get_or_create(composition).await
    }

    pub async fn get_or_create_media_object(&self, media_object: &MediaObject) -> ImportResult<String> {
        self.get_or_create(media_object).await
    }

    // ========================================================================
    // Linking
    // ========================================================================

    pub async fn link(&self, relation: Relation, from_id: &str, to_id: &str) -> ImportResult<()> {
        self.submit(&mutations::merge(relation, from_id, to_id)).await?;
        debug!(relation = %relation.mutation_name(), from_id, to_id, "Linked");
        Ok(())
    }

    /// Assert exact-match between every ordered pair of distinct positions
    ///
    /// Issues N×(N−1) mutations, one direction each, in sequence. Returns the
    /// number of mutations submitted.
    pub async fn link_exact_matches(&self, kind: EntityKind, ids: &[String]) -> ImportResult<usize> {
        let mut submitted = 0;
        for (i, from_id) in ids.iter().enumerate() {
            for (j, to_id) in ids.iter().enumerate() {
                if i == j {
                    continue;
                }
                self.link(Relation::ExactMatch(kind), from_id, to_id).await?;
                submitted += 1;
            }
        }
        Ok(submitted)
    }

    /// Get-or-create every person and link them all as exact matches
    pub async fn create_persons_and_link(&self, persons: Vec<Person>) -> ImportResult<Vec<String>> {
        let mut person_ids = Vec::with_capacity(persons.len());
        for person in persons {
            person_ids.push(self.get_or_create_person(person).await?);
        }

        self.link_exact_matches(EntityKind::Person, &person_ids).await?;
        Ok(person_ids)
    }

    pub async fn link_composition_exact_matches(&self, ids: &[String]) -> ImportResult<usize> {
        self.link_exact_matches(EntityKind::MusicComposition, ids).await
    }

    pub async fn link_composition_composers(
        &self,
        composition_id: &str,
        composer_ids: &[String],
    ) -> ImportResult<()> {
        for composer_id in composer_ids {
            self.link(Relation::Composer, composition_id, composer_id).await?;
        }
        Ok(())
    }

    pub async fn link_composition_parts(
        &self,
        composition_id: &str,
        part_ids: &[String],
    ) -> ImportResult<()> {
        for part_id in part_ids {
            self.link(Relation::IncludedComposition, composition_id, part_id).await?;
            self.link(Relation::HasPart, composition_id, part_id).await?;
        }
        Ok(())
    }

    pub async fn link_media_object_example_of_work(
        &self,
        media_object_id: &str,
        composition_id: &str,
    ) -> ImportResult<()> {
        self.link(Relation::ExampleOfWork, media_object_id, composition_id).await
    }

    /// `derived_id` (e.g. a PDF rendering) was derived from `original_id`
    pub async fn link_media_object_derived_from(
        &self,
        derived_id: &str,
        original_id: &str,
    ) -> ImportResult<()> {
        self.link(Relation::WasDerivedFrom, derived_id, original_id).await
    }

    // ========================================================================
    // MediaObject reads and updates
    // ========================================================================

    /// Fields of a MediaObject by identifier, or None if it does not exist
    pub async fn load_media_object(
        &self,
        identifier: &str,
        fields: &[&str],
    ) -> ImportResult<Option<Value>> {
        let response = self
            .submit(&queries::query_media_object(identifier, fields))
            .await?;
        Ok(queries::first_result(&response, EntityKind::MediaObject).cloned())
    }

    pub async fn update_media_object(
        &self,
        identifier: &str,
        args: &MutationArgs,
    ) -> ImportResult<String> {
        let response = self
            .submit(&mutations::update_media_object(identifier, args))
            .await?;
        identifier_of(&response, mutations::UPDATE_MEDIA_OBJECT)
    }
}
