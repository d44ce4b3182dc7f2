//! Mutation builders
//!
//! Create mutations return `{ identifier }`; merge mutations link two existing
//! entities by identifier.

use crate::models::EntityKind;

use super::{GqlValue, MutationArgs};

/// Relations materialised through `Merge*` mutations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// Same real-world entity, asserted per direction
    ExactMatch(EntityKind),
    /// MusicComposition -> Person
    Composer,
    /// MusicComposition -> part MusicComposition
    IncludedComposition,
    /// MusicComposition -> part MusicComposition
    HasPart,
    /// MediaObject -> MusicComposition
    ExampleOfWork,
    /// MediaObject -> the MediaObject it was rendered from
    WasDerivedFrom,
    /// Person -> Place
    BirthPlace,
    /// Person -> Place
    DeathPlace,
}

impl Relation {
    pub fn mutation_name(&self) -> String {
        match self {
            Relation::ExactMatch(kind) => format!("Merge{}ExactMatch", kind.type_name()),
            Relation::Composer => "MergeMusicCompositionComposer".to_string(),
            Relation::IncludedComposition => "MergeMusicCompositionIncludedComposition".to_string(),
            Relation::HasPart => "MergeMusicCompositionHasPart".to_string(),
            Relation::ExampleOfWork => "MergeMediaObjectExampleOfWork".to_string(),
            Relation::WasDerivedFrom => "MergeMediaObjectWasDerivedFrom".to_string(),
            Relation::BirthPlace => "MergePersonBirthPlace".to_string(),
            Relation::DeathPlace => "MergePersonDeathPlace".to_string(),
        }
    }
}

/// Name of the create mutation for an entity kind (`CreatePerson`, ...)
pub fn create_operation(kind: EntityKind) -> String {
    format!("Create{}", kind.type_name())
}

pub fn create(kind: EntityKind, args: &MutationArgs) -> String {
    format!(
        "mutation {{\n  {}(\n{}\n  ) {{\n    identifier\n  }}\n}}",
        create_operation(kind),
        args.render("    ")
    )
}

pub fn merge(relation: Relation, from_id: &str, to_id: &str) -> String {
    format!(
        "mutation {{\n  {}(\n    from: {{identifier: {}}}\n    to: {{identifier: {}}}\n  ) {{\n    from {{ identifier }}\n    to {{ identifier }}\n  }}\n}}",
        relation.mutation_name(),
        GqlValue::Str(from_id.to_string()).render(),
        GqlValue::Str(to_id.to_string()).render()
    )
}

pub const UPDATE_MEDIA_OBJECT: &str = "UpdateMediaObject";

pub fn update_media_object(identifier: &str, args: &MutationArgs) -> String {
    let args = MutationArgs::new()
        .str("identifier", Some(identifier))
        .render("    ")
        + "\n"
        + &args.render("    ");
    format!(
        "mutation {{\n  {}(\n{}\n  ) {{\n    identifier\n  }}\n}}",
        UPDATE_MEDIA_OBJECT, args
    )
}
