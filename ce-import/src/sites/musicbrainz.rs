//! MusicBrainz web service (ws/2, JSON)
//!
//! Artists, areas and works are looked up by MBID. Relations to other sites
//! are identified by relation type id where MusicBrainz has a dedicated type,
//! otherwise by URL substring.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::http::SiteClient;
use super::ExternalRelations;
use crate::error::ImportResult;
use crate::models::{MusicComposition, Person, Place, LANGUAGE_EN};

pub const WS_URL: &str = "https://musicbrainz.org/ws/2";
pub const CONTRIBUTOR: &str = "https://musicbrainz.org";

pub const VIAF_REL: &str = "e8571dcc-35d4-4e91-a577-a3382fd84460";
pub const WIKIDATA_REL: &str = "689870a4-a1e4-4912-b17f-7b2664215698";
pub const IMSLP_REL: &str = "8147b6a2-ad14-4ce7-8f0a-697f9a31f68f";
/// Artist was the composer of a work
pub const COMPOSER_REL: &str = "d59d99ea-23d4-4a80-b066-edca32ee158f";
/// Work is a subpart of another work
pub const PARTS_REL: &str = "ca8d3642-ce5f-49f8-91f2-125d72524e6a";
/// Artist is a member of a group
pub const MEMBER_REL: &str = "5be4c609-9afa-4ea0-910b-12ffb71e3821";

#[derive(Debug, Clone, Deserialize)]
pub struct MbArtist {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub artist_type: Option<String>,
    #[serde(rename = "begin-area")]
    pub begin_area: Option<MbArea>,
    #[serde(rename = "end-area")]
    pub end_area: Option<MbArea>,
    #[serde(rename = "life-span")]
    pub life_span: Option<MbLifeSpan>,
    #[serde(default)]
    pub isnis: Vec<String>,
    #[serde(default)]
    pub relations: Vec<MbRelation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MbArea {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MbLifeSpan {
    pub begin: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MbRelation {
    #[serde(rename = "type-id")]
    pub type_id: Option<String>,
    pub direction: Option<String>,
    #[serde(rename = "ordering-key")]
    pub ordering_key: Option<Value>,
    pub url: Option<MbUrl>,
    pub artist: Option<MbEntityRef>,
    pub work: Option<MbEntityRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MbUrl {
    pub resource: String,
}

/// A related artist or work: artists carry `name`, works `title`
#[derive(Debug, Clone, Deserialize)]
pub struct MbEntityRef {
    pub id: String,
    pub name: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MbWork {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub relations: Vec<MbRelation>,
}

/// A work with its composer and ordered parts
#[derive(Debug, Clone, PartialEq)]
pub struct WorkImport {
    pub work: MusicComposition,
    pub composer_mbid: Option<String>,
    pub composer_source: Option<String>,
    pub parts: Vec<MusicComposition>,
}

impl MbRelation {
    fn has_type(&self, type_id: &str) -> bool {
        self.type_id.as_deref() == Some(type_id)
    }
}

pub fn artist_url(mbid: &str) -> String {
    format!("https://musicbrainz.org/artist/{}", mbid)
}

pub fn work_url(mbid: &str) -> String {
    format!("https://musicbrainz.org/work/{}", mbid)
}

pub fn area_url(area_id: &str) -> String {
    format!("https://musicbrainz.org/area/{}", area_id)
}

/// Life-span date if every `-` separated part is numeric
///
/// MusicBrainz sometimes carries dates like `1685-??-21`; these are dropped.
pub fn valid_date(date: Option<&str>) -> Option<String> {
    let date = date?;
    let numeric = date
        .split('-')
        .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()));
    numeric.then(|| date.to_string())
}

// ============================================================================
// Parsing
// ============================================================================

/// Person record from an artist, without places
pub fn person_from_artist(artist: &MbArtist) -> Person {
    let mut person = Person::new(artist_url(&artist.id), CONTRIBUTOR)
        .with_title(format!("{} - MusicBrainz", artist.name));
    person.name = Some(artist.name.clone());
    person.language = Some(LANGUAGE_EN.to_string());
    if let Some(span) = &artist.life_span {
        person.birth_date = valid_date(span.begin.as_deref());
        person.death_date = valid_date(span.end.as_deref());
    }
    person
}

pub fn place_from_area(area: &MbArea) -> Place {
    let mut place = Place::new(area_url(&area.id), CONTRIBUTOR);
    place.title = Some(format!("{} - MusicBrainz", area.name));
    place.name = Some(area.name.clone());
    place
}

/// Links to other sites from an artist fetched with `url-rels`
pub fn relations_from_artist(artist: &MbArtist) -> ExternalRelations {
    let mut relations = ExternalRelations {
        isni: artist.isnis.first().cloned(),
        ..Default::default()
    };

    for rel in &artist.relations {
        let target = match &rel.url {
            Some(url) => url.resource.clone(),
            None => continue,
        };
        if rel.has_type(VIAF_REL) {
            relations.viaf = Some(target);
        } else if target.contains("worldcat.org") {
            relations.worldcat = Some(target);
        } else if target.contains("id.loc.gov") {
            relations.loc = Some(target);
        } else if rel.has_type(WIKIDATA_REL) {
            relations.wikidata = Some(target);
        } else if rel.has_type(IMSLP_REL) {
            relations.imslp = Some(target);
        }
    }

    relations
}

/// MBIDs of group members
pub fn group_member_ids(artist: &MbArtist) -> Vec<String> {
    artist
        .relations
        .iter()
        .filter(|rel| rel.has_type(MEMBER_REL))
        .filter_map(|rel| rel.artist.as_ref().map(|a| a.id.clone()))
        .collect()
}

fn ordering_position(key: Option<&Value>) -> Option<i64> {
    match key? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => match s.trim().parse() {
            Ok(n) => Some(n),
            Err(_) => {
                warn!("Unknown subpart ordering key {:?}, should be an int", s);
                None
            }
        },
        _ => None,
    }
}

fn composition(mbid: &str, title: &str) -> MusicComposition {
    let mut work = MusicComposition::new(work_url(mbid), CONTRIBUTOR);
    work.title = Some(format!("{} - MusicBrainz", title));
    work.name = Some(title.to_string());
    work
}

/// Work record, first composer and forward part relations
pub fn work_from_musicbrainz(work: &MbWork) -> WorkImport {
    let composer_mbid = work
        .relations
        .iter()
        .find(|rel| rel.has_type(COMPOSER_REL))
        .and_then(|rel| rel.artist.as_ref())
        .map(|artist| artist.id.clone());

    let parts = work
        .relations
        .iter()
        .filter(|rel| rel.has_type(PARTS_REL) && rel.direction.as_deref() == Some("forward"))
        .filter_map(|rel| {
            let part = rel.work.as_ref()?;
            let mut part_work = composition(&part.id, part.title.as_deref().unwrap_or_default());
            part_work.position = ordering_position(rel.ordering_key.as_ref());
            Some(part_work)
        })
        .collect();

    WorkImport {
        work: composition(&work.id, &work.title),
        composer_source: composer_mbid.as_deref().map(artist_url),
        composer_mbid,
        parts,
    }
}

/// First related artist or work id of a url lookup
pub fn first_relation_id(response: &Value, target: &str) -> Option<String> {
    response
        .pointer(&format!("/relations/0/{}/id", target))
        .and_then(Value::as_str)
        .map(str::to_string)
}

// ============================================================================
// Fetching
// ============================================================================

/// Artist with url and artist relations
///
/// Always requested with the same includes so repeated lookups hit the cache.
pub async fn get_artist(client: &SiteClient, mbid: &str) -> ImportResult<MbArtist> {
    let json = client
        .get_json(
            &format!("{}/artist/{}", WS_URL, mbid),
            &[("inc", "url-rels+artist-rels"), ("fmt", "json")],
        )
        .await?;
    Ok(serde_json::from_value(json)?)
}

pub async fn load_area_from_musicbrainz(client: &SiteClient, area_id: &str) -> ImportResult<Place> {
    let json = client
        .get_json(&format!("{}/area/{}", WS_URL, area_id), &[("fmt", "json")])
        .await?;
    let area: MbArea = serde_json::from_value(json)?;
    Ok(place_from_area(&area))
}

async fn person_with_places(client: &SiteClient, artist: &MbArtist) -> ImportResult<Person> {
    let mut person = person_from_artist(artist);
    if let Some(area) = &artist.begin_area {
        person.birthplace = Some(load_area_from_musicbrainz(client, &area.id).await?);
    }
    if let Some(area) = &artist.end_area {
        person.deathplace = Some(load_area_from_musicbrainz(client, &area.id).await?);
    }
    Ok(person)
}

/// Person for an artist, with begin and end areas as birth and death places
pub async fn load_person_from_musicbrainz(client: &SiteClient, mbid: &str) -> ImportResult<Person> {
    let artist = get_artist(client, mbid).await?;
    person_with_places(client, &artist).await
}

/// The artist, plus each member when the artist is a group
pub async fn load_persons_from_musicbrainz(client: &SiteClient, mbid: &str) -> ImportResult<Vec<Person>> {
    let artist = get_artist(client, mbid).await?;
    let mut persons = vec![person_with_places(client, &artist).await?];

    if artist.artist_type.as_deref() == Some("Group") {
        for member_id in group_member_ids(&artist) {
            debug!(group = %artist.name, member_id = %member_id, "Loading group member");
            persons.push(load_person_from_musicbrainz(client, &member_id).await?);
        }
    }

    Ok(persons)
}

pub async fn load_person_relations_from_musicbrainz(
    client: &SiteClient,
    mbid: &str,
) -> ImportResult<ExternalRelations> {
    let artist = get_artist(client, mbid).await?;
    Ok(relations_from_artist(&artist))
}

pub async fn load_work_from_musicbrainz(client: &SiteClient, mbid: &str) -> ImportResult<WorkImport> {
    let json = client
        .get_json(
            &format!("{}/work/{}", WS_URL, mbid),
            &[("inc", "artist-rels+work-rels"), ("fmt", "json")],
        )
        .await?;
    let work: MbWork = serde_json::from_value(json)?;
    let import = work_from_musicbrainz(&work);
    info!(mbid, parts = import.parts.len(), "Loaded MusicBrainz work");
    Ok(import)
}

async fn lookup_imslp_url(
    client: &SiteClient,
    url: &str,
    includes: &str,
    target: &str,
) -> ImportResult<Option<String>> {
    // MusicBrainz stores IMSLP links as https
    let resource = match url.strip_prefix("http://") {
        Some(rest) => format!("https://{}", rest),
        None => url.to_string(),
    };

    let fetched = client
        .get(
            &format!("{}/url", WS_URL),
            &[("resource", resource.as_str()), ("inc", includes), ("fmt", "json")],
        )
        .await?;
    if fetched.status != 200 {
        return Ok(None);
    }
    Ok(first_relation_id(&fetched.json()?, target))
}

/// Reverse lookup of an artist from its IMSLP page
pub async fn get_artist_mbid_by_imslp_url(client: &SiteClient, url: &str) -> ImportResult<Option<String>> {
    lookup_imslp_url(client, url, "artist-rels", "artist").await
}

/// Reverse lookup of a work from its IMSLP page
pub async fn get_work_mbid_by_imslp_url(client: &SiteClient, url: &str) -> ImportResult<Option<String>> {
    lookup_imslp_url(client, url, "work-rels", "work").await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn beethoven() -> MbArtist {
        serde_json::from_value(json!({
            "id": "1f9df192-a621-4f54-8850-2c5373b7eac9",
            "name": "Ludwig van Beethoven",
            "type": "Person",
            "begin-area": {"id": "b9576171-3434-4d1b-8883-165ed6e65d2f", "name": "Bonn"},
            "end-area": null,
            "life-span": {"begin": "1770-12-16", "end": "1827-03-2?", "ended": true},
            "isnis": ["0000000121268987", "0000000000000001"],
            "relations": [
                {"type-id": VIAF_REL, "url": {"resource": "https://viaf.org/viaf/32095201/"}},
                {"type-id": "other", "url": {"resource": "https://www.worldcat.org/identities/lccn-n79107741/"}},
                {"type-id": "other", "url": {"resource": "http://id.loc.gov/authorities/names/n79107741"}},
                {"type-id": WIKIDATA_REL, "url": {"resource": "https://www.wikidata.org/wiki/Q255"}},
                {"type-id": IMSLP_REL, "url": {"resource": "https://imslp.org/wiki/Category:Beethoven,_Ludwig_van"}},
                {"type-id": MEMBER_REL, "artist": {"id": "not-a-url", "name": "x"}}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_person_from_artist() {
        let person = person_from_artist(&beethoven());
        assert_eq!(person.title.as_deref(), Some("Ludwig van Beethoven - MusicBrainz"));
        assert_eq!(person.source, "https://musicbrainz.org/artist/1f9df192-a621-4f54-8850-2c5373b7eac9");
        assert_eq!(person.birth_date.as_deref(), Some("1770-12-16"));
        assert_eq!(person.death_date, None, "partial unknown date is dropped");
        assert!(person.birthplace.is_none());
    }

    #[test]
    fn test_valid_date() {
        assert_eq!(valid_date(Some("1803")), Some("1803".to_string()));
        assert_eq!(valid_date(Some("1803-04")), Some("1803-04".to_string()));
        assert_eq!(valid_date(Some("c1600")), None);
        assert_eq!(valid_date(Some("1803--01")), None);
        assert_eq!(valid_date(None), None);
    }

    #[test]
    fn test_relations_from_artist() {
        let rels = relations_from_artist(&beethoven());
        assert_eq!(rels.isni.as_deref(), Some("0000000121268987"));
        assert_eq!(rels.viaf.as_deref(), Some("https://viaf.org/viaf/32095201/"));
        assert!(rels.worldcat.unwrap().contains("worldcat.org"));
        assert!(rels.loc.unwrap().contains("id.loc.gov"));
        assert_eq!(rels.wikidata.as_deref(), Some("https://www.wikidata.org/wiki/Q255"));
        assert!(rels.imslp.unwrap().starts_with("https://imslp.org/wiki/Category:"));
        assert_eq!(rels.musicbrainz, None);
    }

    #[test]
    fn test_group_member_ids() {
        assert_eq!(group_member_ids(&beethoven()), vec!["not-a-url"]);
    }

    #[test]
    fn test_work_from_musicbrainz() {
        let work: MbWork = serde_json::from_value(json!({
            "id": "w1",
            "title": "Variations, op. 35",
            "relations": [
                {"type-id": "other-artist", "artist": {"id": "lyricist"}},
                {"type-id": COMPOSER_REL, "artist": {"id": "a1", "name": "Beethoven"}},
                {"type-id": COMPOSER_REL, "artist": {"id": "a2", "name": "Second"}},
                {"type-id": PARTS_REL, "direction": "forward", "ordering-key": 2, "work": {"id": "p2", "title": "Variation 2"}},
                {"type-id": PARTS_REL, "direction": "forward", "ordering-key": "x", "work": {"id": "p3", "title": "Fugue"}},
                {"type-id": PARTS_REL, "direction": "backward", "work": {"id": "parent", "title": "Parent"}}
            ]
        }))
        .unwrap();

        let import = work_from_musicbrainz(&work);
        assert_eq!(import.work.source, "https://musicbrainz.org/work/w1");
        assert_eq!(import.work.title.as_deref(), Some("Variations, op. 35 - MusicBrainz"));
        assert_eq!(import.composer_mbid.as_deref(), Some("a1"));
        assert_eq!(import.composer_source.as_deref(), Some("https://musicbrainz.org/artist/a1"));
        assert_eq!(import.parts.len(), 2);
        assert_eq!(import.parts[0].position, Some(2));
        assert_eq!(import.parts[0].name.as_deref(), Some("Variation 2"));
        assert_eq!(import.parts[1].position, None);
    }

    #[test]
    fn test_first_relation_id() {
        let response = json!({
            "resource": "https://imslp.org/wiki/7_Bagatelles,_Op.33_(Beethoven,_Ludwig_van)",
            "relations": [{"target-type": "work", "work": {"id": "94a19e47-2c1d-425b-b4f0-63d62d5bf788", "title": "7 Bagatelles, op. 33"}}]
        });
        assert_eq!(
            first_relation_id(&response, "work").as_deref(),
            Some("94a19e47-2c1d-425b-b4f0-63d62d5bf788")
        );
        assert_eq!(first_relation_id(&response, "artist"), None);
        assert_eq!(first_relation_id(&json!({"relations": []}), "work"), None);
    }
}
