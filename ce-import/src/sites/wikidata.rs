//! Wikidata entities and the Wikipedia pages they link to

use serde_json::Value;
use tracing::debug;

use super::http::SiteClient;
use super::mediawiki::{normalized_titles, pages_of};
use crate::error::{ImportError, ImportResult};
use crate::models::Person;

pub const CONTRIBUTOR_WIKIDATA: &str = "https://wikidata.org/";
pub const CONTRIBUTOR_WIKIPEDIA: &str = "https://wikipedia.org/";

const ENTITY_DATA_URL: &str = "https://www.wikidata.org/wiki/Special:EntityData";

pub fn wikidata_url(entity_id: &str) -> String {
    format!("https://www.wikidata.org/wiki/{}", entity_id)
}

fn wikipedia_api_url(language: &str) -> String {
    format!("https://{}.wikipedia.org/w/api.php", language)
}

/// Last path segment of an entity URL (`Q255`)
pub fn entity_id_from_url(url: &str) -> Option<&str> {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
}

/// Page title of a `/wiki/` URL, with underscores kept
pub fn wiki_title_from_url(url: &str) -> Option<String> {
    let (_, title) = url.split_once("/wiki/")?;
    let title = title.split(['#', '?']).next().unwrap_or_default();
    if title.is_empty() {
        return None;
    }
    Some(
        urlencoding::decode(title)
            .map(|t| t.into_owned())
            .unwrap_or_else(|_| title.to_string()),
    )
}

fn lang_value<'a>(entity: &'a Value, field: &str, language: &str) -> Option<&'a str> {
    entity
        .get(field)?
        .get(language)?
        .get("value")?
        .as_str()
}

/// Entity JSON for a wikidata URL
pub async fn get_entity(client: &SiteClient, url: &str) -> ImportResult<Value> {
    let id = entity_id_from_url(url)
        .ok_or_else(|| ImportError::InvalidInput(format!("Not a wikidata entity URL: {}", url)))?;
    let json = client
        .get_json(&format!("{}/{}.json", ENTITY_DATA_URL, id), &[])
        .await?;

    // Redirected entities are keyed by their new id
    json.get("entities")
        .and_then(Value::as_object)
        .and_then(|entities| entities.get(id).or_else(|| entities.values().next()))
        .cloned()
        .ok_or_else(|| ImportError::Parse(format!("No entity in wikidata response for {}", id)))
}

/// Person from an entity with an English label
pub fn person_from_entity(url: &str, entity: &Value) -> Option<Person> {
    let label = lang_value(entity, "labels", "en")?;
    let mut person = Person::new(url, CONTRIBUTOR_WIKIDATA).with_title(format!("{} - Wikidata", label));
    person.name = Some(label.to_string());
    person.description = lang_value(entity, "descriptions", "en").map(str::to_string);
    Some(person)
}

/// (title, url) of the entity's Wikipedia page in `language`
pub fn sitelink(entity: &Value, language: &str) -> Option<(String, String)> {
    let link = entity.get("sitelinks")?.get(format!("{}wiki", language))?;
    let title = link.get("title")?.as_str()?.to_string();
    let url = match link.get("url").and_then(Value::as_str) {
        Some(url) => url.to_string(),
        None => format!("https://{}.wikipedia.org/wiki/{}", language, title.replace(' ', "_")),
    };
    Some((title, url))
}

pub async fn load_person_from_wikidata(client: &SiteClient, url: &str) -> ImportResult<Option<Person>> {
    let entity = get_entity(client, url).await?;
    Ok(person_from_entity(url, &entity))
}

/// Follow `query.normalized` then `query.redirects` from a requested title
fn resolved_title(json: &Value, title: &str) -> String {
    let normalized = normalized_titles(json)
        .remove(title)
        .unwrap_or_else(|| title.to_string());

    let redirects = json.pointer("/query/redirects").and_then(Value::as_array);
    for redirect in redirects.into_iter().flatten() {
        let from = redirect.get("from").and_then(Value::as_str);
        let to = redirect.get("to").and_then(Value::as_str);
        if let (Some(from), Some(to)) = (from, to) {
            if from == normalized {
                return to.to_string();
            }
        }
    }
    normalized
}

fn page_for_title<'a>(json: &'a Value, title: &str) -> Option<&'a Value> {
    pages_of(json)
        .into_iter()
        .find(|page| page.get("title").and_then(Value::as_str) == Some(title))
}

/// Intro extract of the page `title` from a `prop=extracts` response
pub fn parse_description(json: &Value, title: &str) -> Option<String> {
    let resolved = resolved_title(json, title);
    page_for_title(json, &resolved)?
        .get("extract")?
        .as_str()
        .map(str::to_string)
}

/// Wikidata item id from a `prop=pageprops` response
pub fn parse_wikibase_item(json: &Value, title: &str) -> Option<String> {
    let resolved = resolved_title(json, title);
    page_for_title(json, &resolved)?
        .pointer("/pageprops/wikibase_item")?
        .as_str()
        .map(str::to_string)
}

/// Resolved page title and intro html of a Wikipedia page
pub async fn get_description_from_wikipedia(
    client: &SiteClient,
    language: &str,
    title: &str,
) -> ImportResult<(String, Option<String>)> {
    let json = client
        .get_json(
            &wikipedia_api_url(language),
            &[
                ("action", "query"),
                ("prop", "extracts"),
                ("exintro", "1"),
                ("redirects", "1"),
                ("titles", title),
                ("format", "json"),
            ],
        )
        .await?;
    Ok((resolved_title(&json, title), parse_description(&json, title)))
}

/// Person from the Wikipedia page of a wikidata entity
///
/// A Wikipedia URL is accepted too, in which case the page is read directly.
pub async fn load_person_from_wikipedia(
    client: &SiteClient,
    url: &str,
    language: &str,
) -> ImportResult<Option<Person>> {
    let (wikipedia_url, label, description) = if url.contains("wikipedia") {
        let title = match wiki_title_from_url(url) {
            Some(title) => title,
            None => return Ok(None),
        };
        let (resolved, description) = get_description_from_wikipedia(client, language, &title).await?;
        (url.to_string(), Some(resolved), description)
    } else {
        let entity = get_entity(client, url).await?;
        let (title, wikipedia_url) = match sitelink(&entity, language) {
            Some(link) => link,
            None => {
                debug!(url, language, "No wikipedia sitelink");
                return Ok(None);
            }
        };
        let (_, description) = get_description_from_wikipedia(client, language, &title).await?;
        let label = lang_value(&entity, "labels", language).map(str::to_string);
        (wikipedia_url, label, description)
    };

    Ok(label.map(|label| {
        let mut person = Person::new(wikipedia_url, CONTRIBUTOR_WIKIPEDIA)
            .with_title(format!("{} - Wikipedia", label));
        person.name = Some(label);
        person.description = description;
        person.language = Some(language.to_string());
        person
    }))
}

/// Wikidata item id of an English Wikipedia page, if it has one
pub async fn get_wikidata_id_from_wikipedia_url(
    client: &SiteClient,
    url: &str,
) -> ImportResult<Option<String>> {
    if !url.contains("en.wikipedia.org") {
        return Err(ImportError::InvalidInput(format!(
            "Can only use en.wikipedia.org urls: {}",
            url
        )));
    }
    let title = wiki_title_from_url(url)
        .ok_or_else(|| ImportError::InvalidInput(format!("No page title in {}", url)))?;

    let json = client
        .get_json(
            &wikipedia_api_url("en"),
            &[
                ("action", "query"),
                ("prop", "pageprops"),
                ("titles", title.as_str()),
                ("format", "json"),
            ],
        )
        .await?;
    Ok(parse_wikibase_item(&json, &title))
}
