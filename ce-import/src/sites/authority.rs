//! Authority file title pages: VIAF, ISNI, Library of Congress, Worldcat
//!
//! None of these are parsed beyond the html `<title>`; the record mostly
//! exists so the page can be linked as an exact match of the composer.

use scraper::{Html, Selector};
use tracing::debug;

use super::http::SiteClient;
use crate::error::ImportResult;
use crate::models::Person;

pub const CONTRIBUTOR_VIAF: &str = "https://viaf.org";
pub const CONTRIBUTOR_ISNI: &str = "https://isni.org/";
pub const CONTRIBUTOR_LOC: &str = "https://id.loc.gov/";
pub const CONTRIBUTOR_WORLDCAT: &str = "https://www.worldcat.org/";

/// Text of the first `<title>` element
pub fn page_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    if let Ok(selector) = Selector::parse("title") {
        document
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>())
    } else {
        None
    }
}

/// Person from the `<title>` of `url`
///
/// An HTTP error status or a page without a title gives no record.
pub async fn load_person_from_title_page(
    client: &SiteClient,
    url: &str,
    contributor: &str,
) -> ImportResult<Option<Person>> {
    let fetched = client.get(url, &[]).await?;
    if !fetched.is_success() {
        debug!(url, status = fetched.status, "No authority page");
        return Ok(None);
    }

    Ok(page_title(&fetched.body).map(|title| Person::new(url, contributor).with_title(title)))
}

pub async fn load_person_from_viaf(client: &SiteClient, url: &str) -> ImportResult<Option<Person>> {
    load_person_from_title_page(client, url, CONTRIBUTOR_VIAF).await
}

pub async fn load_person_from_isni(client: &SiteClient, url: &str) -> ImportResult<Option<Person>> {
    load_person_from_title_page(client, url, CONTRIBUTOR_ISNI).await
}

pub async fn load_person_from_loc(client: &SiteClient, url: &str) -> ImportResult<Option<Person>> {
    load_person_from_title_page(client, url, CONTRIBUTOR_LOC).await
}

pub async fn load_person_from_worldcat(client: &SiteClient, url: &str) -> ImportResult<Option<Person>> {
    load_person_from_title_page(client, url, CONTRIBUTOR_WORLDCAT).await
}

/// Page URL for a bare ISNI (spaces removed)
pub fn isni_url(isni: &str) -> String {
    format!("https://isni.org/isni/{}", isni.replace(' ', ""))
}
