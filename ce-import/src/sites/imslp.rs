//! IMSLP (Petrucci Music Library)
//!
//! Metadata comes from three places: the MediaWiki API (wikitext of work
//! pages), the custom `API.ISCR.php` script (parsed composer and work fields)
//! and the html pages themselves (page titles and file permalinks, which no
//! API exposes).
//!
//! A work page is a single `#fte:imslppage` template. Its ` *****FILES***** `
//! parameter holds section headings as text and one `#fte:imslpfile`
//! template per upload group:
//!
//! ```text
//! =====For 2 Trumpets and 2 Trombones (Rondeau)=====
//! {{#fte:imslpfile
//! |File Name 1=PMLP98884-ResAcGotALL.pdf
//! |File Name 2=PMLP98884-ResAcGot.zip
//! |File Description 1=Complete Score & Parts
//! |File Description 2=Engraving files (Finale & XML)
//! |Copyright=Creative Commons Attribution 4.0
//! }}
//! ```

use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use super::authority::page_title;
use super::http::SiteClient;
use super::mediawiki::{self, WikiPage, MAX_TITLES_PER_QUERY};
use super::wikitext::{self, Node, Template, Wikicode};
use super::ExternalRelations;
use crate::error::{ImportError, ImportResult};
use crate::models::media_object::encoding_format_for;
use crate::models::{MediaObject, MusicComposition, Person, LANGUAGE_EN};

pub const API_URL: &str = "https://imslp.org/api.php";
pub const ISCR_API_URL: &str = "https://imslp.org/imslpscripts/API.ISCR.php";
pub const WIKI_URL: &str = "https://imslp.org/wiki/";
pub const REVERSE_LOOKUP_URL: &str = "https://imslp.org/wiki/Special:ReverseLookup/";
pub const CONTRIBUTOR: &str = "https://imslp.org";
/// Skips the copyright disclaimer page on downloads
pub const DISCLAIMER_COOKIE: &str = "imslpdisclaimeraccepted=yes";

const PAGE_TEMPLATE: &str = "#fte:imslppage";
const FILE_TEMPLATE: &str = "#fte:imslpfile";
const FILES_PARAM: &str = "*****FILES*****";

/// Work language names on IMSLP mapped to language codes
const LANGUAGE_CODES: &[(&str, &str)] = &[
    ("english", "en"),
    ("german", "de"),
    ("spanish", "es"),
    ("french", "fr"),
    ("dutch", "nl"),
    ("catalan", "ca"),
];

/// A work page parsed into a composition and its composer category
#[derive(Debug, Clone, PartialEq)]
pub struct ImslpWork {
    pub work: MusicComposition,
    /// Composer category page, e.g. `Category:Beethoven, Ludwig van`
    pub composer: Option<String>,
}

/// One upload of a work
#[derive(Debug, Clone, PartialEq)]
pub struct ImslpFile {
    pub media_object: MediaObject,
    /// Whether the file description mentions XML
    pub xml: bool,
}

/// An `#fte:imslpfile` template flattened into its files
#[derive(Debug, Clone, PartialEq)]
pub struct FileGroup {
    /// Heading of the section the group sits in
    pub section: Option<String>,
    /// (file name without `File:`, description) in template order
    pub files: Vec<(String, String)>,
    pub license: Option<String>,
}

/// Everything needed to import one work page
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionPage {
    pub work: ImslpWork,
    /// Files of the first upload group that contains XML
    pub files: Vec<ImslpFile>,
}

/// `YYYY-MM-DD` when all three parts are present and numeric
///
/// Partial dates (year and month only) and approximate ones (`c 1600`) give
/// no date.
pub fn parse_imslp_date(year: Option<&str>, month: Option<&str>, day: Option<&str>) -> Option<String> {
    let year: u32 = year?.trim().parse().ok()?;
    let month: u32 = month?.trim().parse().ok()?;
    let day: u32 = day?.trim().parse().ok()?;
    Some(format!("{:04}-{:02}-{:02}", year, month, day))
}

/// Page name of an IMSLP wiki URL, with spaces instead of underscores
pub fn page_name_from_url(url: &str) -> String {
    let name = url
        .strip_prefix(WIKI_URL)
        .or_else(|| url.strip_prefix("http://imslp.org/wiki/"))
        .unwrap_or(url);
    let decoded = urlencoding::decode(name)
        .map(|n| n.into_owned())
        .unwrap_or_else(|_| name.to_string());
    decoded.replace('_', " ")
}

pub fn page_url(page_name: &str) -> String {
    format!("{}{}", WIKI_URL, page_name.replace(' ', "_"))
}

// ============================================================================
// MediaWiki API
// ============================================================================

pub async fn category_pagelist(client: &SiteClient, category: &str) -> ImportResult<Vec<String>> {
    info!("Getting pages for category {}", category);
    mediawiki::category_members(client, API_URL, category).await
}

/// Wikitext of up to 50 pages
pub async fn get_wiki_content_for_pages(client: &SiteClient, pages: &[String]) -> ImportResult<Vec<WikiPage>> {
    mediawiki::revisions_by_page_id(client, API_URL, pages).await
}

/// Wikitext of a single page
pub async fn get_wiki_content_for_page(client: &SiteClient, page_name: &str) -> ImportResult<Option<WikiPage>> {
    let mut pages = get_wiki_content_for_pages(client, &[page_name.to_string()]).await?;
    Ok(pages.pop())
}

/// Download URL of a `File:` page
pub async fn imslp_file_url_to_download_url(client: &SiteClient, file_name: &str) -> ImportResult<Option<String>> {
    let infos = mediawiki::image_info(client, API_URL, &[file_name.to_string()]).await?;
    Ok(infos.get(file_name).map(|info| absolute_url(&info.url)))
}

/// IMSLP returns protocol-relative file URLs
fn absolute_url(url: &str) -> String {
    if url.starts_with("//") {
        format!("https:{}", url)
    } else {
        url.to_string()
    }
}

pub async fn download_imslp_url(client: &SiteClient, download_url: &str) -> ImportResult<Vec<u8>> {
    client.download(download_url, Some(DISCLAIMER_COOKIE)).await
}

// ============================================================================
// ISCR API
// ============================================================================

/// Page id for the ISCR API: base64 of the percent-encoded page name
pub fn api_page_id(page_name: &str) -> String {
    let quoted = urlencoding::encode(page_name).replace("%2F", "/");
    base64::engine::general_purpose::STANDARD.encode(quoted)
}

/// Parsed metadata of a page, or an empty object if the API gave no JSON
pub async fn imslp_api_raw_query(client: &SiteClient, page_name: &str) -> ImportResult<Value> {
    let url = format!(
        "{}?retformat=json/disclaimer=accepted/type=0/id={}",
        ISCR_API_URL,
        api_page_id(page_name)
    );
    let fetched = client.get(&url, &[]).await?;
    match fetched.json() {
        Ok(json) => Ok(json),
        Err(_) => {
            warn!(page = page_name, status = fetched.status, "IMSLP API returned no JSON");
            Ok(Value::Object(Default::default()))
        }
    }
}

fn str_field<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value.get(field).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Person fields of a composer API response, with its permalink as source
///
/// The title is left unset; it comes from the html page.
pub fn composer_from_api(response: &Value) -> Option<Person> {
    let composer = response.get("0")?;
    let source = str_field(composer, "permlink")?;
    let intvals = composer.get("intvals").cloned().unwrap_or(Value::Null);
    let extvals = composer.get("extvals").cloned().unwrap_or(Value::Null);

    let mut person = Person::new(source, CONTRIBUTOR);
    person.language = Some(LANGUAGE_EN.to_string());
    person.name = str_field(&intvals, "normalname").map(str::to_string);
    person.family_name = str_field(&intvals, "lastname").map(str::to_string);
    person.given_name = str_field(&intvals, "firstname").map(str::to_string);
    person.gender = str_field(&extvals, "Sex").map(str::to_string);
    person.image = str_field(&intvals, "picturelinkraw").map(|path| format!("https://imslp.org{}", path));
    person.birth_date = parse_imslp_date(
        str_field(&extvals, "Born Year"),
        str_field(&extvals, "Born Month"),
        str_field(&extvals, "Born Day"),
    );
    person.death_date = parse_imslp_date(
        str_field(&extvals, "Died Year"),
        str_field(&extvals, "Died Month"),
        str_field(&extvals, "Died Day"),
    );
    Some(person)
}

/// Authority links of a composer API response
///
/// Each authority is a `[wikilink, url, identifier]` triple.
pub fn relations_from_api(response: &Value) -> ExternalRelations {
    let mut relations = ExternalRelations::default();
    let authorities = response
        .pointer("/0/intvals/wikidata/authorities")
        .and_then(Value::as_array);

    for authority in authorities.into_iter().flatten() {
        let parts: Vec<&str> = match authority.as_array() {
            Some(parts) if parts.len() >= 3 => parts.iter().map(|p| p.as_str().unwrap_or_default()).collect(),
            _ => continue,
        };
        let (link, url, identifier) = (parts[0], parts[1].to_string(), parts[2]);

        if identifier == "Worldcat" {
            relations.worldcat = Some(url);
        } else if link == "[[wikipedia:Virtual International Authority File|VIAF]]" {
            relations.viaf = Some(url);
        } else if identifier == "Wikipedia" {
            relations.wikipedia = Some(url);
        } else if link == "[[wikipedia:MusicBrainz|MusicBrainz]]" {
            relations.musicbrainz = Some(identifier.to_string());
        } else if link == "[[wikipedia:International Standard Name Identifier|ISNI]]" {
            relations.isni = Some(url);
        } else if link == "[[wikipedia:Library of Congress Control Number|LCCN]]" {
            relations.loc = Some(url);
        }
    }

    relations
}

/// `<title>` of an html page, None on an HTTP error status
pub async fn get_page_title(client: &SiteClient, url: &str) -> ImportResult<Option<String>> {
    let fetched = client.get(url, &[]).await?;
    if !fetched.is_success() {
        debug!(url, status = fetched.status, "No IMSLP page");
        return Ok(None);
    }
    Ok(page_title(&fetched.body))
}

/// Composer from its category page name, e.g. `Category:Beethoven, Ludwig van`
pub async fn api_composer(client: &SiteClient, composer_name: &str) -> ImportResult<Option<Person>> {
    let response = imslp_api_raw_query(client, composer_name).await?;
    let mut person = match composer_from_api(&response) {
        Some(person) => person,
        None => return Ok(None),
    };

    // The html page must exist for the record to be kept
    let source = person.source.clone();
    let fetched = client.get(&source, &[]).await?;
    if !fetched.is_success() {
        return Ok(None);
    }
    person.title = page_title(&fetched.body);
    Ok(Some(person))
}

pub async fn api_composer_get_relations(client: &SiteClient, composer_name: &str) -> ImportResult<ExternalRelations> {
    let response = imslp_api_raw_query(client, composer_name).await?;
    Ok(relations_from_api(&response))
}

/// Composition from the work page URL, its html title and its API response
pub fn work_from_api(url: &str, title: Option<String>, response: &Value) -> ImslpWork {
    let page = response.get("0").cloned().unwrap_or(Value::Null);
    let extvals = page.get("extvals").cloned().unwrap_or(Value::Null);

    let in_language = str_field(&extvals, "Language").and_then(|language| {
        let code = LANGUAGE_CODES
            .iter()
            .find(|(name, _)| *name == language.to_lowercase())
            .map(|(_, code)| code.to_string());
        if code.is_none() {
            warn!("No mapping for language {}", language);
        }
        code
    });

    let mut work = MusicComposition::new(url, CONTRIBUTOR);
    work.title = title;
    work.name = str_field(&extvals, "Work Title").map(str::to_string);
    work.in_language = in_language;

    ImslpWork {
        work,
        composer: str_field(&page, "parent").map(str::to_string),
    }
}

/// Work from its page name, None if the html page does not exist
pub async fn api_work(client: &SiteClient, work_name: &str) -> ImportResult<Option<ImslpWork>> {
    let url = page_url(work_name);
    let fetched = client.get(&url, &[]).await?;
    if !fetched.is_success() {
        return Ok(None);
    }
    let response = imslp_api_raw_query(client, work_name).await?;
    Ok(Some(work_from_api(&url, page_title(&fetched.body), &response)))
}

/// Sorted unique composer categories of the given works
///
/// Works the API does not know are skipped.
pub async fn get_composers_for_works(client: &SiteClient, work_names: &[String]) -> ImportResult<Vec<String>> {
    let total = work_names.len();
    let mut composers = BTreeSet::new();
    for (i, work_name) in work_names.iter().enumerate() {
        debug!("Composer lookup {}/{}", i + 1, total);
        let response = imslp_api_raw_query(client, work_name).await?;
        if let Some(parent) = response.pointer("/0/parent").and_then(Value::as_str) {
            composers.insert(parent.to_string());
        }
    }
    Ok(composers.into_iter().collect())
}

// ============================================================================
// Work wikitext
// ============================================================================

fn is_xml_description(description: &str) -> bool {
    description.contains("XML")
}

fn is_file_template(template: &Template) -> bool {
    template.name == FILE_TEMPLATE
}

/// Value of the ` *****FILES***** ` parameter of the page template
fn files_section(parsed: &Wikicode) -> Option<&Wikicode> {
    let page = parsed.templates().find(|t| t.name == PAGE_TEMPLATE)?;
    page.get(FILES_PARAM).map(|param| &param.value)
}

/// Whether any file template on the page has a description mentioning XML
pub fn page_has_mxml(page: &WikiPage) -> bool {
    let parsed = wikitext::parse(&page.content);
    let first = match parsed.filter_templates().into_iter().next() {
        Some(template) => template,
        None => return false,
    };

    first.params.iter().any(|param| {
        param
            .value
            .filter_templates()
            .into_iter()
            .filter(|t| is_file_template(t))
            .any(|t| {
                t.params
                    .iter()
                    .any(|p| p.name.contains("File Description") && is_xml_description(p.value.raw()))
            })
    })
}

static SECTION_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new("=====(.*)=====").expect("section heading pattern"));

fn section_heading(text: &str) -> Option<String> {
    SECTION_HEADING.captures(text).map(|caps| caps[1].to_string())
}

fn file_group(template: &Template, previous: Option<&Node>) -> FileGroup {
    let values = template.named_values();
    let get = |name: &str| {
        values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    };

    let num_files = values.iter().filter(|(n, _)| n.starts_with("File Name")).count();
    let files = (1..=num_files)
        .filter_map(|i| {
            let name = get(&format!("File Name {}", i))?;
            let description = get(&format!("File Description {}", i)).unwrap_or_default();
            Some((name, description))
        })
        .collect();

    let section = match previous {
        Some(Node::Text(text)) => section_heading(text),
        _ => None,
    };

    FileGroup {
        section,
        files,
        license: get("Copyright").filter(|l| !l.is_empty()),
    }
}

/// All upload groups of a work page, in order
pub fn file_groups(page: &WikiPage) -> Vec<FileGroup> {
    let parsed = wikitext::parse(&page.content);
    let files = match files_section(&parsed) {
        Some(files) => files,
        None => return Vec::new(),
    };

    let mut groups = Vec::new();
    let mut previous: Option<&Node> = None;
    for node in &files.nodes {
        if let Node::Template(template) = node {
            if is_file_template(template) {
                groups.push(file_group(template, previous));
            }
        }
        previous = Some(node);
    }
    groups
}

/// The first upload group with a file described as XML
pub fn xml_file_group(page: &WikiPage) -> Option<FileGroup> {
    file_groups(page)
        .into_iter()
        .find(|group| group.files.iter().any(|(_, desc)| is_xml_description(desc)))
}

/// The upload group containing `file_name` (with or without `File:`)
pub fn file_group_for_filename(page: &WikiPage, file_name: &str) -> Option<FileGroup> {
    let file_name = file_name.strip_prefix("File:").unwrap_or(file_name);
    file_groups(page)
        .into_iter()
        .find(|group| group.files.iter().any(|(name, _)| name == file_name))
        .map(|group| FileGroup {
            files: group.files.into_iter().filter(|(name, _)| name == file_name).collect(),
            ..group
        })
}

// ============================================================================
// Html scraping
// ============================================================================

/// Reverse lookup URL of `file_title` from a work page's html
///
/// The file's anchor text is its upload number, e.g. `#51109`.
pub fn permalink_from_html(html: &str, file_title: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("a[title]").ok()?;
    document
        .select(&selector)
        .find(|a| a.value().attr("title") == Some(file_title))
        .map(|a| a.text().collect::<String>())
        .map(|text| format!("{}{}", REVERSE_LOOKUP_URL, text.trim().trim_start_matches('#')))
}

/// `File:` title of upload `file_id` on a work page's html
pub fn file_title_from_reverse_lookup_html(html: &str, file_id: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let div_selector = Selector::parse(&format!("div#IMSLP{}", file_id)).ok()?;
    let link_selector = Selector::parse("a").ok()?;
    let anchor = format!("#{}", file_id);

    let div = document.select(&div_selector).next()?;
    let link = div
        .select(&link_selector)
        .find(|a| a.text().collect::<String>().trim() == anchor)?;
    link.value().attr("title").map(str::to_string)
}

pub async fn get_permalink_from_filename(
    client: &SiteClient,
    work_page: &str,
    file_title: &str,
) -> ImportResult<Option<String>> {
    let fetched = client.get_ok(&page_url(work_page), &[]).await?;
    Ok(permalink_from_html(&fetched.body, file_title))
}

/// Work page name and `File:` title a `Special:ReverseLookup` URL points to
pub async fn get_composition_and_filename_from_permalink(
    client: &SiteClient,
    permalink: &str,
) -> ImportResult<(String, String)> {
    let file_id = permalink.strip_prefix(REVERSE_LOOKUP_URL).ok_or_else(|| {
        ImportError::InvalidInput(format!("Permalink must be a reverse lookup: {}", permalink))
    })?;

    let fetched = client.get_ok(permalink, &[]).await?;
    let page_name = page_name_from_url(&fetched.url);
    let file_title = file_title_from_reverse_lookup_html(&fetched.body, file_id)
        .ok_or_else(|| ImportError::Parse(format!("No upload #{} on {}", file_id, fetched.url)))?;

    Ok((page_name, file_title))
}

// ============================================================================
// MediaObjects
// ============================================================================

async fn group_to_files(client: &SiteClient, page: &WikiPage, group: FileGroup) -> ImportResult<Vec<ImslpFile>> {
    let work_url = page_url(&page.title);
    let mut files = Vec::with_capacity(group.files.len());

    for (name, description) in group.files {
        let file_title = format!("File:{}", name);
        let file_page = page_url(&file_title);
        let permalink = get_permalink_from_filename(client, &page.title, &file_title).await?;

        let mut mo = MediaObject::new(permalink.unwrap_or_else(|| file_page.clone()), CONTRIBUTOR);
        mo.title = get_page_title(client, &file_page).await?;
        mo.name = Some(file_title);
        mo.url = Some(work_url.clone());
        mo.language = Some(LANGUAGE_EN.to_string());
        mo.license = group.license.clone();
        mo.encoding_format = encoding_format_for(&name).map(str::to_string);
        mo.description = Some(match &group.section {
            Some(section) => format!("{}, {}", section, description),
            None => description.clone(),
        });

        files.push(ImslpFile {
            media_object: mo,
            xml: is_xml_description(&description),
        });
    }

    Ok(files)
}

/// Files of the first upload group with an XML file
pub async fn files_for_work(client: &SiteClient, page: &WikiPage) -> ImportResult<Vec<ImslpFile>> {
    match xml_file_group(page) {
        Some(group) => group_to_files(client, page, group).await,
        None => Ok(Vec::new()),
    }
}

/// MediaObject for a single file of a work page
pub async fn get_mediaobject_for_filename(
    client: &SiteClient,
    page: &WikiPage,
    file_name: &str,
) -> ImportResult<Option<ImslpFile>> {
    match file_group_for_filename(page, file_name) {
        Some(group) => Ok(group_to_files(client, page, group).await?.pop()),
        None => Ok(None),
    }
}

/// Page names of the works (from `work_names`) that have an XML upload
pub async fn filter_works_for_xml(client: &SiteClient, work_names: &[String]) -> ImportResult<Vec<String>> {
    let total = work_names.len();
    let mut done = 0;
    let mut xml_works = Vec::new();
    for chunk in work_names.chunks(MAX_TITLES_PER_QUERY) {
        done += chunk.len();
        info!("Checking works for XML {}/{}", done, total);
        let pages = get_wiki_content_for_pages(client, chunk).await?;
        xml_works.extend(pages.into_iter().filter(page_has_mxml).map(|p| p.title));
    }
    Ok(xml_works)
}

/// Composition and XML files of a work page URL
pub async fn get_composition_page(client: &SiteClient, url: &str) -> ImportResult<Option<CompositionPage>> {
    let page_name = page_name_from_url(url);
    let work = match api_work(client, &page_name).await? {
        Some(work) => work,
        None => return Ok(None),
    };
    let files = match get_wiki_content_for_page(client, &page_name).await? {
        Some(page) => files_for_work(client, &page).await?,
        None => Vec::new(),
    };
    Ok(Some(CompositionPage { work, files }))
}
