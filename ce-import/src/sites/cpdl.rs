//! Choral Public Domain Library (ChoralWiki)
//!
//! Work pages list editions one per line, each starting with a `{{CPDLno}}`
//! template followed by links to the files of that edition:
//!
//! ```text
//! *{{PostedDate|2014-11-24}} {{CPDLno|33477}} [[Media:A.pdf|{{pdf}}]] [[Media:A.mxl|{{XML}}]] (Finale 2014)
//! ```
//!
//! An edition with exactly one `{{XML}}` link and at most one `{{pdf}}` link
//! becomes an XML MediaObject, plus a PDF derived from it.

use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use super::http::SiteClient;
use super::mediawiki::{self, ImageInfo, WikiPage, MAX_TITLES_PER_QUERY};
use super::wikitext::{self, Node};
use crate::error::ImportResult;
use crate::models::media_object::encoding_format_for;
use crate::models::{
    MediaObject, MusicComposition, Person, LANGUAGE_EN, MIME_MUSICXML, MIME_MUSICXML_COMPRESSED, MIME_PDF,
};

pub const API_URL: &str = "http://www.cpdl.org/wiki/api.php";
pub const CONTRIBUTOR: &str = "https://cpdl.org";
const XML_MARKER: &str = "{{XML}}";
const PDF_MARKER: &str = "{{pdf}}";

/// A work page parsed into a composition and its composer's page name
#[derive(Debug, Clone, PartialEq)]
pub struct CpdlComposition {
    pub work: MusicComposition,
    pub composer: Option<String>,
}

/// `File:` titles of one edition
#[derive(Debug, Clone, PartialEq)]
pub struct FilePair {
    pub xml: String,
    pub pdf: Option<String>,
}

/// MediaObjects of one edition
#[derive(Debug, Clone, PartialEq)]
pub struct CpdlMediaObjects {
    pub xml: MediaObject,
    pub pdf: Option<MediaObject>,
}

/// A composer page with links to the same person elsewhere
#[derive(Debug, Clone, PartialEq)]
pub struct CpdlComposer {
    pub person: Person,
    pub wikipedia: Option<String>,
    pub imslp: Option<String>,
}

/// Page URL on CPDL for a page title
pub fn page_url(title: &str) -> String {
    format!("https://cpdl.org/wiki/index.php/{}", title.replace(' ', "_"))
}

pub async fn get_titles_in_category(client: &SiteClient, category: &str) -> ImportResult<Vec<String>> {
    mediawiki::category_members(client, API_URL, category).await
}

/// Wikitext of up to 50 pages
pub async fn get_wiki_content_for_pages(client: &SiteClient, pages: &[String]) -> ImportResult<Vec<WikiPage>> {
    mediawiki::revisions_as_list(client, API_URL, pages).await
}

pub async fn get_wikitext_for_titles(client: &SiteClient, titles: &[String]) -> ImportResult<Vec<WikiPage>> {
    mediawiki::fetch_in_batches(titles, |chunk| get_wiki_content_for_pages(client, chunk)).await
}

/// Pages containing an `{{XML}}` file link, in their original order
pub fn get_works_with_xml(pages: &[WikiPage]) -> Vec<WikiPage> {
    pages
        .iter()
        .filter(|page| page.content.contains(XML_MARKER))
        .cloned()
        .collect()
}

pub fn composition_wikitext_to_music_composition(page: &WikiPage) -> CpdlComposition {
    let parsed = wikitext::parse(&page.content);
    let mut composer = None;
    let mut in_language = None;
    let mut name = None;

    for template in parsed.filter_templates() {
        match template.name.as_str() {
            "Composer" => composer = template.first_param_text(),
            "Language" => in_language = template.first_param_text(),
            // Titles carry wiki emphasis
            "Title" => name = template.params.first().map(|p| p.value.plain_text().trim().to_string()),
            _ => {}
        }
    }

    let mut work = MusicComposition::new(page_url(&page.title), CONTRIBUTOR);
    work.title = Some(format!("{} - ChoralWiki", page.title));
    work.name = name;
    work.in_language = in_language;

    CpdlComposition { work, composer }
}

/// Editions of a work page that have exactly one XML file
pub fn get_file_pairs_from_composition_wikitext(page: &WikiPage) -> Vec<FilePair> {
    let parsed = wikitext::parse(&page.content);
    let nodes = &parsed.nodes;

    let mut starts: Vec<usize> = nodes
        .iter()
        .enumerate()
        .filter(|(_, node)| matches!(node, Node::Template(t) if t.name == "CPDLno"))
        .map(|(i, _)| i)
        .collect();
    if starts.is_empty() {
        return Vec::new();
    }
    starts.push(nodes.len());

    starts
        .windows(2)
        .filter_map(|range| {
            let links = nodes[range[0]..range[1]].iter().filter_map(|node| match node {
                Node::Wikilink(link) => Some(link),
                _ => None,
            });

            let mut xml = Vec::new();
            let mut pdf = Vec::new();
            for link in links {
                match link.text.as_deref() {
                    Some(XML_MARKER) => xml.push(link.title.replace("Media:", "File:")),
                    Some(PDF_MARKER) => pdf.push(link.title.replace("Media:", "File:")),
                    _ => {}
                }
            }

            if xml.len() == 1 && pdf.len() <= 1 {
                Some(FilePair {
                    xml: xml.remove(0),
                    pdf: pdf.pop(),
                })
            } else {
                None
            }
        })
        .collect()
}

pub async fn get_fileurl_from_media(
    client: &SiteClient,
    media: &[String],
) -> ImportResult<HashMap<String, ImageInfo>> {
    let mut infos = HashMap::new();
    for chunk in media.chunks(MAX_TITLES_PER_QUERY) {
        infos.extend(mediawiki::image_info(client, API_URL, chunk).await?);
    }
    Ok(infos)
}

fn file_name_from_description_url(description_url: &str) -> &str {
    description_url.rsplit('/').next().unwrap_or(description_url)
}

fn media_object(info: &ImageInfo, encoding_format: &str) -> MediaObject {
    let file_name = file_name_from_description_url(&info.description_url);
    let mut mo = MediaObject::new(info.description_url.clone(), CONTRIBUTOR);
    mo.title = Some(format!("{} - ChoralWiki", file_name));
    mo.name = Some(file_name.to_string());
    mo.content_url = Some(info.url.clone());
    mo.encoding_format = Some(encoding_format.to_string());
    mo
}

/// Build MediaObjects for file pairs whose XML file resolved to a
/// `.xml` or `.mxl` URL
pub fn mediaobjects_from_pairs(
    pairs: &[FilePair],
    infos: &HashMap<String, ImageInfo>,
) -> Vec<CpdlMediaObjects> {
    pairs
        .iter()
        .filter_map(|pair| {
            let xml_info = infos.get(&pair.xml)?;
            let format = encoding_format_for(&xml_info.url)
                .filter(|f| *f == MIME_MUSICXML || *f == MIME_MUSICXML_COMPRESSED)?;
            let pdf = pair
                .pdf
                .as_ref()
                .and_then(|pdf| infos.get(pdf))
                .map(|info| media_object(info, MIME_PDF));

            Some(CpdlMediaObjects {
                xml: media_object(xml_info, format),
                pdf,
            })
        })
        .collect()
}

pub async fn composition_wikitext_to_mediaobjects(
    client: &SiteClient,
    page: &WikiPage,
) -> ImportResult<Vec<CpdlMediaObjects>> {
    let pairs = get_file_pairs_from_composition_wikitext(page);
    let file_names: Vec<String> = pairs
        .iter()
        .flat_map(|pair| std::iter::once(pair.xml.clone()).chain(pair.pdf.clone()))
        .collect();
    if file_names.is_empty() {
        return Ok(Vec::new());
    }

    let infos = get_fileurl_from_media(client, &file_names).await?;
    let mediaobjects = mediaobjects_from_pairs(&pairs, &infos);
    debug!(page = %page.title, pairs = pairs.len(), found = mediaobjects.len(), "CPDL files");
    Ok(mediaobjects)
}

/// IMSLP composer categories are "Surname, Given names"; the last word is
/// taken as the surname
fn imslp_category_name(name: &str) -> String {
    let parts: Vec<&str> = name.split(' ').collect();
    match parts.split_last() {
        Some((surname, given)) if !given.is_empty() => format!("{}, {}", surname, given.join(" ")),
        _ => name.to_string(),
    }
}

/// Composer page to a Person plus Wikipedia and IMSLP links
///
/// `WikipediaLink` and `IMSLP` without a parameter point at a page with the
/// same name as the CPDL page.
pub fn composer_wikitext_to_person(page: &WikiPage) -> CpdlComposer {
    let parsed = wikitext::parse(&page.content);
    let name = page.title.as_str();
    let mut wikipedia = None;
    let mut imslp = None;

    for template in parsed.filter_templates() {
        match template.name.as_str() {
            "WikipediaLink" | "WikipediaLink2" => {
                let target = template.first_param_text().unwrap_or_else(|| name.to_string());
                wikipedia = Some(format!("https://en.wikipedia.org/wiki/{}", target));
            }
            "IMSLP" => {
                let target = template.first_param_text().unwrap_or_else(|| name.to_string());
                imslp = Some(format!(
                    "https://imslp.org/wiki/Category:{}",
                    imslp_category_name(&target)
                ));
            }
            _ => {}
        }
    }

    let mut person = Person::new(page_url(name), CONTRIBUTOR).with_title(format!("{} - ChoralWiki", name));
    person.name = Some(name.to_string());
    person.language = Some(LANGUAGE_EN.to_string());

    CpdlComposer {
        person,
        wikipedia,
        imslp,
    }
}

/// Sorted unique composer page names of the given work pages
pub fn get_composers_for_works(works: &[WikiPage]) -> Vec<String> {
    works
        .iter()
        .filter_map(|work| composition_wikitext_to_music_composition(work).composer)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
