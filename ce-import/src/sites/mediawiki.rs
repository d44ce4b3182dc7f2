//! MediaWiki API helpers shared by the CPDL and IMSLP adapters
//!
//! The two wikis answer `prop=revisions` in different shapes: CPDL is queried
//! with `formatversion=2` and returns a list of pages, IMSLP returns an object
//! keyed by page id. Each shape has its own parser.

use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

use super::http::SiteClient;
use crate::error::{ImportError, ImportResult};

/// Batch limit of the MediaWiki `titles=` parameter
pub const MAX_TITLES_PER_QUERY: usize = 50;
const CATEGORY_NAMESPACE: i64 = 14;

/// A page title with its wikitext
#[derive(Debug, Clone, PartialEq)]
pub struct WikiPage {
    pub title: String,
    pub content: String,
}

/// Location of an uploaded file
#[derive(Debug, Clone, PartialEq)]
pub struct ImageInfo {
    /// The file itself
    pub url: String,
    /// The `File:` description page
    pub description_url: String,
}

fn check_batch(titles: &[String]) -> ImportResult<()> {
    if titles.len() > MAX_TITLES_PER_QUERY {
        return Err(ImportError::InvalidInput(format!(
            "can only query up to {} pages, got {}",
            MAX_TITLES_PER_QUERY,
            titles.len()
        )));
    }
    Ok(())
}

/// Titles of the pages directly in a category (subcategory entries excluded)
pub async fn category_members(
    client: &SiteClient,
    api_url: &str,
    category: &str,
) -> ImportResult<Vec<String>> {
    let cmtitle = if category.starts_with("Category:") {
        category.to_string()
    } else {
        format!("Category:{}", category)
    };

    let mut titles = Vec::new();
    let mut cont: Option<String> = None;

    loop {
        let mut params = vec![
            ("action", "query"),
            ("list", "categorymembers"),
            ("cmtitle", cmtitle.as_str()),
            ("cmlimit", "500"),
            ("format", "json"),
        ];
        if let Some(c) = cont.as_deref() {
            params.push(("cmcontinue", c));
        }

        let json = client.get_json(api_url, &params).await?;
        let (page, next) = parse_category_members(&json);
        titles.extend(page);

        match next {
            Some(next) => cont = Some(next),
            None => break,
        }
    }

    info!(site = client.name(), category = %cmtitle, count = titles.len(), "Loaded category members");
    Ok(titles)
}

/// (page titles, continuation token) from a categorymembers response
pub fn parse_category_members(json: &Value) -> (Vec<String>, Option<String>) {
    let titles = json
        .pointer("/query/categorymembers")
        .and_then(Value::as_array)
        .map(|members| {
            members
                .iter()
                .filter(|m| m.get("ns").and_then(Value::as_i64) != Some(CATEGORY_NAMESPACE))
                .filter_map(|m| m.get("title").and_then(Value::as_str).map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    let next = json
        .pointer("/continue/cmcontinue")
        .and_then(Value::as_str)
        .map(str::to_string);

    (titles, next)
}

/// Wikitext for up to 50 pages, CPDL style (`formatversion=2`)
pub async fn revisions_as_list(
    client: &SiteClient,
    api_url: &str,
    titles: &[String],
) -> ImportResult<Vec<WikiPage>> {
    check_batch(titles)?;
    let joined = titles.join("|");
    let params = [
        ("action", "query"),
        ("prop", "revisions"),
        ("titles", joined.as_str()),
        ("rvslots", "main"),
        ("rvprop", "content"),
        ("formatversion", "2"),
        ("format", "json"),
    ];
    let fetched = client.get_ok(api_url, &params).await?;
    // Non-JSON answers (maintenance pages) count as no content
    match fetched.json() {
        Ok(json) => Ok(parse_revisions_list(&json)),
        Err(_) => Ok(Vec::new()),
    }
}

fn page_title(page: &Value) -> &str {
    page.get("title").and_then(Value::as_str).unwrap_or("?")
}

/// Pages from a `formatversion=2` revisions response: `query.pages` is a list
pub fn parse_revisions_list(json: &Value) -> Vec<WikiPage> {
    let pages = match json.pointer("/query/pages").and_then(Value::as_array) {
        Some(pages) => pages,
        None => return Vec::new(),
    };

    pages
        .iter()
        .filter_map(|page| {
            if page.get("invalid").is_some() || page.get("missing").is_some() {
                let title = page_title(page);
                debug!("Skipping page without content: {}", title);
                return None;
            }
            let title = page.get("title")?.as_str()?;
            let content = page
                .pointer("/revisions/0/slots/main/content")
                .and_then(Value::as_str)?;
            Some(WikiPage {
                title: title.to_string(),
                content: content.to_string(),
            })
        })
        .collect()
}

/// Wikitext for up to 50 pages, IMSLP style (legacy format)
pub async fn revisions_by_page_id(
    client: &SiteClient,
    api_url: &str,
    titles: &[String],
) -> ImportResult<Vec<WikiPage>> {
    check_batch(titles)?;
    let joined = titles.join("|");
    let params = [
        ("action", "query"),
        ("prop", "revisions"),
        ("titles", joined.as_str()),
        ("rvprop", "content"),
        ("format", "json"),
    ];
    let fetched = client.get_ok(api_url, &params).await?;
    match fetched.json() {
        Ok(json) => Ok(parse_revisions_by_page_id(&json)),
        Err(_) => Ok(Vec::new()),
    }
}

/// Pages from a legacy revisions response: `query.pages` is keyed by page id
/// and missing pages sit under negative ids
pub fn parse_revisions_by_page_id(json: &Value) -> Vec<WikiPage> {
    let pages = match json.pointer("/query/pages").and_then(Value::as_object) {
        Some(pages) => pages,
        None => return Vec::new(),
    };

    pages
        .iter()
        .filter_map(|(page_id, page)| {
            if page_id.starts_with('-') && page.get("missing").is_some() {
                let title = page_title(page);
                debug!("Missing page: {}", title);
                return None;
            }
            let title = page.get("title")?.as_str()?;
            let revision = page.pointer("/revisions/0")?;
            let content = revision
                .get("*")
                .or_else(|| revision.pointer("/slots/main/*"))
                .and_then(Value::as_str)?;
            Some(WikiPage {
                title: title.to_string(),
                content: content.to_string(),
            })
        })
        .collect()
}

/// Fetch wikitext for any number of titles in batches of 50
pub async fn fetch_in_batches<'a, F, Fut>(
    titles: &'a [String],
    mut fetch: F,
) -> ImportResult<Vec<WikiPage>>
where
    F: FnMut(&'a [String]) -> Fut,
    Fut: std::future::Future<Output = ImportResult<Vec<WikiPage>>>,
{
    let total = titles.len().div_ceil(MAX_TITLES_PER_QUERY);
    let mut all_pages = Vec::with_capacity(titles.len());
    for (i, chunk) in titles.chunks(MAX_TITLES_PER_QUERY).enumerate() {
        debug!("Fetching wikitext batch {}/{}", i + 1, total);
        all_pages.extend(fetch(chunk).await?);
    }
    Ok(all_pages)
}

/// File URLs for up to 50 `File:` titles, keyed by the title as requested
pub async fn image_info(
    client: &SiteClient,
    api_url: &str,
    files: &[String],
) -> ImportResult<HashMap<String, ImageInfo>> {
    check_batch(files)?;
    let joined = files.join("|");
    let params = [
        ("action", "query"),
        ("prop", "imageinfo"),
        ("titles", joined.as_str()),
        ("iiprop", "url"),
        ("format", "json"),
    ];
    let fetched = client.get_ok(api_url, &params).await?;
    match fetched.json() {
        Ok(json) => Ok(parse_image_info(&json, files)),
        Err(_) => Ok(HashMap::new()),
    }
}

/// Map requested titles to their image info, following `query.normalized`
pub fn parse_image_info(json: &Value, requested: &[String]) -> HashMap<String, ImageInfo> {
    let normalized = normalized_titles(json);

    let mut by_title = HashMap::new();
    for page in pages_of(json) {
        let title = match page.get("title").and_then(Value::as_str) {
            Some(t) => t,
            None => continue,
        };
        let info = match page.pointer("/imageinfo/0") {
            Some(info) => info,
            None => continue,
        };
        let url = info.get("url").and_then(Value::as_str);
        let description_url = info.get("descriptionurl").and_then(Value::as_str);
        if let (Some(url), Some(description_url)) = (url, description_url) {
            by_title.insert(
                title.to_string(),
                ImageInfo {
                    url: url.to_string(),
                    description_url: description_url.to_string(),
                },
            );
        }
    }

    requested
        .iter()
        .filter_map(|name| {
            let norm = normalized.get(name).map(String::as_str).unwrap_or(name);
            by_title.get(norm).map(|info| (name.clone(), info.clone()))
        })
        .collect()
}

/// `from -> to` pairs of `query.normalized`
pub fn normalized_titles(json: &Value) -> HashMap<String, String> {
    json.pointer("/query/normalized")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|n| {
                    Some((
                        n.get("from")?.as_str()?.to_string(),
                        n.get("to")?.as_str()?.to_string(),
                    ))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// `query.pages` as a list, whichever shape it came in
pub fn pages_of(json: &Value) -> Vec<&Value> {
    match json.pointer("/query/pages") {
        Some(Value::Array(pages)) => pages.iter().collect(),
        Some(Value::Object(pages)) => pages.values().collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_revisions_list() {
        let json = json!({"query": {"pages": [
            {"title": "Ave Maria (Victoria)", "revisions": [{"slots": {"main": {"content": "{{XML}}"}}}]},
            {"title": "Bad|Title", "invalid": true, "invalidreason": "bad"},
            {"title": "No revisions"}
        ]}});
        let pages = parse_revisions_list(&json);
        assert_eq!(
            pages,
            vec![WikiPage {
                title: "Ave Maria (Victoria)".to_string(),
                content: "{{XML}}".to_string()
            }]
        );
    }

    #[test]
    fn test_parse_revisions_by_page_id() {
        let json = json!({"query": {"pages": {
            "5827": {"pageid": 5827, "title": "Variations", "revisions": [{"*": "{{#fte:imslppage}}"}]},
            "-1": {"title": "Nothing", "missing": ""}
        }}});
        let pages = parse_revisions_by_page_id(&json);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].title, "Variations");
        assert_eq!(pages[0].content, "{{#fte:imslppage}}");
    }

    #[test]
    fn test_skipped_pages_without_title() {
        let list = json!({"query": {"pages": [
            {"missing": true},
            {"invalid": true, "invalidreason": "empty title"},
            {"title": "Kept", "revisions": [{"slots": {"main": {"content": "x"}}}]}
        ]}});
        let by_id = json!({"query": {"pages": {
            "-1": {"missing": ""},
            "-2": {"title": 7, "missing": ""}
        }}});

        let pages = parse_revisions_list(&list);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].title, "Kept");
        assert!(parse_revisions_by_page_id(&by_id).is_empty());
        assert_eq!(page_title(&json!({"title": 7})), "?");
        assert_eq!(page_title(&json!({"title": "Ave Maria"})), "Ave Maria");
    }

    #[test]
    fn test_shapes_are_not_interchangeable() {
        let list_shape = json!({"query": {"pages": [{"title": "A", "revisions": [{"slots": {"main": {"content": "x"}}}]}]}});
        assert!(parse_revisions_by_page_id(&list_shape).is_empty());
        assert_eq!(parse_revisions_list(&list_shape).len(), 1);
    }

    #[test]
    fn test_parse_image_info_follows_normalization() {
        let json = json!({"query": {
            "normalized": [{"from": "File:Torrejon-A_este_sol.mxl", "to": "File:Torrejon-A este sol.mxl"}],
            "pages": {"-1": {
                "title": "File:Torrejon-A este sol.mxl",
                "imageinfo": [{
                    "url": "http://www.cpdl.org/wiki/images/a/ab/Torrejon-A_este_sol.mxl",
                    "descriptionurl": "http://www.cpdl.org/wiki/index.php/File:Torrejon-A_este_sol.mxl"
                }]
            }}
        }});
        let requested = vec!["File:Torrejon-A_este_sol.mxl".to_string(), "File:Other.pdf".to_string()];
        let infos = parse_image_info(&json, &requested);
        assert_eq!(infos.len(), 1);
        assert!(infos["File:Torrejon-A_este_sol.mxl"].url.ends_with(".mxl"));
    }

    #[test]
    fn test_parse_category_members() {
        let json = json!({
            "continue": {"cmcontinue": "page|ABC|123"},
            "query": {"categorymembers": [
                {"ns": 0, "title": "Ave Maria (Victoria)"},
                {"ns": 14, "title": "Category:Motets"}
            ]}
        });
        let (titles, next) = parse_category_members(&json);
        assert_eq!(titles, vec!["Ave Maria (Victoria)"]);
        assert_eq!(next.as_deref(), Some("page|ABC|123"));
    }

    #[tokio::test]
    async fn test_fetch_in_batches_chunks_by_fifty() {
        let titles: Vec<String> = (0..120).map(|i| format!("Page {}", i)).collect();
        let mut sizes = Vec::new();
        let pages = fetch_in_batches(&titles, |chunk| {
            sizes.push(chunk.len());
            let pages: Vec<WikiPage> = chunk
                .iter()
                .map(|t| WikiPage { title: t.clone(), content: String::new() })
                .collect();
            async move { Ok(pages) }
        })
        .await
        .unwrap();

        assert_eq!(sizes, vec![50, 50, 20]);
        assert_eq!(pages.len(), 120);
    }
}
