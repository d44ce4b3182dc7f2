//! Import pipelines end to end: local mock sites in, in-memory CE out

mod helpers;

use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use ce_common::SitesConfig;
use ce_import::sites::{cpdl, imslp, musicbrainz, Sites};
use ce_import::{BatchSummary, Importer, Loader};
use helpers::FakeCe;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

const CREATOR: &str = "https://github.com/trompamusic/ce-data-import/tree/master";

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn importer(ce: &Arc<FakeCe>, sites: SitesConfig) -> Importer {
    let sites = SitesConfig {
        imslp_throttle_ms: [0, 0],
        ..sites
    };
    Importer::new(
        Loader::new(ce.clone(), CREATOR),
        Sites::new(None, &sites).unwrap(),
    )
}

fn titles_param(params: &HashMap<String, String>) -> Vec<String> {
    params
        .get("titles")
        .map(|t| t.split('|').map(str::to_string).collect())
        .unwrap_or_default()
}

fn media_object_by_source(ce: &FakeCe, source: &str) -> String {
    ce.entities("MediaObject")
        .into_iter()
        .find(|e| e.fields.get("source") == Some(&Value::String(source.to_string())))
        .unwrap_or_else(|| panic!("no MediaObject {}", source))
        .identifier
}

// ============================================================================
// CPDL
// ============================================================================

const CPDL_CATEGORY: &str = "Category:Motets";
const CPDL_BYRD_WORK: &str = "Ave verum corpus (William Byrd)";
const CPDL_ANONYMOUS_WORK: &str = "O magnum mysterium (Anonymous)";
const CPDL_NO_XML_WORK: &str = "Lost Song (William Byrd)";

fn cpdl_wikitext(title: &str) -> Option<&'static str> {
    match title {
        CPDL_BYRD_WORK => Some(
            "{{Title|''Ave verum corpus''}}\n\
{{Composer|William Byrd}}\n\
==Music files==\n\
*{{PostedDate|2015-03-01}} {{CPDLno|35000}} [[Media:Byrd-Ave.pdf|{{pdf}}]] [[Media:Byrd-Ave.mxl|{{XML}}]] (Sibelius)\n\
{{Language|Latin}}\n",
        ),
        CPDL_ANONYMOUS_WORK => Some(
            "{{Title|O magnum mysterium}}\n\
{{Composer|Anonymous}}\n\
*{{PostedDate|2016-01-01}} {{CPDLno|36000}} [[Media:Anon-O_magnum.xml|{{XML}}]]\n",
        ),
        CPDL_NO_XML_WORK => Some("{{Composer|William Byrd}}\n*{{CPDLno|1}} [[Media:Lost.pdf|{{pdf}}]]\n"),
        _ => None,
    }
}

/// CPDL `api.php`: category members, `formatversion=2` revisions and imageinfo
async fn cpdl_api(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    if params.get("list").map(String::as_str) == Some("categorymembers") {
        assert_eq!(params.get("cmtitle").map(String::as_str), Some(CPDL_CATEGORY));
        return Json(json!({"query": {"categorymembers": [
            {"ns": 0, "title": CPDL_BYRD_WORK},
            {"ns": 0, "title": CPDL_ANONYMOUS_WORK},
            {"ns": 0, "title": CPDL_NO_XML_WORK}
        ]}}));
    }

    match params.get("prop").map(String::as_str) {
        Some("revisions") => {
            assert_eq!(params.get("formatversion").map(String::as_str), Some("2"));
            let pages: Vec<Value> = titles_param(&params)
                .iter()
                .map(|title| match cpdl_wikitext(title) {
                    Some(content) => json!({"title": title, "revisions": [{"slots": {"main": {"content": content}}}]}),
                    None => json!({"title": title, "missing": true}),
                })
                .collect();
            Json(json!({"query": {"pages": pages}}))
        }
        Some("imageinfo") => {
            let pages: Map<String, Value> = titles_param(&params)
                .iter()
                .enumerate()
                .map(|(i, title)| {
                    let file_name = title.trim_start_matches("File:");
                    (
                        format!("-{}", i + 1),
                        json!({"title": title, "imageinfo": [{
                            "url": format!("http://www.cpdl.org/wiki/images/1/1a/{}", file_name),
                            "descriptionurl": format!("http://www.cpdl.org/wiki/index.php/{}", title)
                        }]}),
                    )
                })
                .collect();
            Json(json!({"query": {"pages": pages}}))
        }
        other => panic!("unexpected CPDL query {:?}", other),
    }
}

#[tokio::test]
async fn test_cpdl_works_link_files_and_skip_missing_composers() {
    let base = spawn(Router::new().route("/wiki/api.php", get(cpdl_api))).await;
    let ce = FakeCe::new();
    let byrd = ce.seed(
        "Person",
        json!({"source": cpdl::page_url("William Byrd"), "contributor": cpdl::CONTRIBUTOR}),
    );
    let importer = importer(
        &ce,
        SitesConfig {
            cpdl: Some(base),
            ..Default::default()
        },
    );

    let summary = importer.import_cpdl_works_for_category(CPDL_CATEGORY).await.unwrap();

    assert_eq!(
        summary,
        BatchSummary {
            total: 2,
            imported: 1,
            skipped: 1,
            failed: 0
        }
    );

    let works = ce.entities("MusicComposition");
    assert_eq!(works.len(), 1);
    assert_eq!(works[0].fields["source"], cpdl::page_url(CPDL_BYRD_WORK));
    assert_eq!(works[0].fields["name"], "Ave verum corpus");

    let composers = ce.merges("MergeMusicCompositionComposer");
    assert_eq!(composers.len(), 1);
    assert_eq!((composers[0].from.as_str(), composers[0].to.as_str()), (works[0].identifier.as_str(), byrd.as_str()));

    let xml_id = media_object_by_source(&ce, "http://www.cpdl.org/wiki/index.php/File:Byrd-Ave.mxl");
    let pdf_id = media_object_by_source(&ce, "http://www.cpdl.org/wiki/index.php/File:Byrd-Ave.pdf");
    assert_eq!(ce.entities("MediaObject").len(), 2);
    assert_eq!(ce.merges("MergeMediaObjectExampleOfWork").len(), 2);

    let derived = ce.merges("MergeMediaObjectWasDerivedFrom");
    assert_eq!(derived.len(), 1);
    assert_eq!((derived[0].from.as_str(), derived[0].to.as_str()), (pdf_id.as_str(), xml_id.as_str()));
}

// ============================================================================
// IMSLP
// ============================================================================

const IMSLP_XML_WORK: &str = "Ave Maria (Test, Composer)";
const IMSLP_PDF_ONLY_WORK: &str = "Sonata (Test, Composer)";

const IMSLP_XML_WIKITEXT: &str = "{{#fte:imslppage\n\
\n\
| *****AUDIO***** =\n\
\n\
| *****FILES***** =\n\
\n\
{{#fte:imslpfile\n\
|File Name 1=PMLP1-Ave_score.pdf\n\
|File Name 2=PMLP1-Ave.mxl\n\
|File Name 3=PMLP1-Ave_parts.xml\n\
|File Name 4=PMLP1-Ave_parts.pdf\n\
|File Description 1=Complete Score\n\
|File Description 2=Complete Score (MusicXML)\n\
|File Description 3=Parts (XML)\n\
|File Description 4=Parts\n\
|Copyright=Creative Commons Attribution 4.0\n\
}}\n\
\n\
| *****WORK INFO*****\n\
\n\
|Work Title=Ave Maria\n\
|Language=Latin\n\
\n\
| *****END OF TEMPLATE***** }}";

const IMSLP_PDF_ONLY_WIKITEXT: &str = "{{#fte:imslppage\n\
\n\
| *****FILES***** =\n\
\n\
{{#fte:imslpfile\n\
|File Name 1=PMLP2-Sonata.pdf\n\
|File Description 1=Complete Score\n\
|Copyright=Public Domain\n\
}}\n\
\n\
| *****WORK INFO*****\n\
\n\
|Work Title=Sonata\n\
\n\
| *****END OF TEMPLATE***** }}";

/// Work and file pages share one html body: file anchors carry the upload number
async fn imslp_page() -> Html<&'static str> {
    Html(
        "<html><head><title>Test work - IMSLP</title></head><body>\
         <a title=\"File:PMLP1-Ave_score.pdf\" href=\"#\">#101</a>\
         <a title=\"File:PMLP1-Ave.mxl\" href=\"#\">#102</a>\
         <a title=\"File:PMLP1-Ave_parts.xml\" href=\"#\">#103</a>\
         <a title=\"File:PMLP1-Ave_parts.pdf\" href=\"#\">#104</a>\
         <a title=\"File:PMLP2-Sonata.pdf\" href=\"#\">#201</a>\
         </body></html>",
    )
}

/// ISCR metadata without a parent, so no composer is imported
async fn imslp_iscr() -> Json<Value> {
    Json(json!({"0": {"extvals": {"Work Title": "Test work", "Language": "Latin"}}}))
}

/// Legacy (page id keyed) revisions
async fn imslp_api(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    assert_eq!(params.get("prop").map(String::as_str), Some("revisions"));
    let pages: Map<String, Value> = titles_param(&params)
        .iter()
        .enumerate()
        .map(|(i, title)| {
            let content = match title.as_str() {
                IMSLP_XML_WORK => Some(IMSLP_XML_WIKITEXT),
                IMSLP_PDF_ONLY_WORK => Some(IMSLP_PDF_ONLY_WIKITEXT),
                _ => None,
            };
            match content {
                Some(content) => (
                    (i + 1).to_string(),
                    json!({"pageid": i + 1, "title": title, "revisions": [{"*": content}]}),
                ),
                None => (format!("-{}", i + 1), json!({"title": title, "missing": ""})),
            }
        })
        .collect();
    Json(json!({"query": {"pages": pages}}))
}

async fn imslp_site() -> String {
    spawn(
        Router::new()
            .route("/api.php", get(imslp_api))
            .route("/imslpscripts/API.ISCR.php", get(imslp_iscr))
            .route("/wiki/*page", get(imslp_page)),
    )
    .await
}

#[tokio::test]
async fn test_imslp_work_without_xml_is_skipped_when_xml_is_needed() {
    let base = imslp_site().await;
    let ce = FakeCe::new();
    let importer = importer(
        &ce,
        SitesConfig {
            imslp: Some(base),
            ..Default::default()
        },
    );
    let url = imslp::page_url(IMSLP_PDF_ONLY_WORK);

    let skipped = importer.load_musiccomposition_from_imslp_url(&url, true).await.unwrap();
    assert!(skipped.is_none());
    assert!(ce.entities("MusicComposition").is_empty());
    assert!(ce.entities("MediaObject").is_empty());

    let imported = importer.load_musiccomposition_from_imslp_url(&url, false).await.unwrap();
    let id = imported.unwrap();
    let stored = ce.entity(&id).unwrap();
    assert_eq!(stored.fields["source"], url);
    assert_eq!(stored.fields["name"], "Test work");
    assert!(ce.entities("MediaObject").is_empty());
}

#[tokio::test]
async fn test_imslp_pdfs_are_derived_from_the_first_xml() {
    let base = imslp_site().await;
    let ce = FakeCe::new();
    let importer = importer(
        &ce,
        SitesConfig {
            imslp: Some(base),
            ..Default::default()
        },
    );

    let composition_id = importer
        .load_musiccomposition_from_imslp_url(&imslp::page_url(IMSLP_XML_WORK), true)
        .await
        .unwrap()
        .unwrap();

    let lookup = |upload: &str| media_object_by_source(&ce, &format!("{}{}", imslp::REVERSE_LOOKUP_URL, upload));
    let score_pdf = lookup("101");
    let mxl = lookup("102");
    let parts_xml = lookup("103");
    let parts_pdf = lookup("104");
    assert_eq!(ce.entities("MediaObject").len(), 4);

    let examples = ce.merges("MergeMediaObjectExampleOfWork");
    assert_eq!(examples.len(), 4);
    assert!(examples.iter().all(|m| m.to == composition_id));

    let mut derived: Vec<(String, String)> = ce
        .merges("MergeMediaObjectWasDerivedFrom")
        .into_iter()
        .map(|m| (m.from, m.to))
        .collect();
    derived.sort();
    let mut expected = vec![(score_pdf, mxl.clone()), (parts_pdf, mxl)];
    expected.sort();
    assert_eq!(derived, expected);
    assert!(ce
        .merges("MergeMediaObjectWasDerivedFrom")
        .iter()
        .all(|m| m.from != parts_xml && m.to != parts_xml));

    let pdf = ce.entity(&lookup("101")).unwrap();
    assert_eq!(pdf.fields["encodingFormat"], "application/pdf");
    assert_eq!(pdf.fields["license"], "Creative Commons Attribution 4.0");
}

// ============================================================================
// MusicBrainz artist
// ============================================================================

const MBID: &str = "4fb1ea86-1d0b-4a2f-9e7d-2b6a6e5c9a01";

async fn mb_artist(Path(mbid): Path<String>, Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    assert_eq!(mbid, MBID);
    assert_eq!(params.get("inc").map(String::as_str), Some("url-rels+artist-rels"));
    Json(json!({
        "id": MBID,
        "name": "Josquin des Prez",
        "type": "Person",
        "life-span": {"begin": "1450", "end": "1521-08-27"},
        "isnis": ["0000000121268987"],
        "relations": [
            {"type-id": musicbrainz::VIAF_REL, "url": {"resource": "https://viaf.org/viaf/100226284"}}
        ]
    }))
}

async fn authority_page(Path(id): Path<String>) -> (StatusCode, Html<String>) {
    (
        StatusCode::OK,
        Html(format!("<html><head><title>Josquin des Prez ({})</title></head></html>", id)),
    )
}

#[tokio::test]
async fn test_musicbrainz_artist_records_are_created_and_linked() {
    let mb = spawn(Router::new().route("/ws/2/artist/:mbid", get(mb_artist))).await;
    let authority = spawn(
        Router::new()
            .route("/viaf/:id", get(authority_page))
            .route("/isni/:id", get(authority_page)),
    )
    .await;
    let ce = FakeCe::new();
    let importer = importer(
        &ce,
        SitesConfig {
            musicbrainz: Some(mb),
            authority: Some(authority),
            ..Default::default()
        },
    );

    let ids = importer.import_artist_musicbrainz(MBID).await.unwrap();

    assert_eq!(ids.len(), 3);
    let sources: Vec<Value> = ids
        .iter()
        .map(|id| ce.entity(id).unwrap().fields["source"].clone())
        .collect();
    assert_eq!(
        sources,
        vec![
            json!(musicbrainz::artist_url(MBID)),
            json!("https://viaf.org/viaf/100226284"),
            json!("https://isni.org/isni/0000000121268987"),
        ]
    );

    let josquin = ce.entity(&ids[0]).unwrap();
    assert_eq!(josquin.fields["title"], "Josquin des Prez - MusicBrainz");
    assert_eq!(josquin.fields["deathDate"], "1521-08-27");
    assert_eq!(ce.entity(&ids[1]).unwrap().fields["title"], "Josquin des Prez (100226284)");

    let links = ce.merges("MergePersonExactMatch");
    assert_eq!(links.len(), 3 * 2);
    assert!(links.iter().all(|m| m.from != m.to));

    // A second run finds every record by source and only relinks
    let again = importer.import_artist_musicbrainz(MBID).await.unwrap();
    assert_eq!(again, ids);
    assert_eq!(ce.entities("Person").len(), 3);
}
