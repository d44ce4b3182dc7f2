//! Point an IMSLP zip MediaObject at the MusicXML file inside the archive
//!
//! The archive is not re-hosted. `contentUrl` becomes a hash-based arcp URL
//! naming the archive by the sha-256 of its bytes and the member by its path.

use std::io::Cursor;

use base64::Engine;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::info;

use super::Importer;
use crate::error::ImportResult;
use crate::graphql::MutationArgs;
use crate::models::MIME_MUSICXML;
use crate::sites::imslp;

const MEDIA_OBJECT_FIELDS: &[&str] = &["name", "contributor", "url", "contentUrl"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZipOutcome {
    /// contentUrl was set to the arcp URL
    Updated { content_url: String },
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NotFound,
    HasContentUrl,
    NotImslp,
    NotZip,
    NoDownloadUrl,
    BadArchive,
    NoXmlMember,
    ManyXmlMembers(Vec<String>),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NotFound => write!(f, "Cannot find a MediaObject"),
            SkipReason::HasContentUrl => write!(f, "contentUrl is already set"),
            SkipReason::NotImslp => write!(f, "Contributor isn't IMSLP"),
            SkipReason::NotZip => write!(f, "File doesn't appear to be a zip"),
            SkipReason::NoDownloadUrl => write!(f, "Could not find download url from the name"),
            SkipReason::BadArchive => write!(f, "Contents doesn't appear to be a zip file"),
            SkipReason::NoXmlMember => write!(f, "Could not find any xml files"),
            SkipReason::ManyXmlMembers(names) => write!(f, "Got more than 1 xml file: {:?}", names),
        }
    }
}

fn field<'a>(media_object: &'a Value, name: &str) -> Option<&'a str> {
    media_object
        .get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Why a loaded MediaObject cannot be extracted, if it cannot
fn check_media_object(media_object: &Value) -> Result<&str, SkipReason> {
    if field(media_object, "contentUrl").is_some() {
        return Err(SkipReason::HasContentUrl);
    }
    if field(media_object, "contributor") != Some(imslp::CONTRIBUTOR) {
        return Err(SkipReason::NotImslp);
    }
    match field(media_object, "name") {
        Some(name) if name.to_lowercase().ends_with(".zip") => Ok(name),
        _ => Err(SkipReason::NotZip),
    }
}

/// The single `.xml` member of a zip archive
pub fn xml_member(archive: &[u8]) -> Result<String, SkipReason> {
    let zip = zip::ZipArchive::new(Cursor::new(archive)).map_err(|_| SkipReason::BadArchive)?;
    let mut names: Vec<String> = zip
        .file_names()
        .filter(|name| name.to_lowercase().ends_with(".xml"))
        .map(str::to_string)
        .collect();
    match names.len() {
        0 => Err(SkipReason::NoXmlMember),
        1 => Ok(names.remove(0)),
        _ => {
            names.sort();
            Err(SkipReason::ManyXmlMembers(names))
        }
    }
}

/// `arcp://ni,sha-256;<base64 of the hex digest>/<member>`
pub fn arcp_content_url(archive: &[u8], member: &str) -> String {
    let hex_digest = format!("{:x}", Sha256::digest(archive));
    let encoded = base64::engine::general_purpose::STANDARD.encode(hex_digest.as_bytes());
    format!("arcp://ni,sha-256;{}/{}", encoded, member)
}

impl Importer {
    pub async fn extract_imslp_zip(&self, mediaobject_id: &str) -> ImportResult<ZipOutcome> {
        let skip = |reason: SkipReason| -> ImportResult<ZipOutcome> {
            info!("{}, skipping", reason);
            Ok(ZipOutcome::Skipped(reason))
        };

        let media_object = match self
            .loader
            .load_media_object(mediaobject_id, MEDIA_OBJECT_FIELDS)
            .await?
        {
            Some(mo) => mo,
            None => return skip(SkipReason::NotFound),
        };

        let name = match check_media_object(&media_object) {
            Ok(name) => name.to_string(),
            Err(reason) => return skip(reason),
        };
        info!("Processing: {}", name);

        let download_url = match imslp::imslp_file_url_to_download_url(&self.sites.imslp, &name).await? {
            Some(url) => url,
            None => return skip(SkipReason::NoDownloadUrl),
        };

        let archive = imslp::download_imslp_url(&self.sites.imslp, &download_url).await?;
        let member = match xml_member(&archive) {
            Ok(member) => member,
            Err(reason) => return skip(reason),
        };

        let content_url = arcp_content_url(&archive, &member);
        let args = MutationArgs::new()
            .str("contentUrl", Some(content_url.as_str()))
            .str("encodingFormat", Some(MIME_MUSICXML));
        self.loader.update_media_object(mediaobject_id, &args).await?;
        info!(mediaobject_id, content_url = %content_url, "Updated MediaObject");

        Ok(ZipOutcome::Updated { content_url })
    }
}
