//! Composer identity resolution across sites
//!
//! Starting from one page of a composer, every linked page on another site
//! becomes a Person record. The records are deduplicated by source; the
//! caller then creates them and links them all as exact matches.

use tracing::{debug, info};

use super::Importer;
use crate::error::{ImportError, ImportResult};
use crate::models::{dedup_by_source, Person};
use crate::sites::{authority, imslp, musicbrainz, wikidata};

impl Importer {
    /// Wikidata and Wikipedia (English) records for a wikidata entity URL
    async fn wikidata_persons(&self, wikidata_url: &str) -> ImportResult<Vec<Person>> {
        let client = &self.sites.wikimedia;
        let mut persons = Vec::new();
        persons.extend(wikidata::load_person_from_wikidata(client, wikidata_url).await?);
        persons.extend(wikidata::load_person_from_wikipedia(client, wikidata_url, "en").await?);
        Ok(persons)
    }

    /// Wikidata and Wikipedia records reached from an English Wikipedia URL
    pub(crate) async fn wikipedia_persons(&self, wikipedia_url: &str) -> ImportResult<Vec<Person>> {
        match wikidata::get_wikidata_id_from_wikipedia_url(&self.sites.wikimedia, wikipedia_url).await? {
            Some(id) => self.wikidata_persons(&wikidata::wikidata_url(&id)).await,
            None => {
                debug!(wikipedia_url, "Wikipedia page has no wikidata item");
                Ok(Vec::new())
            }
        }
    }

    /// The MusicBrainz artist (and group members) plus every linked authority page
    pub async fn load_artist_from_musicbrainz(&self, mbid: &str) -> ImportResult<Vec<Person>> {
        info!("Importing musicbrainz artist {}", mbid);
        let mb = &self.sites.musicbrainz;
        let authority = &self.sites.authority;

        let mut persons = musicbrainz::load_persons_from_musicbrainz(mb, mbid).await?;
        let rels = musicbrainz::load_person_relations_from_musicbrainz(mb, mbid).await?;

        if let Some(url) = &rels.viaf {
            persons.extend(authority::load_person_from_viaf(authority, url).await?);
        }
        if let Some(url) = &rels.imslp {
            let name = imslp::page_name_from_url(url);
            persons.extend(imslp::api_composer(&self.sites.imslp, &name).await?);
        }
        if let Some(url) = &rels.worldcat {
            persons.extend(authority::load_person_from_worldcat(authority, url).await?);
        }
        if let Some(url) = &rels.loc {
            persons.extend(authority::load_person_from_loc(authority, url).await?);
        }
        if let Some(isni) = &rels.isni {
            persons.extend(authority::load_person_from_isni(authority, &authority::isni_url(isni)).await?);
        }
        if let Some(url) = &rels.wikidata {
            persons.extend(self.wikidata_persons(url).await?);
        }

        Ok(dedup_by_source(persons))
    }

    /// The IMSLP composer plus every linked authority page
    ///
    /// `url` must be a composer `Category:` page. When IMSLP has no
    /// MusicBrainz link, MusicBrainz is asked for an artist linking back to
    /// the IMSLP page.
    pub async fn load_artist_from_imslp(&self, url: &str) -> ImportResult<Vec<Person>> {
        info!("Importing imslp artist {}", url);
        if !url.contains("Category:") {
            return Err(ImportError::InvalidInput(format!(
                "Url should be an imslp Category: url, got {}",
                url
            )));
        }

        let name = imslp::page_name_from_url(url);
        let client = &self.sites.imslp;
        let authority = &self.sites.authority;

        let mut persons = Vec::new();
        persons.extend(imslp::api_composer(client, &name).await?);

        let rels = imslp::api_composer_get_relations(client, &name).await?;
        if let Some(url) = &rels.worldcat {
            persons.extend(authority::load_person_from_worldcat(authority, url).await?);
        }
        if let Some(url) = &rels.viaf {
            persons.extend(authority::load_person_from_viaf(authority, url).await?);
        }
        if let Some(url) = &rels.wikipedia {
            persons.extend(self.wikipedia_persons(url).await?);
        }
        if let Some(mbid) = &rels.musicbrainz {
            persons.push(musicbrainz::load_person_from_musicbrainz(&self.sites.musicbrainz, mbid).await?);
        }
        if let Some(url) = &rels.isni {
            persons.extend(authority::load_person_from_isni(authority, url).await?);
        }
        if let Some(url) = &rels.loc {
            persons.extend(authority::load_person_from_loc(authority, url).await?);
        }

        if rels.musicbrainz.is_none() {
            let mb = &self.sites.musicbrainz;
            if let Some(mbid) = musicbrainz::get_artist_mbid_by_imslp_url(mb, &imslp::page_url(&name)).await? {
                debug!(mbid = %mbid, "Found MusicBrainz artist by reverse lookup");
                persons.push(musicbrainz::load_person_from_musicbrainz(mb, &mbid).await?);
            }
        }

        Ok(dedup_by_source(persons))
    }

    /// Load a MusicBrainz artist, write every record and link them
    pub async fn import_artist_musicbrainz(&self, mbid: &str) -> ImportResult<Vec<String>> {
        let persons = self.load_artist_from_musicbrainz(mbid).await?;
        self.loader.create_persons_and_link(persons).await
    }

    /// Load an IMSLP composer, write every record and link them
    pub async fn import_artist_imslp(&self, url: &str) -> ImportResult<Vec<String>> {
        let persons = self.load_artist_from_imslp(url).await?;
        self.loader.create_persons_and_link(persons).await
    }
}
