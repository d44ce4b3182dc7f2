//! External site adapters
//!
//! Each adapter fetches pages from one site and parses them into flat
//! records from [`crate::models`]. Parsing is kept in pure functions so it can
//! be tested from fixtures; fetching goes through a per-site [`SiteClient`].

pub mod authority;
pub mod cpdl;
pub mod http;
pub mod imslp;
pub mod mediawiki;
pub mod musicbrainz;
pub mod wikidata;
pub mod wikitext;

pub use http::{Fetched, SiteClient};

use ce_common::SitesConfig;

use crate::cache::ResponseCache;
use crate::error::ImportResult;

const CPDL_REQUESTS_PER_SECOND: u32 = 20;
const MUSICBRAINZ_REQUESTS_PER_SECOND: u32 = 1;

/// Links from a composer page to the same person on other sites
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExternalRelations {
    pub viaf: Option<String>,
    pub isni: Option<String>,
    pub loc: Option<String>,
    pub worldcat: Option<String>,
    pub wikidata: Option<String>,
    pub wikipedia: Option<String>,
    pub imslp: Option<String>,
    /// MusicBrainz artist id (not a URL)
    pub musicbrainz: Option<String>,
}

/// One HTTP client per external site, sharing a response cache
pub struct Sites {
    pub imslp: SiteClient,
    pub cpdl: SiteClient,
    pub musicbrainz: SiteClient,
    /// VIAF, ISNI, Library of Congress and Worldcat title pages
    pub authority: SiteClient,
    /// Wikidata and Wikipedia
    pub wikimedia: SiteClient,
}

impl Sites {
    pub fn new(cache: Option<ResponseCache>, config: &SitesConfig) -> ImportResult<Self> {
        let mut imslp = SiteClient::builder("imslp")
            .user_agent(http::BROWSER_USER_AGENT)
            .base_url(config.imslp.as_deref())
            .cache(cache.clone());
        let [min_ms, max_ms] = config.imslp_throttle_ms;
        if max_ms > 0 {
            imslp = imslp.throttle(min_ms, max_ms);
        }

        Ok(Self {
            imslp: imslp.build()?,
            cpdl: SiteClient::builder("cpdl")
                .rate_limit(CPDL_REQUESTS_PER_SECOND)
                .base_url(config.cpdl.as_deref())
                .cache(cache.clone())
                .build()?,
            musicbrainz: SiteClient::builder("musicbrainz")
                .rate_limit(MUSICBRAINZ_REQUESTS_PER_SECOND)
                .base_url(config.musicbrainz.as_deref())
                .cache(cache.clone())
                .build()?,
            authority: SiteClient::builder("authority")
                .base_url(config.authority.as_deref())
                .cache(cache.clone())
                .build()?,
            wikimedia: SiteClient::builder("wikimedia")
                .base_url(config.wikimedia.as_deref())
                .cache(cache)
                .build()?,
        })
    }
}
