//! CPDL category pipelines
//!
//! Composers are imported first, then works: the work pipeline only links
//! to composers already in the CE.

use tracing::{info, warn};

use super::{BatchSummary, Importer};
use crate::error::ImportResult;
use crate::models::{dedup_by_source, EntityKind};
use crate::sites::cpdl::{self, CpdlMediaObjects};
use crate::sites::mediawiki::WikiPage;

impl Importer {
    /// Work pages of a category that have an XML file
    async fn cpdl_works_with_xml(&self, category: &str) -> ImportResult<Vec<WikiPage>> {
        let client = &self.sites.cpdl;
        let titles = cpdl::get_titles_in_category(client, category).await?;
        let pages = cpdl::get_wikitext_for_titles(client, &titles).await?;
        let works = cpdl::get_works_with_xml(&pages);
        info!(category, pages = pages.len(), with_xml = works.len(), "CPDL works");
        Ok(works)
    }

    async fn import_cpdl_composer(&self, page: &WikiPage) -> ImportResult<Vec<String>> {
        let composer = cpdl::composer_wikitext_to_person(page);
        let mut persons = vec![composer.person];

        if let Some(imslp) = &composer.imslp {
            persons.extend(self.load_artist_from_imslp(imslp).await?);
        }
        if let Some(wikipedia) = &composer.wikipedia {
            persons.extend(self.wikipedia_persons(wikipedia).await?);
        }

        self.loader
            .create_persons_and_link(dedup_by_source(persons))
            .await
    }

    /// Import the composers of every work with an XML file in a category,
    /// with their IMSLP and Wikipedia pages
    pub async fn import_cpdl_composers_for_category(&self, category: &str) -> ImportResult<BatchSummary> {
        let works = self.cpdl_works_with_xml(category).await?;
        let composers = cpdl::get_composers_for_works(&works);
        let composer_pages = cpdl::get_wikitext_for_titles(&self.sites.cpdl, &composers).await?;

        let mut summary = BatchSummary::new(composer_pages.len());
        for (i, page) in composer_pages.iter().enumerate() {
            info!("Importing CPDL composer {}/{} {}", i + 1, summary.total, page.title);
            match self.import_cpdl_composer(page).await {
                Ok(_) => summary.imported += 1,
                Err(e) => {
                    warn!("Failed to import composer {}: {}", page.title, e);
                    summary.failed += 1;
                }
            }
        }

        info!("CPDL composers in {}: {}", category, summary);
        Ok(summary)
    }

    async fn import_cpdl_media_objects(
        &self,
        composition_id: &str,
        objects: &[CpdlMediaObjects],
    ) -> ImportResult<()> {
        for pair in objects {
            let xml_id = self.loader.get_or_create_media_object(&pair.xml).await?;
            self.loader
                .link_media_object_example_of_work(&xml_id, composition_id)
                .await?;

            if let Some(pdf) = &pair.pdf {
                let pdf_id = self.loader.get_or_create_media_object(pdf).await?;
                self.loader
                    .link_media_object_example_of_work(&pdf_id, composition_id)
                    .await?;
                self.loader.link_media_object_derived_from(&pdf_id, &xml_id).await?;
            }
        }
        Ok(())
    }

    /// Import one work page; false when its composer is not in the CE yet
    async fn import_cpdl_work(&self, page: &WikiPage) -> ImportResult<bool> {
        let composition = cpdl::composition_wikitext_to_music_composition(page);
        let composer = match &composition.composer {
            Some(composer) => composer,
            None => return Ok(false),
        };

        let composer_id = match self
            .loader
            .find_by_source(EntityKind::Person, &cpdl::page_url(composer))
            .await?
        {
            Some(id) => id,
            None => {
                info!(" - missing composer {}", composer);
                return Ok(false);
            }
        };

        let composition_id = self.loader.get_or_create_composition(&composition.work).await?;
        self.loader
            .link_composition_composers(&composition_id, &[composer_id])
            .await?;

        let objects = cpdl::composition_wikitext_to_mediaobjects(&self.sites.cpdl, page).await?;
        self.import_cpdl_media_objects(&composition_id, &objects).await?;
        Ok(true)
    }

    /// Import every work with an XML file in a category, with its files
    pub async fn import_cpdl_works_for_category(&self, category: &str) -> ImportResult<BatchSummary> {
        let works = self.cpdl_works_with_xml(category).await?;

        let mut summary = BatchSummary::new(works.len());
        for (i, page) in works.iter().enumerate() {
            info!("Importing CPDL work {}/{} {}", i + 1, summary.total, page.title);
            match self.import_cpdl_work(page).await {
                Ok(true) => summary.imported += 1,
                Ok(false) => summary.skipped += 1,
                Err(e) => {
                    warn!("Failed to import work {}: {}", page.title, e);
                    summary.failed += 1;
                }
            }
        }

        info!("CPDL works in {}: {}", category, summary);
        Ok(summary)
    }
}
