//! Work pipelines: composition, composer, parts and score files

use tracing::{info, warn};

use super::{BatchSummary, Importer};
use crate::error::{ImportError, ImportResult};
use crate::sites::imslp::{self, ImslpFile};
use crate::sites::musicbrainz;

impl Importer {
    /// Import a MusicBrainz work with its composer and parts
    ///
    /// The composer is linked to the work and to every part.
    pub async fn load_musiccomposition_from_musicbrainz(&self, mbid: &str) -> ImportResult<String> {
        info!("Importing musicbrainz work {}", mbid);
        let meta = musicbrainz::load_work_from_musicbrainz(&self.sites.musicbrainz, mbid).await?;

        let composition_id = self.loader.get_or_create_composition(&meta.work).await?;

        let composer_ids = match &meta.composer_mbid {
            Some(composer) => self.import_artist_musicbrainz(composer).await?,
            None => {
                warn!(mbid, "Work has no composer relation");
                Vec::new()
            }
        };

        let mut part_ids = Vec::with_capacity(meta.parts.len());
        for part in &meta.parts {
            part_ids.push(self.loader.get_or_create_composition(part).await?);
        }

        self.loader.link_composition_parts(&composition_id, &part_ids).await?;
        self.loader
            .link_composition_composers(&composition_id, &composer_ids)
            .await?;
        for part_id in &part_ids {
            self.loader.link_composition_composers(part_id, &composer_ids).await?;
        }

        Ok(composition_id)
    }

    async fn link_imslp_composer(&self, composition_id: &str, composer: Option<&str>) -> ImportResult<()> {
        let composer = match composer {
            Some(composer) => composer,
            None => {
                warn!(composition_id, "IMSLP work has no composer");
                return Ok(());
            }
        };
        let composer_ids = self.import_artist_imslp(&imslp::page_url(composer)).await?;
        self.loader
            .link_composition_composers(composition_id, &composer_ids)
            .await
    }

    /// Write the files of one upload group and link them to the composition
    ///
    /// PDFs in a group with an XML upload are taken to be rendered from it.
    async fn import_imslp_files(&self, composition_id: &str, files: &[ImslpFile]) -> ImportResult<()> {
        let mut xml_id: Option<String> = None;
        let mut pdf_ids = Vec::new();

        for file in files {
            let mo_id = self.loader.get_or_create_media_object(&file.media_object).await?;
            self.loader
                .link_media_object_example_of_work(&mo_id, composition_id)
                .await?;
            if file.xml && xml_id.is_none() {
                xml_id = Some(mo_id);
            } else if file.media_object.is_pdf() {
                pdf_ids.push(mo_id);
            }
        }

        if let Some(xml_id) = xml_id {
            for pdf_id in &pdf_ids {
                self.loader.link_media_object_derived_from(pdf_id, &xml_id).await?;
            }
        }
        Ok(())
    }

    /// Import an IMSLP work page and the files of its XML upload group
    ///
    /// With `need_xml`, a work without an XML upload is skipped and `None`
    /// is returned.
    pub async fn load_musiccomposition_from_imslp_url(
        &self,
        url: &str,
        need_xml: bool,
    ) -> ImportResult<Option<String>> {
        info!("Importing imslp work {}", url);
        let page = imslp::get_composition_page(&self.sites.imslp, url)
            .await?
            .ok_or_else(|| ImportError::InvalidInput(format!("No IMSLP work page at {}", url)))?;

        if need_xml && page.files.is_empty() {
            info!(" - No xml files, skipping");
            return Ok(None);
        }

        let composition_id = self.loader.get_or_create_composition(&page.work.work).await?;
        self.link_imslp_composer(&composition_id, page.work.composer.as_deref())
            .await?;
        self.import_imslp_files(&composition_id, &page.files).await?;

        Ok(Some(composition_id))
    }

    /// Import the work a `Special:ReverseLookup` URL points to, with that one file
    pub async fn load_musiccomposition_from_imslp_by_file(&self, reverse_lookup: &str) -> ImportResult<String> {
        info!("Importing imslp file {}", reverse_lookup);
        let client = &self.sites.imslp;
        let (page_name, file_title) =
            imslp::get_composition_and_filename_from_permalink(client, reverse_lookup).await?;

        let work = imslp::api_work(client, &page_name)
            .await?
            .ok_or_else(|| ImportError::InvalidInput(format!("No IMSLP work page {}", page_name)))?;

        let composition_id = self.loader.get_or_create_composition(&work.work).await?;
        self.link_imslp_composer(&composition_id, work.composer.as_deref())
            .await?;

        let file = match imslp::get_wiki_content_for_page(client, &page_name).await? {
            Some(page) => imslp::get_mediaobject_for_filename(client, &page, &file_title).await?,
            None => None,
        };
        match file {
            Some(file) => self.import_imslp_files(&composition_id, &[file]).await?,
            None => warn!(file = %file_title, page = %page_name, "File not found in work wikitext"),
        }

        Ok(composition_id)
    }

    /// Import every work in an IMSLP category, optionally only those with XML
    pub async fn import_imslp_works_in_category(
        &self,
        category: &str,
        need_xml: bool,
    ) -> ImportResult<BatchSummary> {
        let mut titles = imslp::category_pagelist(&self.sites.imslp, category).await?;
        if need_xml {
            titles = imslp::filter_works_for_xml(&self.sites.imslp, &titles).await?;
        }

        let mut summary = BatchSummary::new(titles.len());
        for (i, title) in titles.iter().enumerate() {
            info!("Importing IMSLP work {}/{} {}", i + 1, summary.total, title);
            match self
                .load_musiccomposition_from_imslp_url(&imslp::page_url(title), need_xml)
                .await
            {
                Ok(Some(_)) => summary.imported += 1,
                Ok(None) => summary.skipped += 1,
                Err(e) => {
                    warn!("Failed to import {}: {}", title, e);
                    summary.failed += 1;
                }
            }
        }

        info!("IMSLP category {}: {}", category, summary);
        Ok(summary)
    }
}
