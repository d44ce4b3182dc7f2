//! ce-import - Contribution Environment data importer
//!
//! Each subcommand runs one pipeline to completion against the CE configured
//! in the TOML config file, then exits.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use ce_common::ImportConfig;
use ce_import::cache::ResponseCache;
use ce_import::graphql::connection::HttpConnection;
use ce_import::importers::encodings::read_encoding_rows;
use ce_import::importers::imslp_zip::ZipOutcome;
use ce_import::sites::Sites;
use ce_import::{Importer, Loader};

#[derive(Parser, Debug)]
#[command(name = "ce-import")]
#[command(about = "Import composers, works and scores into the Contribution Environment")]
#[command(version)]
struct Args {
    /// Config file (overrides TROMPA_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level, e.g. info or ce_import=debug (overrides logging.level)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a MusicBrainz artist and every linked authority record
    ImportArtistMusicbrainz { mbid: String },
    /// Import an IMSLP composer (Category: url) and every linked authority record
    ImportArtistImslp { url: String },
    /// Import a MusicBrainz work with its composer and parts
    ImportWorkMusicbrainz { mbid: String },
    /// Import an IMSLP work page with its composer and score files
    ImportWorkImslp {
        url: String,
        /// Skip the work unless it has a MusicXML upload
        #[arg(long)]
        need_xml: bool,
    },
    /// Import the work and file a Special:ReverseLookup url points to
    ImportImslpFile { url: String },
    /// Import every work in an IMSLP category
    ImslpImportWorksInCategory {
        category: String,
        #[arg(long)]
        need_xml: bool,
    },
    /// Import the composers of the CPDL works with MusicXML in a category
    CpdlImportComposersInCategory { category: String },
    /// Import the CPDL works with MusicXML in a category (composers must exist)
    CpdlImportWorksInCategory { category: String },
    /// Attach score encodings listed in a JSON file to their IMSLP works
    ImportEncodings {
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
    },
    /// Point an IMSLP zip MediaObject at the MusicXML file inside it
    ExtractImslpZip { mediaobject_id: String },
    /// Delete every cached HTTP response
    ClearCache,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (config, source) = ImportConfig::load(args.config.as_deref()).context("Failed to load config")?;
    let level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    ce_common::logging::init_tracing(level)?;

    info!("ce-import {}", env!("CARGO_PKG_VERSION"));
    source.report();
    info!("CE endpoint: {}", config.server.url);

    let cache = ResponseCache::open(config.import.cache_path.as_deref())
        .await
        .context("Failed to open response cache")?;

    if let Command::ClearCache = args.command {
        let removed = cache.clear().await?;
        println!("Removed {} cached responses", removed);
        return Ok(());
    }

    let connection = HttpConnection::new(&config.server)?;
    let loader = Loader::new(Arc::new(connection), config.import.creator.clone());
    let sites = Sites::new(Some(cache), &config.sites)?;
    let importer = Importer::new(loader, sites);

    match args.command {
        Command::ImportArtistMusicbrainz { mbid } => {
            let ids = importer.import_artist_musicbrainz(&mbid).await?;
            info!("Imported {} person records", ids.len());
        }
        Command::ImportArtistImslp { url } => {
            let ids = importer.import_artist_imslp(&url).await?;
            info!("Imported {} person records", ids.len());
        }
        Command::ImportWorkMusicbrainz { mbid } => {
            let id = importer.load_musiccomposition_from_musicbrainz(&mbid).await?;
            info!("MusicComposition {}", id);
        }
        Command::ImportWorkImslp { url, need_xml } => {
            match importer.load_musiccomposition_from_imslp_url(&url, need_xml).await? {
                Some(id) => info!("MusicComposition {}", id),
                None => info!("Work skipped"),
            }
        }
        Command::ImportImslpFile { url } => {
            let id = importer.load_musiccomposition_from_imslp_by_file(&url).await?;
            info!("MusicComposition {}", id);
        }
        Command::ImslpImportWorksInCategory { category, need_xml } => {
            importer.import_imslp_works_in_category(&category, need_xml).await?;
        }
        Command::CpdlImportComposersInCategory { category } => {
            importer.import_cpdl_composers_for_category(&category).await?;
        }
        Command::CpdlImportWorksInCategory { category } => {
            importer.import_cpdl_works_for_category(&category).await?;
        }
        Command::ImportEncodings { file } => {
            let rows = read_encoding_rows(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            importer.import_encodings(&rows).await;
        }
        Command::ExtractImslpZip { mediaobject_id } => {
            if let ZipOutcome::Updated { content_url } = importer.extract_imslp_zip(&mediaobject_id).await? {
                println!("{}", content_url);
            }
        }
        Command::ClearCache => {}
    }

    Ok(())
}
