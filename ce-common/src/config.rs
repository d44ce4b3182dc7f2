//! Configuration loading for the CE importers
//!
//! Config file resolution follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. `TROMPA_CONFIG` environment variable
//! 3. Per-user config file (`<config_dir>/trompa/ce-import.toml`)
//! 4. `trompace.toml` in the working directory
//!
//! A missing file is not an error: defaults are used and [`ConfigSource::report`]
//! logs a warning.
//! After the file is read, `CE_SERVER_URL`, `CE_AUTH_TOKEN` and `CE_CACHE_PATH`
//! override the corresponding values.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "TROMPA_CONFIG";
/// Environment override for `server.url`
pub const SERVER_URL_ENV_VAR: &str = "CE_SERVER_URL";
/// Environment override for `server.token`
pub const AUTH_TOKEN_ENV_VAR: &str = "CE_AUTH_TOKEN";
/// Environment override for `import.cache_path`
pub const CACHE_PATH_ENV_VAR: &str = "CE_CACHE_PATH";

/// Attribution URL written as `creator` on every entity the importer creates
pub const DEFAULT_CREATOR_URL: &str = "https://github.com/trompamusic/ce-data-import/tree/master";
const DEFAULT_SERVER_URL: &str = "http://localhost:4000";
const LOCAL_CONFIG_FILE: &str = "trompace.toml";

/// Full importer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ImportConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub import: ImportSection,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub sites: SitesConfig,
}

/// Contribution Environment endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// GraphQL endpoint that receives `{"query": ...}` POSTs
    #[serde(default = "default_server_url")]
    pub url: String,
    /// Bearer token sent with every request, if set
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_server_url(),
            token: None,
        }
    }
}

/// Importer behaviour
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImportSection {
    #[serde(default = "default_creator")]
    pub creator: String,
    /// SQLite file for the HTTP response cache (in-memory when unset)
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
}

impl Default for ImportSection {
    fn default() -> Self {
        Self {
            creator: default_creator(),
            cache_path: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// External site overrides
///
/// A base URL replaces the scheme, host and port of every request to that
/// site (a mirror or a local server); paths and queries are kept. Source URLs
/// written to the CE always use the public site addresses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SitesConfig {
    #[serde(default)]
    pub imslp: Option<String>,
    #[serde(default)]
    pub cpdl: Option<String>,
    #[serde(default)]
    pub musicbrainz: Option<String>,
    /// VIAF, ISNI, Library of Congress and Worldcat
    #[serde(default)]
    pub authority: Option<String>,
    /// Wikidata and Wikipedia
    #[serde(default)]
    pub wikimedia: Option<String>,
    /// Bounds of the random pause after uncached IMSLP responses; `[0, 0]` disables it
    #[serde(default = "default_imslp_throttle_ms")]
    pub imslp_throttle_ms: [u64; 2],
}

impl Default for SitesConfig {
    fn default() -> Self {
        Self {
            imslp: None,
            cpdl: None,
            musicbrainz: None,
            authority: None,
            wikimedia: None,
            imslp_throttle_ms: default_imslp_throttle_ms(),
        }
    }
}

fn default_imslp_throttle_ms() -> [u64; 2] {
    [500, 3000]
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_creator() -> String {
    DEFAULT_CREATOR_URL.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Where [`ImportConfig::load`] found its values
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

impl ConfigSource {
    /// Log the resolution outcome; call after the subscriber is installed
    pub fn report(&self) {
        match self {
            ConfigSource::File(path) => info!("Loading config from {}", path.display()),
            ConfigSource::Defaults => warn!(
                "{} not set and no config file found, using defaults",
                CONFIG_ENV_VAR
            ),
        }
    }
}

impl ImportConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Read a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Resolve, read and apply environment overrides
    ///
    /// An explicitly requested file (flag or env var) that does not exist is an error;
    /// a missing default file falls back to built-in defaults. Nothing is logged here:
    /// the returned [`ConfigSource`] is reported once tracing is up.
    pub fn load(cli_arg: Option<&Path>) -> Result<(Self, ConfigSource)> {
        let explicit = cli_arg
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from));

        let (mut config, source) = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                (Self::from_file(&path)?, ConfigSource::File(path))
            }
            None => match default_config_path() {
                Some(path) => (Self::from_file(&path)?, ConfigSource::File(path)),
                None => (Self::default(), ConfigSource::Defaults),
            },
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok((config, source))
    }

    /// Apply `CE_*` environment variables on top of file values
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(SERVER_URL_ENV_VAR) {
            if !url.trim().is_empty() {
                self.server.url = url;
            }
        }
        if let Ok(token) = std::env::var(AUTH_TOKEN_ENV_VAR) {
            if !token.trim().is_empty() {
                self.server.token = Some(token);
            }
        }
        if let Ok(path) = std::env::var(CACHE_PATH_ENV_VAR) {
            if !path.trim().is_empty() {
                self.import.cache_path = Some(PathBuf::from(path));
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.url.trim().is_empty() {
            return Err(Error::Config("server.url must not be empty".to_string()));
        }
        if self.import.creator.trim().is_empty() {
            return Err(Error::Config("import.creator must not be empty".to_string()));
        }
        Ok(())
    }
}

/// First existing default config file, if any
fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("trompa").join("ce-import.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.exists() {
        return Some(local);
    }

    None
}
