//! Configuration loading

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub yandex: YandexConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct YandexConfig {
    /// Base URL of the public resources API
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Items requested per listing page
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// File name offered for bulk downloads
    #[serde(default = "default_archive_name")]
    pub archive_name: String,
    /// Upper bound on the uncompressed bytes packed into one archive. Default 2GB
    #[serde(default = "default_max_zip_size")]
    pub max_zip_size: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArchiveConfig {
    /// Folders nested deeper than this below a selected folder are skipped
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

/// Listing cache. Entries are served until they expire or are invalidated,
/// so a folder changed on the provider side can look stale for `ttl_secs`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: u64,
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_api_base() -> String {
    std::env::var("YADISK_API_BASE")
        .unwrap_or_else(|_| "https://cloud-api.yandex.net/v1/disk/public".to_string())
}

fn default_http_timeout_secs() -> u64 {
    std::env::var("YADISK_HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(30)
}

fn default_page_limit() -> u32 {
    100
}

fn default_port() -> u16 {
    std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(5200)
}

fn default_archive_name() -> String {
    "downloaded_files.zip".to_string()
}

fn default_max_zip_size() -> u64 {
    // MAX_ZIP_SIZE is in bytes, e.g. MAX_ZIP_SIZE=1073741824 for 1GB
    std::env::var("MAX_ZIP_SIZE")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(2 * 1024 * 1024 * 1024)
}

fn default_max_depth() -> usize {
    32
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_max_entries() -> u64 {
    1024
}

fn default_cache_ttl_secs() -> u64 {
    300
}

impl Default for YandexConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            http_timeout_secs: default_http_timeout_secs(),
            page_limit: default_page_limit(),
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            archive_name: default_archive_name(),
            max_zip_size: default_max_zip_size(),
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            max_entries: default_cache_max_entries(),
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl Config {
    /// Loads `path`, falling back to defaults (and their env overrides)
    /// when the file does not exist.
    pub fn load(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            return Ok(Self::default());
        }
        let content =
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path))?;
        Self::from_toml(&content).with_context(|| format!("failed to parse {}", path))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn user_agent() -> &'static str {
        concat!("yadisk-relay/", env!("CARGO_PKG_VERSION"))
    }
}
