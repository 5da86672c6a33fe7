//! Remote resource client for the public resources API
//!
//! Three calls: list a folder, resolve a download link, fetch the bytes
//! behind a link. Every call is one outbound request bounded by the client
//! timeout.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::cache::ListingCache;
use super::types::{DownloadLink, Listing, PublicKey, ResourceItem};
use crate::config::{Config, YandexConfig};

/// Source of listings and file content for one public share.
#[async_trait]
pub trait ResourceSource: Send + Sync {
    /// Direct children of the folder at `path` (the empty path is the root).
    async fn list_children(&self, key: &PublicKey, path: &str) -> Listing;

    async fn resolve_download_link(&self, key: &PublicKey, path: &str) -> Result<DownloadLink>;

    /// Fails without buffering the rest once the content is known to be
    /// longer than `max_len` bytes.
    async fn fetch_bytes(&self, link: &DownloadLink, max_len: u64) -> Result<Bytes>;
}

#[derive(Debug, Deserialize)]
struct ResourceResponse {
    #[serde(rename = "_embedded", default)]
    embedded: Option<EmbeddedItems>,
}

#[derive(Debug, Deserialize)]
struct EmbeddedItems {
    #[serde(default)]
    items: Vec<ResourceItem>,
    #[serde(default)]
    total: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct LinkResponse {
    #[serde(default)]
    href: Option<String>,
}

pub struct YandexClient {
    http: Client,
    api_base: String,
    page_limit: u32,
    cache: Option<ListingCache>,
}

impl YandexClient {
    pub fn new(config: &YandexConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .user_agent(Config::user_agent())
            .build()?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            page_limit: config.page_limit.max(1),
            cache: None,
        })
    }

    pub fn with_cache(mut self, cache: ListingCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn cache(&self) -> Option<&ListingCache> {
        self.cache.as_ref()
    }

    fn endpoint(&self, suffix: &str) -> String {
        format!("{}/{}", self.api_base, suffix)
    }

    /// Lists every page of a folder.
    async fn list_all(&self, key: &PublicKey, path: &str) -> Result<Vec<ResourceItem>> {
        let mut items = Vec::new();

        loop {
            let page = self.fetch_page(key, path, items.len()).await?;
            let Some(embedded) = page.embedded else {
                break;
            };

            let received = embedded.items.len();
            items.extend(embedded.items);

            if !has_more_pages(received, items.len(), embedded.total, self.page_limit) {
                break;
            }
        }

        Ok(items)
    }

    async fn fetch_page(&self, key: &PublicKey, path: &str, offset: usize) -> Result<ResourceResponse> {
        let mut query = vec![
            ("public_key", key.as_str().to_string()),
            ("limit", self.page_limit.to_string()),
            ("offset", offset.to_string()),
        ];
        if !path.is_empty() {
            query.push(("path", path.to_string()));
        }

        debug!("📡 listing path={:?} offset={}", path, offset);

        let resp = self
            .http
            .get(self.endpoint("resources"))
            .query(&query)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(anyhow!("listing failed: HTTP {}, body: {}", status, snippet(&text)));
        }

        serde_json::from_str(&text)
            .map_err(|e| anyhow!("failed to parse listing: {}, body: {}", e, snippet(&text)))
    }

    /// Opens the content behind `link` without buffering it, for streaming
    /// a single file back to the browser.
    pub async fn open_stream(&self, link: &DownloadLink) -> Result<Response> {
        let resp = self.http.get(link.as_str()).send().await?;
        if !resp.status().is_success() {
            return Err(anyhow!("download failed: HTTP {}", resp.status()));
        }
        Ok(resp)
    }
}

#[async_trait]
impl ResourceSource for YandexClient {
    async fn list_children(&self, key: &PublicKey, path: &str) -> Listing {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(key, path) {
                debug!("📦 listing cache hit: {:?}", path);
                return hit;
            }
        }

        let listing = match self.list_all(key, path).await {
            Ok(items) => Listing::from_items(items),
            Err(e) => {
                warn!("⚠️ failed to list {:?}: {}", path, e);
                Listing::Failed(e.to_string())
            }
        };

        if let Some(cache) = &self.cache {
            cache.insert(key, path, listing.clone());
        }

        listing
    }

    async fn resolve_download_link(&self, key: &PublicKey, path: &str) -> Result<DownloadLink> {
        debug!("🔗 resolving download link: {}", path);

        let resp = self
            .http
            .get(self.endpoint("resources/download"))
            .query(&[("public_key", key.as_str()), ("path", path)])
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(anyhow!(
                "download link request failed: HTTP {}, body: {}",
                status,
                snippet(&text)
            ));
        }

        let link: LinkResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("failed to parse download link: {}, body: {}", e, snippet(&text)))?;

        match link.href {
            Some(href) if !href.is_empty() => Ok(DownloadLink::new(href)),
            _ => Err(anyhow!("no href returned for {}", path)),
        }
    }

    async fn fetch_bytes(&self, link: &DownloadLink, max_len: u64) -> Result<Bytes> {
        let mut resp = self.open_stream(link).await?;

        if let Some(len) = resp.content_length().filter(|&len| len > max_len) {
            return Err(anyhow!("content length {} exceeds the {} byte limit", len, max_len));
        }

        // no (or a wrong) Content-Length: enforce the limit while reading
        let mut data = Vec::new();
        while let Some(chunk) = resp.chunk().await? {
            if (data.len() + chunk.len()) as u64 > max_len {
                return Err(anyhow!("content exceeds the {} byte limit", max_len));
            }
            data.extend_from_slice(&chunk);
        }
        Ok(Bytes::from(data))
    }
}

/// A full page means more may follow unless the provider's `total` says
/// everything has been collected. A missing `total` never ends the listing.
fn has_more_pages(received: usize, collected: usize, total: Option<u64>, page_limit: u32) -> bool {
    if received < page_limit as usize {
        return false;
    }
    total.map_or(true, |total| (collected as u64) < total)
}

/// First 300 characters of a response body, for error messages.
fn snippet(text: &str) -> String {
    text.chars().take(300).collect()
}
