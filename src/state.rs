//! Shared application state

use anyhow::Result;

use crate::config::Config;
use crate::yadisk::{ArchiveOptions, ListingCache, YandexClient};

pub struct AppState {
    pub config: Config,
    pub client: YandexClient,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let mut client = YandexClient::new(&config.yandex)?;
        if let Some(cache) = ListingCache::from_config(&config.cache) {
            client = client.with_cache(cache);
        }

        Ok(Self { config, client })
    }

    pub fn archive_options(&self) -> ArchiveOptions {
        ArchiveOptions::from_config(&self.config)
    }
}
