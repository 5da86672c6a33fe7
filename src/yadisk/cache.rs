//! Read-through cache for directory listings
//!
//! Bounded by entry count and expired by TTL. Nothing watches the provider
//! for changes: a cached listing is served as-is until it expires or is
//! invalidated.

use moka::sync::Cache;
use std::time::Duration;

use super::types::{Listing, PublicKey};
use crate::config::CacheConfig;

#[derive(Clone)]
pub struct ListingCache {
    inner: Cache<(PublicKey, String), Listing>,
}

impl ListingCache {
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();
        Self { inner }
    }

    /// `None` when caching is disabled.
    pub fn from_config(config: &CacheConfig) -> Option<Self> {
        if !config.enabled || config.max_entries == 0 {
            return None;
        }
        Some(Self::new(
            config.max_entries,
            Duration::from_secs(config.ttl_secs),
        ))
    }

    pub fn get(&self, key: &PublicKey, path: &str) -> Option<Listing> {
        self.inner.get(&(key.clone(), path.to_string()))
    }

    /// Failed listings are never stored.
    pub fn insert(&self, key: &PublicKey, path: &str, listing: Listing) {
        if listing.is_failed() {
            return;
        }
        self.inner.insert((key.clone(), path.to_string()), listing);
    }

    pub fn invalidate(&self, key: &PublicKey, path: &str) {
        self.inner.invalidate(&(key.clone(), path.to_string()));
    }

    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }
}
