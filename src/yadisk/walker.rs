//! Directory walker: one level of a folder at a time

use super::client::ResourceSource;
use super::types::{Listing, PublicKey};

/// Yields the immediate children of a folder. Recursion is left to the
/// caller so that retry or caching policy can change behind this seam.
pub struct DirectoryWalker<'a, S: ?Sized> {
    source: &'a S,
}

impl<'a, S: ResourceSource + ?Sized> DirectoryWalker<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    pub async fn children(&self, key: &PublicKey, path: &str) -> Listing {
        self.source.list_children(key, path).await
    }
}
