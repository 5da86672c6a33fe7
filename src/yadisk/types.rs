//! Data types shared by the provider client, the walker and the assembler

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque token identifying one public share. Either a bare key or the
/// public URL of the share; the provider accepts both.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PublicKey(String);

impl PublicKey {
    /// Returns `None` when the trimmed input is empty.
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceKind {
    #[serde(rename = "file")]
    File,
    #[serde(rename = "dir", alias = "directory")]
    Directory,
}

/// One entry of a directory listing, as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceItem {
    pub name: String,
    /// Provider-scoped path, used for further API calls.
    pub path: String,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl ResourceItem {
    pub fn file(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: ResourceKind::File,
            mime_type: None,
            media_type: None,
            size: None,
        }
    }

    pub fn directory(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            kind: ResourceKind::Directory,
            ..Self::file(name, path)
        }
    }

    pub fn with_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into());
        self
    }

    pub fn is_dir(&self) -> bool {
        self.kind == ResourceKind::Directory
    }

    /// Coarse media category: the MIME type when present, otherwise the
    /// provider's `media_type` label.
    pub fn media_type(&self) -> Option<&str> {
        self.mime_type
            .as_deref()
            .or(self.media_type.as_deref())
            .filter(|s| !s.is_empty())
    }
}

/// Short-lived direct download URL. Resolve one per file, never reuse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadLink(String);

impl DownloadLink {
    pub fn new(href: impl Into<String>) -> Self {
        Self(href.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Outcome of listing one directory.
///
/// Callers that need the simplified behaviour ("no items" for both an empty
/// folder and a provider failure) use [`Listing::into_items`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    Items(Vec<ResourceItem>),
    Empty,
    Failed(String),
}

impl Listing {
    pub fn from_items(items: Vec<ResourceItem>) -> Self {
        if items.is_empty() {
            Listing::Empty
        } else {
            Listing::Items(items)
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Listing::Failed(_))
    }

    pub fn into_items(self) -> Vec<ResourceItem> {
        match self {
            Listing::Items(items) => items,
            Listing::Empty | Listing::Failed(_) => Vec::new(),
        }
    }
}
