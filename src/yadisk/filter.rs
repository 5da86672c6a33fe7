//! Listing with an optional coarse file-type filter

use tracing::debug;

use super::client::ResourceSource;
use super::types::{Listing, PublicKey, ResourceItem};

/// Extensions counted as a category when an item carries no MIME type.
const EXTENSION_TABLE: &[(&str, &[&str])] = &[
    ("image/", &["jpg", "jpeg", "png", "gif", "bmp", "jfif"]),
    (
        "application/",
        &["pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "zip", "rar", "7z"],
    ),
    ("video/", &["mp4", "avi", "mkv", "mov", "wmv", "flv", "webm"]),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeFilter {
    /// Folders only
    Directory,
    /// Files whose media type starts with the prefix, e.g. `image/`
    MediaPrefix(String),
}

impl TypeFilter {
    /// `None` for an absent or blank filter.
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        let raw = raw?.trim();
        match raw {
            "" => None,
            "directory" => Some(TypeFilter::Directory),
            prefix => Some(TypeFilter::MediaPrefix(prefix.to_string())),
        }
    }

    pub fn matches(&self, item: &ResourceItem) -> bool {
        match self {
            TypeFilter::Directory => item.is_dir(),
            TypeFilter::MediaPrefix(prefix) => {
                if item.is_dir() {
                    return false;
                }
                item.media_type()
                    .map_or(false, |media| media.starts_with(prefix.as_str()))
                    || has_category_extension(&item.name, prefix)
            }
        }
    }
}

/// Extensions registered for a category prefix (`image/` or `image`).
pub fn category_extensions(prefix: &str) -> &'static [&'static str] {
    let wanted = prefix.trim_end_matches('/');
    EXTENSION_TABLE
        .iter()
        .find(|(category, _)| category.trim_end_matches('/') == wanted)
        .map(|(_, extensions)| *extensions)
        .unwrap_or(&[])
}

fn has_category_extension(name: &str, prefix: &str) -> bool {
    let Some((_, ext)) = name.rsplit_once('.') else {
        return false;
    };
    let ext = ext.to_ascii_lowercase();
    category_extensions(prefix).contains(&ext.as_str())
}

pub fn apply(items: Vec<ResourceItem>, filter: Option<&TypeFilter>) -> Vec<ResourceItem> {
    match filter {
        Some(filter) => items.into_iter().filter(|item| filter.matches(item)).collect(),
        None => items,
    }
}

/// Lists one folder (not recursive) and applies `filter`.
pub async fn list<S: ResourceSource + ?Sized>(
    source: &S,
    key: &PublicKey,
    path: &str,
    filter: Option<&TypeFilter>,
) -> Listing {
    match source.list_children(key, path).await {
        Listing::Items(items) => {
            let total = items.len();
            let kept = apply(items, filter);
            debug!("📁 {:?}: {} items, {} after filter", path, total, kept.len());
            Listing::from_items(kept)
        }
        other => other,
    }
}
