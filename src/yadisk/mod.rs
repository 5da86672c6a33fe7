//! Public share access through the Yandex Disk public resources API

pub mod archive;
pub mod cache;
pub mod client;
pub mod filter;
pub mod paths;
pub mod types;
pub mod walker;

pub use archive::{ArchiveAssembler, ArchiveOptions, Assembled};
pub use cache::ListingCache;
pub use client::{ResourceSource, YandexClient};
pub use filter::TypeFilter;
pub use types::{DownloadLink, Listing, PublicKey, ResourceItem, ResourceKind};
pub use walker::DirectoryWalker;
