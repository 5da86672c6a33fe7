//! Browse and download files from a public Yandex Disk share

pub mod config;
pub mod state;
pub mod web;
pub mod yadisk;

pub use config::Config;
pub use state::AppState;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
