//! Web server module

use anyhow::{anyhow, Result};
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use url::Url;

use crate::yadisk::{
    filter, paths, ArchiveAssembler, Listing, PublicKey, ResourceItem, ResourceSource, TypeFilter,
};
use crate::AppState;

static INDEX_TEMPLATE: &str = include_str!("../templates/index.html");
static FILES_TEMPLATE: &str = include_str!("../templates/files.html");

#[derive(Debug, Deserialize)]
pub struct SubmitKeyForm {
    #[serde(default)]
    pub public_key: String,
}

#[derive(Debug, Deserialize)]
pub struct FilesQuery {
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub path: String,
    #[serde(default, rename = "type")]
    pub type_filter: String,
}

#[derive(Debug, Serialize)]
pub struct FilesResponse {
    pub success: bool,
    pub items: Vec<ResourceItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl FilesResponse {
    fn items(items: Vec<ResourceItem>) -> Self {
        Self {
            success: true,
            items,
            message: None,
        }
    }

    /// Same answer for an empty folder and a folder that could not be read.
    fn no_items() -> Self {
        Self {
            success: true,
            items: Vec::new(),
            message: Some("No files found".to_string()),
        }
    }

    fn rejected(message: String) -> Self {
        Self {
            success: false,
            items: Vec::new(),
            message: Some(message),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub path: String,
}

/// Bulk download form: `paths` repeats once per selected entry, folders
/// carry a trailing `/`.
#[derive(Debug, Deserialize)]
pub struct ZipForm {
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub paths: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: &'static str,
}

/// Index page with the public key form
pub async fn index_handler() -> Html<&'static str> {
    Html(INDEX_TEMPLATE)
}

pub async fn submit_key_handler(Form(form): Form<SubmitKeyForm>) -> Response {
    match validate_public_key(&form.public_key) {
        Ok(key) => Redirect::to(&files_url(&key)).into_response(),
        Err(e) => {
            warn!("❌ public key rejected: {}", e);
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
    }
}

/// File browser page. It loads the listing from `/api/files` itself.
pub async fn files_page_handler(Query(query): Query<FilesQuery>) -> Response {
    if PublicKey::new(&query.public_key).is_none() {
        return Redirect::to("/").into_response();
    }
    Html(FILES_TEMPLATE).into_response()
}

pub async fn list_api_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FilesQuery>,
) -> (StatusCode, Json<FilesResponse>) {
    let key = match validate_public_key(&query.public_key) {
        Ok(key) => key,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(FilesResponse::rejected(e.to_string())),
            )
        }
    };

    let type_filter = TypeFilter::parse(Some(query.type_filter.as_str()));
    info!("📂 listing {:?} (filter: {:?})", query.path, type_filter);

    match filter::list(&state.client, &key, &query.path, type_filter.as_ref()).await {
        Listing::Items(items) => (StatusCode::OK, Json(FilesResponse::items(items))),
        Listing::Empty => (StatusCode::OK, Json(FilesResponse::no_items())),
        Listing::Failed(reason) => {
            error!("❌ listing {:?} failed: {}", query.path, reason);
            (StatusCode::OK, Json(FilesResponse::no_items()))
        }
    }
}

/// Single file download, streamed through the relay
pub async fn download_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DownloadQuery>,
) -> Response {
    let key = match validate_public_key(&query.public_key) {
        Ok(key) => key,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };
    let path = query.path.trim();
    if path.is_empty() {
        return (StatusCode::BAD_REQUEST, "file path is required").into_response();
    }

    info!("📥 download request: {}", path);

    let link = match state.client.resolve_download_link(&key, path).await {
        Ok(link) => link,
        Err(e) => {
            error!("❌ no download link for {}: {}", path, e);
            return (StatusCode::BAD_GATEWAY, "Failed to get a download link for this file")
                .into_response();
        }
    };

    let resp = match state.client.open_stream(&link).await {
        Ok(resp) => resp,
        Err(e) => {
            error!("❌ download of {} failed: {}", path, e);
            return (StatusCode::BAD_GATEWAY, "Failed to download the file").into_response();
        }
    };

    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_DISPOSITION, content_disposition(paths::base_name(path)))
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CACHE_CONTROL, "no-cache");

    if let Some(len) = resp.content_length() {
        response = response.header(header::CONTENT_LENGTH, len);
    }

    response
        .body(Body::from_stream(resp.bytes_stream()))
        .unwrap_or_else(|e| {
            error!("❌ failed to build download response: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })
}

/// Bulk download: every selected file and folder in one ZIP
pub async fn zip_handler(
    State(state): State<Arc<AppState>>,
    axum_extra::extract::Form(form): axum_extra::extract::Form<ZipForm>,
) -> Response {
    let key = match validate_public_key(&form.public_key) {
        Ok(key) => key,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    let selection: Vec<String> = form
        .paths
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    if selection.is_empty() {
        return (StatusCode::BAD_REQUEST, "no files selected").into_response();
    }

    info!("📦 zip request: {} selected entries", selection.len());

    let assembler = ArchiveAssembler::new(&state.client, state.archive_options());
    let assembled = match assembler.assemble(&key, &selection).await {
        Ok(assembled) => assembled,
        Err(e) => {
            error!("❌ archive assembly failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to build the archive")
                .into_response();
        }
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/zip")
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition(&state.config.web.archive_name),
        )
        .header(header::CONTENT_LENGTH, assembled.bytes.len())
        .body(Body::from(assembled.bytes))
        .unwrap_or_else(|e| {
            error!("❌ failed to build zip response: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })
}

/// Health check
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION,
    })
}

/// Validates a submitted public key or public link
pub fn validate_public_key(raw: &str) -> Result<PublicKey> {
    let key = PublicKey::new(raw).ok_or_else(|| anyhow!("public key is required"))?;

    let value = key.as_str();
    if value.starts_with("http://") || value.starts_with("https://") {
        let parsed = Url::parse(value).map_err(|_| anyhow!("invalid public link URL"))?;
        if parsed.host_str().map_or(true, str::is_empty) {
            return Err(anyhow!("public link has no host"));
        }
    }

    Ok(key)
}

fn files_url(key: &PublicKey) -> String {
    format!("/files?public_key={}", urlencoding::encode(key.as_str()))
}

fn content_disposition(filename: &str) -> String {
    let filename = if filename.is_empty() { "download" } else { filename };
    let encoded = urlencoding::encode(filename);
    format!("attachment; filename=\"{}\"; filename*=UTF-8''{}", encoded, encoded)
}

/// Creates the web router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler).post(submit_key_handler))
        .route("/files", get(files_page_handler))
        .route("/api/files", get(list_api_handler))
        .route("/download", get(download_handler))
        .route("/download/zip", post(zip_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_public_key_valid() {
        let valid_keys = vec![
            "https://disk.yandex.ru/d/AbCdEf123",
            "https://yadi.sk/d/xyz",
            "  dGVzdC1rZXk=  ",
            "k8f2/Hm+e9Q==",
        ];

        for key in valid_keys {
            assert!(validate_public_key(key).is_ok(), "key should be valid: {}", key);
        }
    }

    #[test]
    fn test_validate_public_key_invalid() {
        let invalid_keys = vec!["", "   ", "https://", "http://[::1"];

        for key in invalid_keys {
            assert!(validate_public_key(key).is_err(), "key should be invalid: {:?}", key);
        }
    }

    #[test]
    fn test_files_url_encodes_key() {
        let key = PublicKey::new("https://disk.yandex.ru/d/a b").unwrap();
        assert_eq!(
            files_url(&key),
            "/files?public_key=https%3A%2F%2Fdisk.yandex.ru%2Fd%2Fa%20b"
        );
    }

    #[test]
    fn test_content_disposition() {
        assert_eq!(
            content_disposition("downloaded_files.zip"),
            "attachment; filename=\"downloaded_files.zip\"; filename*=UTF-8''downloaded_files.zip"
        );
        assert!(content_disposition("отчёт.pdf").is_ascii());
        assert!(content_disposition("").contains("filename=\"download\""));
    }
}
