//! HTTP front end: a form page, a blocking harvest endpoint and archive
//! downloads.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::packager::package_session;
use crate::pipeline::PostHarvester;

pub const NO_IMAGES_MESSAGE: &str = "No images found. Check URL or cookies.";

#[derive(Clone)]
pub struct AppState {
    harvester: Arc<dyn PostHarvester>,
    download_root: PathBuf,
}

impl AppState {
    pub fn new(harvester: Arc<dyn PostHarvester>, download_root: PathBuf) -> Self {
        Self {
            harvester,
            download_root,
        }
    }
}

/// ```text
/// GET  /                - form page
/// POST /api/download    - harvest {url} and package the result
/// GET  /files/{name}    - download a packaged archive
/// ```
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/download", post(start_download))
        .route("/files/{name}", get(download_file))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DownloadResponse {
    Success { count: usize, download_url: String },
    Error { error: String },
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn start_download(State(state): State<AppState>, Json(request): Json<DownloadRequest>) -> Response {
    let Some(url) = request.url.filter(|u| !u.trim().is_empty()) else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "No URL provided" }))).into_response();
    };

    match harvest_and_package(&state, url.trim()).await {
        Ok(body) => Json(body).into_response(),
        Err(e) => {
            error!(target: "app.server", error = %format!("{e:#}"), "download request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn harvest_and_package(state: &AppState, url: &str) -> anyhow::Result<DownloadResponse> {
    let report = state.harvester.harvest(url, &state.download_root).await?;
    if !report.found_images() {
        info!(target: "app.server", session_id = %report.session_id, outcome = ?report.outcome, "nothing to package");
        return Ok(DownloadResponse::Error {
            error: NO_IMAGES_MESSAGE.to_string(),
        });
    }

    let archive = package_session(&report.output_dir).await?;
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(DownloadResponse::Success {
        count: report.image_count,
        download_url: format!("/files/{name}"),
    })
}

async fn download_file(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    if !is_plain_file_name(&name) {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid file name" }))).into_response();
    }
    let path = state.download_root.join(&name);
    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, "application/zip".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{name}\""),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            (StatusCode::NOT_FOUND, Json(json!({ "error": "file not found" }))).into_response()
        }
        Err(e) => {
            error!(target: "app.server", path = %path.display(), error = %e, "archive read failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))).into_response()
        }
    }
}

/// A single path component with no traversal or separators.
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.contains("..")
}

const INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Theater</title>
<style>
  body { font-family: system-ui, sans-serif; max-width: 40rem; margin: 4rem auto; padding: 0 1rem; }
  input { width: 100%; padding: .5rem; box-sizing: border-box; }
  button { margin-top: .75rem; padding: .5rem 1.25rem; }
  #result { margin-top: 1.5rem; }
</style>
</head>
<body>
<h1>Download post photos</h1>
<form id="form">
  <input id="url" type="url" placeholder="https://www.facebook.com/..." required>
  <button type="submit">Download</button>
</form>
<div id="result"></div>
<script>
document.getElementById('form').addEventListener('submit', async (event) => {
  event.preventDefault();
  const result = document.getElementById('result');
  result.textContent = 'Working... this can take a few minutes.';
  try {
    const response = await fetch('/api/download', {
      method: 'POST',
      headers: { 'Content-Type': 'application/json' },
      body: JSON.stringify({ url: document.getElementById('url').value })
    });
    const data = await response.json();
    if (data.status === 'success') {
      result.innerHTML = `Found ${data.count} images. <a href="${data.download_url}">Download zip</a>`;
    } else {
      result.textContent = data.error || 'Something went wrong.';
    }
  } catch (err) {
    result.textContent = 'Request failed: ' + err;
  }
});
</script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_cannot_escape_the_root() {
        assert!(is_plain_file_name("0b7c.zip"));
        assert!(!is_plain_file_name("../secret"));
        assert!(!is_plain_file_name("a/b.zip"));
        assert!(!is_plain_file_name("a\\b.zip"));
        assert!(!is_plain_file_name(".."));
        assert!(!is_plain_file_name(""));
    }
}
