//! Download mode: the root directory tree served read-only.
//!
//! Files are streamed by [`ServeDir`], which resolves the request path under
//! the root, rejects traversal outside it and answers 404 for missing paths.
//! Directories without an `index.html` get a generated listing page so a
//! phone opening the bare URL can browse the share.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Router;
use percent_encoding::percent_decode_str;
use tower::ServiceExt;
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;

use super::html::{self, ListingEntry};
use crate::config::ServerConfig;

#[derive(Clone)]
struct DownloadState {
    root: Arc<PathBuf>,
    files: ServeDir,
}

/// Build the download-mode router rooted at `config.root_directory`.
pub fn router(config: &ServerConfig) -> Router {
    let state = DownloadState {
        root: Arc::new(config.root_directory.clone()),
        files: ServeDir::new(&config.root_directory),
    };

    Router::new()
        .fallback(serve_path)
        .with_state(state)
        .layer(response_deadline(config))
}

/// Requests that produce no response within the I/O timeout get 408.
fn response_deadline(config: &ServerConfig) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, config.io_timeout())
}

async fn serve_path(State(state): State<DownloadState>, request: Request) -> Response {
    let readable = *request.method() == Method::GET || *request.method() == Method::HEAD;
    let path = request.uri().path().to_owned();
    if readable {
        if let Some((dir, display_path)) = listable_directory(&state.root, &path).await {
            return match read_listing(&dir).await {
                Ok(entries) => Html(html::directory_listing(&display_path, &entries)).into_response(),
                Err(e) => {
                    tracing::warn!("Failed to list directory {:?}: {}", dir, e);
                    (StatusCode::INTERNAL_SERVER_ERROR, "Error reading directory").into_response()
                }
            };
        }
    }

    match state.files.oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

/// Map a request path to a directory that should get a generated listing.
///
/// Only paths ending in `/` qualify (`ServeDir` redirects the slash-less
/// form), and only when the directory has no `index.html` of its own.
/// Returns the filesystem directory and the decoded request path.
async fn listable_directory(root: &Path, uri_path: &str) -> Option<(PathBuf, String)> {
    if !uri_path.ends_with('/') {
        return None;
    }

    let decoded = percent_decode_str(uri_path).decode_utf8().ok()?;
    let mut dir = root.to_path_buf();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return None,
            s if s.contains('\\') || s.contains('\0') => return None,
            s => dir.push(s),
        }
    }

    let meta = tokio::fs::metadata(&dir).await.ok()?;
    if !meta.is_dir() {
        return None;
    }
    if tokio::fs::metadata(dir.join("index.html"))
        .await
        .is_ok_and(|m| m.is_file())
    {
        return None;
    }

    Some((dir, decoded.into_owned()))
}

async fn read_listing(dir: &Path) -> std::io::Result<Vec<ListingEntry>> {
    let mut rd = tokio::fs::read_dir(dir).await?;
    let mut entries = Vec::new();
    while let Some(ent) = rd.next_entry().await? {
        let is_dir = tokio::fs::metadata(ent.path())
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        entries.push(ListingEntry {
            name: ent.file_name().to_string_lossy().to_string(),
            is_dir,
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}
