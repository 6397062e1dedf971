//! Upload mode: an HTML form on GET and multipart file intake on POST.
//!
//! Each POST stores exactly one file, taken from the multipart field named
//! `file`, directly inside the root directory. A repeated filename
//! overwrites the earlier file. Concurrent uploads of the same name are not
//! serialized, so whichever finishes last determines the content.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::multipart::{Field, MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;

use super::html;
use crate::config::ServerConfig;
use crate::files::{sanitize_filename, FilenameError};

/// Name of the multipart field carrying the file.
pub const FILE_FIELD: &str = "file";

/// Errors that can occur while handling a single upload request.
///
/// None of these affect the server beyond the request that raised them.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The body is not valid multipart form data.
    #[error("Error parsing form: {0}")]
    BadRequest(String),

    /// The body is larger than the configured cap.
    #[error("Error parsing form: request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    /// No file field named `file` was sent.
    #[error("Error retrieving the file")]
    MissingFile,

    /// The client-supplied filename cannot be stored.
    #[error("Error retrieving the file: {0}")]
    InvalidFilename(#[from] FilenameError),

    /// A body read or file write stalled past the I/O deadline.
    #[error("Upload timed out")]
    Timeout,

    /// The destination file could not be created.
    #[error("Error creating destination file {}", path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing the destination file failed.
    #[error("Error saving file: {0}")]
    Write(#[source] std::io::Error),

    /// The request body broke off while the file was being copied.
    #[error("Error saving file: {0}")]
    Incomplete(String),
}

impl UploadError {
    /// HTTP status reported to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            UploadError::BadRequest(_)
            | UploadError::PayloadTooLarge { .. }
            | UploadError::MissingFile
            | UploadError::InvalidFilename(_) => StatusCode::BAD_REQUEST,
            UploadError::Timeout => StatusCode::REQUEST_TIMEOUT,
            UploadError::Create { .. } | UploadError::Write(_) | UploadError::Incomplete(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Classify a multipart error blamed on the client.
    fn from_form(err: MultipartError, limit: u64) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            UploadError::PayloadTooLarge { limit }
        } else {
            UploadError::BadRequest(err.body_text())
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Upload failed: {:?}", self);
        } else {
            tracing::debug!("Upload rejected: {}", self);
        }
        (status, self.to_string()).into_response()
    }
}

#[derive(Clone)]
struct UploadState {
    root: Arc<PathBuf>,
    max_upload_size: u64,
    io_timeout: Duration,
}

/// Build the upload-mode router.
///
/// The same handlers answer on every path; methods other than GET and POST
/// receive 405 Method Not Allowed.
pub fn router(config: &ServerConfig) -> Router {
    let state = UploadState {
        root: Arc::new(config.root_directory.clone()),
        max_upload_size: config.max_upload_size,
        io_timeout: config.io_timeout(),
    };
    let body_limit = usize::try_from(config.max_upload_size).unwrap_or(usize::MAX);
    let handlers = get(upload_form).post(receive_upload);

    Router::new()
        .route("/", handlers.clone())
        .route("/*path", handlers)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

async fn upload_form() -> Html<&'static str> {
    Html(html::UPLOAD_FORM)
}

async fn receive_upload(
    State(state): State<UploadState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Html<String>, UploadError> {
    if declared_length(&headers).is_some_and(|len| len > state.max_upload_size) {
        return Err(UploadError::PayloadTooLarge {
            limit: state.max_upload_size,
        });
    }

    let mut multipart = multipart.map_err(|e| UploadError::BadRequest(e.body_text()))?;

    let mut field = loop {
        let next = timeout(state.io_timeout, multipart.next_field())
            .await
            .map_err(|_| UploadError::Timeout)?
            .map_err(|e| UploadError::from_form(e, state.max_upload_size))?;

        match next {
            Some(field) if field.name() == Some(FILE_FIELD) => break field,
            Some(_) => continue,
            None => return Err(UploadError::MissingFile),
        }
    };

    let raw_name = field.file_name().ok_or(UploadError::MissingFile)?.to_string();
    let name = sanitize_filename(&raw_name)?;
    if name != raw_name {
        tracing::debug!("Stripped upload filename {:?} to {:?}", raw_name, name);
    }

    let dest = state.root.join(&name);
    let written = store_field(&mut field, &dest, &state).await?;
    drop(field);

    if let Err(err) = finish_form(&mut multipart, &state).await {
        if err.status() == StatusCode::BAD_REQUEST {
            remove_partial(&dest).await;
        }
        return Err(err);
    }

    tracing::info!("Received file: {} ({} bytes)", name, written);
    Ok(Html(html::upload_success(&name)))
}

/// Stream the field body into `dest`, creating or truncating it.
///
/// A failure mid-copy leaves the partial file on disk, except when the body
/// is rejected as a bad request (oversized or badly encoded): then the file
/// is removed so the directory is left unchanged.
async fn store_field(
    field: &mut Field<'_>,
    dest: &Path,
    state: &UploadState,
) -> Result<u64, UploadError> {
    let mut file = File::create(dest)
        .await
        .map_err(|source| UploadError::Create {
            path: dest.to_path_buf(),
            source,
        })?;

    let mut written: u64 = 0;
    loop {
        let chunk = match timeout(state.io_timeout, field.chunk()).await {
            Err(_) => return Err(UploadError::Timeout),
            Ok(Ok(Some(chunk))) => chunk,
            Ok(Ok(None)) => break,
            Ok(Err(err)) if err.status().is_client_error() => {
                drop(file);
                remove_partial(dest).await;
                return Err(UploadError::from_form(err, state.max_upload_size));
            }
            Ok(Err(err)) => return Err(UploadError::Incomplete(err.body_text())),
        };

        timeout(state.io_timeout, file.write_all(&chunk))
            .await
            .map_err(|_| UploadError::Timeout)?
            .map_err(UploadError::Write)?;
        written += chunk.len() as u64;
    }

    timeout(state.io_timeout, file.flush())
        .await
        .map_err(|_| UploadError::Timeout)?
        .map_err(UploadError::Write)?;

    Ok(written)
}

/// Read the fields after the file up to the closing boundary.
///
/// Their content is ignored, but the body must still be well-formed.
async fn finish_form(multipart: &mut Multipart, state: &UploadState) -> Result<(), UploadError> {
    loop {
        let next = timeout(state.io_timeout, multipart.next_field())
            .await
            .map_err(|_| UploadError::Timeout)?;
        match next {
            Ok(Some(_)) => continue,
            Ok(None) => return Ok(()),
            Err(err) if err.status().is_client_error() => {
                return Err(UploadError::from_form(err, state.max_upload_size))
            }
            Err(err) => return Err(UploadError::Incomplete(err.body_text())),
        }
    }
}

async fn remove_partial(dest: &Path) {
    if let Err(e) = tokio::fs::remove_file(dest).await {
        tracing::warn!("Failed to remove rejected upload {:?}: {}", dest, e);
    }
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Mode;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "quickshare-test-boundary";

    fn upload_config(dir: &TempDir) -> ServerConfig {
        ServerConfig::new(0, dir.path(), Mode::Upload)
    }

    fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, filename, content) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match filename {
                Some(filename) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn post(body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn dir_entries(dir: &TempDir) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_get_returns_form() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("existing.txt"), b"x").unwrap();
        let app = router(&upload_config(&temp_dir));

        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("text/html"));
        assert!(body_text(response).await.contains("Upload File to Host"));
    }

    #[tokio::test]
    async fn test_get_on_any_path_returns_form() {
        let temp_dir = TempDir::new().unwrap();
        let app = router(&upload_config(&temp_dir));

        let response = app
            .oneshot(Request::get("/some/where").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Upload File to Host"));
    }

    #[tokio::test]
    async fn test_post_stores_file() {
        let temp_dir = TempDir::new().unwrap();
        let app = router(&upload_config(&temp_dir));
        let content = b"This is a test content for unit testing.";

        let body = multipart_body(&[("file", Some("test_document.txt"), content)]);
        let response = app.oneshot(post(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let page = body_text(response).await;
        assert!(page.contains("test_document.txt"));
        assert!(page.contains("href=\"/\""));

        let saved = std::fs::read(temp_dir.path().join("test_document.txt")).unwrap();
        assert_eq!(saved, content);
    }

    #[tokio::test]
    async fn test_post_overwrites_same_name() {
        let temp_dir = TempDir::new().unwrap();
        let app = router(&upload_config(&temp_dir));

        let first = multipart_body(&[("file", Some("notes.txt"), b"first version, longer")]);
        let response = app.clone().oneshot(post(first)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let second = multipart_body(&[("file", Some("notes.txt"), b"second")]);
        let response = app.oneshot(post(second)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let saved = std::fs::read(temp_dir.path().join("notes.txt")).unwrap();
        assert_eq!(saved, b"second");
    }

    #[tokio::test]
    async fn test_post_skips_other_fields() {
        let temp_dir = TempDir::new().unwrap();
        let app = router(&upload_config(&temp_dir));

        let body = multipart_body(&[
            ("comment", None, b"hello"),
            ("file", Some("photo.jpg"), b"\xff\xd8\xff\xe0binary"),
        ]);
        let response = app.oneshot(post(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let saved = std::fs::read(temp_dir.path().join("photo.jpg")).unwrap();
        assert_eq!(saved, b"\xff\xd8\xff\xe0binary");
    }

    #[tokio::test]
    async fn test_post_without_file_field_is_bad_request() {
        let temp_dir = TempDir::new().unwrap();
        let app = router(&upload_config(&temp_dir));

        let body = multipart_body(&[("comment", None, b"no file here")]);
        let response = app.oneshot(post(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(dir_entries(&temp_dir).is_empty());
    }

    #[tokio::test]
    async fn test_post_file_field_without_filename_is_bad_request() {
        let temp_dir = TempDir::new().unwrap();
        let app = router(&upload_config(&temp_dir));

        let body = multipart_body(&[("file", None, b"plain value")]);
        let response = app.oneshot(post(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(dir_entries(&temp_dir).is_empty());
    }

    #[tokio::test]
    async fn test_post_non_multipart_is_bad_request() {
        let temp_dir = TempDir::new().unwrap();
        let app = router(&upload_config(&temp_dir));

        let request = Request::builder()
            .method("POST")
            .uri("/")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("just text"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(dir_entries(&temp_dir).is_empty());
    }

    #[tokio::test]
    async fn test_post_malformed_multipart_is_bad_request() {
        let temp_dir = TempDir::new().unwrap();
        let app = router(&upload_config(&temp_dir));

        let response = app
            .oneshot(post(b"this is not a multipart body".to_vec()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(dir_entries(&temp_dir).is_empty());
    }

    #[tokio::test]
    async fn test_post_truncated_file_part_is_bad_request() {
        let temp_dir = TempDir::new().unwrap();
        let app = router(&upload_config(&temp_dir));

        let body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"x.txt\"\r\n\r\nhello world"
        );
        let mut request = post(body.clone().into_bytes());
        request
            .headers_mut()
            .insert(header::CONTENT_LENGTH, body.len().into());
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(dir_entries(&temp_dir).is_empty());
    }

    #[tokio::test]
    async fn test_post_garbage_after_file_part_is_bad_request() {
        let temp_dir = TempDir::new().unwrap();
        let app = router(&upload_config(&temp_dir));

        let body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"y.txt\"\r\n\r\nhello\r\n--{BOUNDARY}\r\ngarbage-no-headers"
        );
        let response = app.oneshot(post(body.into_bytes())).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(dir_entries(&temp_dir).is_empty());
    }

    #[tokio::test]
    async fn test_post_fields_after_file_are_accepted() {
        let temp_dir = TempDir::new().unwrap();
        let app = router(&upload_config(&temp_dir));

        let body = multipart_body(&[
            ("file", Some("first.txt"), b"kept"),
            ("comment", None, b"trailing value"),
        ]);
        let response = app.oneshot(post(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(dir_entries(&temp_dir), vec!["first.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_post_declared_oversize_is_rejected_before_writing() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = upload_config(&temp_dir);
        config.max_upload_size = 256;
        let app = router(&config);

        let body = multipart_body(&[("file", Some("big.bin"), &[7u8; 4096])]);
        let mut request = post(body.clone());
        request
            .headers_mut()
            .insert(header::CONTENT_LENGTH, body.len().into());
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(dir_entries(&temp_dir).is_empty());
    }

    #[tokio::test]
    async fn test_post_streamed_oversize_leaves_directory_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = upload_config(&temp_dir);
        config.max_upload_size = 256;
        let app = router(&config);

        let body = multipart_body(&[("file", Some("big.bin"), &[7u8; 4096])]);
        let response = app.oneshot(post(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(dir_entries(&temp_dir).is_empty());
    }

    #[tokio::test]
    async fn test_post_strips_directory_components() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("share");
        std::fs::create_dir(&root).unwrap();
        let app = router(&ServerConfig::new(0, &root, Mode::Upload));

        let body = multipart_body(&[("file", Some("../escape.txt"), b"contained")]);
        let response = app.oneshot(post(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(!temp_dir.path().join("escape.txt").exists());
        assert_eq!(std::fs::read(root.join("escape.txt")).unwrap(), b"contained");
    }

    #[tokio::test]
    async fn test_post_directory_reference_name_is_bad_request() {
        let temp_dir = TempDir::new().unwrap();
        let app = router(&upload_config(&temp_dir));

        let body = multipart_body(&[("file", Some(".."), b"nope")]);
        let response = app.oneshot(post(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(dir_entries(&temp_dir).is_empty());
    }

    #[tokio::test]
    async fn test_post_into_missing_root_is_internal_error() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("removed");
        let app = router(&ServerConfig::new(0, &root, Mode::Upload));

        let body = multipart_body(&[("file", Some("a.txt"), b"data")]);
        let response = app.oneshot(post(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(response).await.contains("Error creating destination file"));
    }

    #[tokio::test]
    async fn test_other_methods_are_not_allowed() {
        let temp_dir = TempDir::new().unwrap();
        let app = router(&upload_config(&temp_dir));

        for method in ["PUT", "DELETE", "PATCH"] {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method(method)
                        .uri("/")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{method}");
        }
    }

    #[tokio::test]
    async fn test_stalled_body_times_out() {
        use futures_util::StreamExt;

        let temp_dir = TempDir::new().unwrap();
        let mut config = upload_config(&temp_dir);
        config.io_timeout_secs = 1;
        let app = router(&config);

        let head = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"slow.bin\"\r\n\r\npartial"
        );
        let stream = futures_util::stream::iter(vec![Ok::<_, std::io::Error>(head)])
            .chain(futures_util::stream::pending::<Result<String, std::io::Error>>());
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from_stream(stream))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }

    #[test]
    fn test_error_statuses() {
        assert_eq!(UploadError::MissingFile.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            UploadError::PayloadTooLarge { limit: 1 }.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            UploadError::InvalidFilename(FilenameError::Empty).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(UploadError::Timeout.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(
            UploadError::Write(std::io::Error::other("disk full")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_declared_length() {
        let mut headers = HeaderMap::new();
        assert_eq!(declared_length(&headers), None);

        headers.insert(header::CONTENT_LENGTH, "1024".parse().unwrap());
        assert_eq!(declared_length(&headers), Some(1024));

        headers.insert(header::CONTENT_LENGTH, "lots".parse().unwrap());
        assert_eq!(declared_length(&headers), None);
    }
}
