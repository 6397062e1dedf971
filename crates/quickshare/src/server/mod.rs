//! The sharing server.
//!
//! A [`ShareServer`] owns its [`ServerConfig`] and an explicitly built
//! [`Router`]; nothing is registered globally, so several servers can run
//! side by side in one process. The mode fixed at startup selects the
//! handlers:
//!
//! - [`Mode::Download`]: the root directory is served read-only.
//! - [`Mode::Upload`]: GET returns an upload form, POST stores one file.
//!
//! Per-request failures are turned into HTTP responses and never stop the
//! server. Only a bad root directory, a failed bind or a broken accept loop
//! end [`ShareServer::start`].

pub mod download;
pub mod html;
pub mod upload;

use std::future::Future;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::{Mode, ServerConfig};

pub use upload::UploadError;

/// Errors that stop the server from starting or running.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The root directory is missing, not a directory, or not writable in
    /// upload mode.
    #[error("root directory {} is not usable: {reason}", path.display())]
    RootDirectory { path: PathBuf, reason: String },

    /// The listening socket could not be acquired.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The accept loop failed.
    #[error("server error: {0}")]
    Serve(#[source] io::Error),
}

/// Build the router for `config.mode`, with request tracing.
///
/// Every request is logged at `info` when it completes.
pub fn build_router(config: &ServerConfig) -> Router {
    let router = match config.mode {
        Mode::Download => download::router(config),
        Mode::Upload => upload::router(config),
    };
    router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
}

/// HTTP server sharing one directory in one mode.
#[derive(Debug, Clone)]
pub struct ShareServer {
    config: ServerConfig,
}

impl ShareServer {
    /// Create a server for `config`. Nothing is bound until [`bind`](Self::bind).
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// The configuration this server runs with.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Check the root directory and bind the listening socket on all
    /// IPv4 interfaces.
    pub async fn bind(self) -> Result<BoundServer, ServerError> {
        check_root(&self.config.root_directory, self.config.mode).await?;

        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.config.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        tracing::info!(
            "Sharing {:?} in {} mode on {}",
            self.config.root_directory,
            self.config.mode,
            local_addr
        );

        Ok(BoundServer {
            listener,
            router: build_router(&self.config),
            local_addr,
        })
    }

    /// Bind and serve until the process is terminated or serving fails.
    pub async fn start(self) -> Result<(), ServerError> {
        self.bind().await?.serve().await
    }
}

/// A server whose socket is bound and which is ready to accept requests.
pub struct BoundServer {
    listener: TcpListener,
    router: Router,
    local_addr: SocketAddr,
}

impl BoundServer {
    /// The address the listening socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve requests until serving fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Serve requests until `signal` completes, then finish in-flight
    /// requests and return.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(signal)
            .await
            .map_err(ServerError::Serve)
    }
}

async fn check_root(root: &Path, mode: Mode) -> Result<(), ServerError> {
    let unusable = |reason: String| ServerError::RootDirectory {
        path: root.to_path_buf(),
        reason,
    };

    let meta = tokio::fs::metadata(root)
        .await
        .map_err(|e| unusable(e.to_string()))?;
    if !meta.is_dir() {
        return Err(unusable("not a directory".to_string()));
    }
    if mode == Mode::Upload && meta.permissions().readonly() {
        return Err(unusable("directory is read-only".to_string()));
    }
    Ok(())
}
