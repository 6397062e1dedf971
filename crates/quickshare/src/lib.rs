//! # QuickShare
//!
//! Share a directory of this machine with devices on the local network.
//!
//! ## Overview
//!
//! QuickShare runs a small HTTP server in one of two modes:
//!
//! - **Download**: the root directory tree is served read-only.
//! - **Upload**: peers get an HTML form and each POST stores one file in the
//!   root directory.
//!
//! At startup the host's LAN address is resolved and printed as a URL and a
//! terminal QR code so a phone can connect by scanning.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quickshare::{display_url, resolve_local_address, Mode, ServerConfig, ShareServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::new(8080, "/srv/inbox", Mode::Upload);
//!     let ip = resolve_local_address()?;
//!     println!("Open {}", display_url(ip, config.port));
//!
//!     ShareServer::new(config).start().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading, defaults and validation
//! - [`network`]: Local address discovery
//! - [`server`]: HTTP server, download and upload handlers
//! - [`files`]: Upload filename sanitization
//! - [`ui`]: Startup banner and terminal QR codes

pub mod config;
pub mod files;
pub mod network;
pub mod server;
pub mod ui;

pub use config::{Config, ConfigError, Mode, ServerConfig};
pub use network::{display_url, resolve_local_address, AddressError};
pub use server::{build_router, BoundServer, ServerError, ShareServer, UploadError};
pub use ui::{print_banner, QrStyle};
