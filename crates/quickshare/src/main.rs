//! QuickShare
//!
//! Share a directory over the local network and print a scannable URL.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use quickshare::config::{Config, Mode};
use quickshare::network::{display_url, resolve_local_address};
use quickshare::server::ShareServer;
use quickshare::ui::{print_banner_styled, QrStyle};
use tracing_subscriber::EnvFilter;

/// QuickShare - instant file sharing over the local network.
#[derive(Parser, Debug)]
#[command(name = "quickshare")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Directory to share, or to store uploads in with --upload
    #[arg(value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Receive files from peers instead of serving them
    #[arg(short, long)]
    pub upload: bool,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Draw the QR code for dark terminal backgrounds
    #[arg(long)]
    pub invert_qr: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Command-line flags take precedence over file and environment values.
    fn apply_to(&self, config: &mut Config) {
        if let Some(path) = &self.path {
            config.server.root_directory = path.clone();
        }
        if self.upload {
            config.server.mode = Mode::Upload;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
    }

    fn qr_style(&self) -> QrStyle {
        if self.invert_qr {
            QrStyle::Inverted
        } else {
            QrStyle::Normal
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default()?
    };
    config.apply_env_overrides()?;
    cli.apply_to(&mut config);
    config.validate()?;

    init_tracing(&config, cli.verbose);
    tracing::debug!("Effective configuration: {:?}", config);

    let ip = resolve_local_address().context("Cannot advertise a URL to peers")?;

    let root_label = std::fs::canonicalize(&config.server.root_directory)
        .unwrap_or_else(|_| config.server.root_directory.clone())
        .display()
        .to_string();
    let mode = config.server.mode;

    let bound = ShareServer::new(config.server).bind().await?;
    let url = display_url(ip, bound.local_addr().port());

    {
        let mut stdout = std::io::stdout().lock();
        print_banner_styled(&mut stdout, &url, mode.label(), &root_label, cli.qr_style())?;
    }

    bound.serve_with_shutdown(wait_for_shutdown_signal()).await?;
    tracing::info!("Server stopped");

    Ok(())
}

/// Install the fmt subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(config: &Config, verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose {
            "debug".to_string()
        } else {
            config.logging.level.to_lowercase()
        };
        EnvFilter::new(format!("quickshare={level},tower_http={level}"))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Wait for a shutdown signal (SIGTERM or Ctrl+C).
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {
                        tracing::info!("Received SIGTERM");
                    }
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("Received SIGINT");
                    }
                }
                return;
            }
            Err(e) => tracing::warn!("Failed to register SIGTERM handler: {}", e),
        }
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received SIGINT"),
        Err(e) => {
            tracing::warn!("Failed to listen for Ctrl+C, running until killed: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
