//! # scoreline
//!
//! Live match feed server binary. Loads settings, installs logging, builds
//! the admission gate and serves until ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use scoreline_admission::AdmissionGate;
use scoreline_server::{LiveServer, ServerConfig};
use scoreline_settings::LogFormat;

/// Scoreline live server.
#[derive(Parser, Debug)]
#[command(name = "scoreline", about = "Live match and commentary fan-out server")]
struct Cli {
    /// Settings file (defaults to `~/.scoreline/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Log format: `json` or `pretty` (overrides settings).
    #[arg(long)]
    log_format: Option<LogFormatArg>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LogFormatArg {
    Json,
    Pretty,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Json => Self::Json,
            LogFormatArg::Pretty => Self::Pretty,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => scoreline_settings::load_settings_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => scoreline_settings::load_settings().context("Failed to load settings")?,
    };
    if let Some(host) = cli.host {
        settings.server.host = host;
    }
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    if let Some(format) = cli.log_format {
        settings.logging.format = format.into();
    }

    scoreline_logging::init_logging(&settings.logging).context("Failed to initialize logging")?;

    let gate = AdmissionGate::from_settings(&settings.admission)
        .context("Failed to configure admission gate")?;
    let server = LiveServer::new(ServerConfig::from(&settings.server), gate);
    let (addr, handle) = server.listen().await.context("Failed to start server")?;
    tracing::info!(%addr, "scoreline ready");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    let closed = server.stop(handle).await;
    tracing::info!(closed, "shutdown complete");
    Ok(())
}
