//! Search server binary.
//!
//! Loads `~/.config/vodhub/config.toml` (or `--config`), builds the enabled
//! providers and serves the search endpoints until Ctrl-C.

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use vodhub::{DEFAULT_LOG_FILTER, HubConfig, HubServer};

/// vodhub: streaming multi-source video search server.
#[derive(Parser)]
#[command(name = "vodhub-server", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `[server] host`.
    #[arg(long)]
    host: Option<String>,

    /// Override `[server] port`.
    #[arg(short, long)]
    port: Option<u16>,

    /// Write the default configuration to the config path and exit.
    #[arg(long)]
    init: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let cli = Cli::parse();
    let path = cli.config.unwrap_or_else(HubConfig::default_config_path);

    if cli.init {
        if path.exists() {
            anyhow::bail!("{} already exists", path.display());
        }
        HubConfig::default().save_to_file(&path)?;
        println!("wrote {}", path.display());
        return Ok(());
    }

    let mut config = if path.exists() {
        HubConfig::from_file(&path)?
    } else {
        tracing::warn!(path = %path.display(), "no config file, using defaults");
        HubConfig::default()
    };
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let providers = config.enabled_providers().count();
    if providers == 0 {
        tracing::warn!("no providers enabled; every search will complete empty");
    }

    let server = HubServer::start(&config).await.map_err(|e| {
        tracing::error!(error = %e, "vodhub-server failed to start");
        anyhow::anyhow!("vodhub-server failed: {e}")
    })?;
    tracing::info!(providers, "vodhub-server ready on {}", server.base_url());

    tokio::signal::ctrl_c().await?;
    server.shutdown();
    tracing::info!("vodhub-server shut down cleanly");
    Ok(())
}
