//! DriftSync synchronization agent.
//!
//! Keeps a local directory in agreement with a remote replica:
//!
//!   driftsync-agent --config driftsync.toml
//!
//! The config file names the sync directory, the server's address and
//! credentials, and optionally the shared key for encrypted transfers.

use anyhow::{Context, Result};
use clap::Parser;
use driftsync_client::{Client, ClientConfig};
use std::fs;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "driftsync-agent")]
#[command(about = "Bidirectional file synchronization agent")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "driftsync.toml")]
    config: PathBuf,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    let raw = fs::read_to_string(&args.config)
        .with_context(|| format!("reading config file {}", args.config.display()))?;
    let config: ClientConfig = toml::from_str(&raw)
        .with_context(|| format!("parsing config file {}", args.config.display()))?;

    let mut client = Client::new(config).await.context("starting client")?;
    client.start().context("spawning client roles")?;
    info!("agent running, press ctrl-c to stop");

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    client.shutdown().await;
    Ok(())
}
