//! `muxcored` - the coordination core daemon binary.
//!
//! A thin entry point: parse arguments, load and validate configuration,
//! set up logging, bring up every subsystem via [`wiring::Daemon::start`],
//! then wait for a shutdown signal and drain everything in reverse order.

#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod wiring;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// The coordination core daemon.
#[derive(Parser)]
#[command(name = "muxcored")]
#[command(author, version, about = "Coordination Core daemon", long_about = None)]
struct Args {
    /// Path to the YAML configuration file (spec §6).
    #[arg(short, long, default_value = "muxcore.yaml")]
    config: PathBuf,

    /// Directory holding the Run Store's and Artefact Store's on-disk data.
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    /// Grace period, in seconds, given to in-flight runs and sessions on
    /// shutdown.
    #[arg(long, default_value_t = 10)]
    shutdown_grace_secs: u64,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    let log_config = muxcore_telemetry::LogConfig::new(level).with_format(muxcore_telemetry::LogFormat::Compact);
    if let Err(e) = muxcore_telemetry::setup_logging(&log_config) {
        eprintln!("failed to initialize logging: {e}");
    }

    let config = muxcore_config::load_file(&args.config)?;
    std::fs::create_dir_all(&args.data_dir)?;

    let daemon = wiring::Daemon::start(&config, &args.data_dir).await?;
    info!(
        servers = config.servers.len(),
        data_dir = %args.data_dir.display(),
        "muxcored started"
    );

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, draining");

    daemon.shutdown(Duration::from_secs(args.shutdown_grace_secs)).await;
    info!("muxcored stopped");
    Ok(())
}
