//! # edgegw
//!
//! Edge gateway daemon.
//!
//! Reads the coordinator's serial stream (a file or stdin), feeds it through
//! the device-state core and reports device changes.
//!
//! Runs in local mode: provisioning calls fail, so configured devices end up
//! `Failed`, and outbound messages are logged instead of sent.
//!
//! ## Example
//!
//! ```bash
//! # Replay a captured stream
//! edgegw --config gateway.toml --input capture.log --channel ttyUSB0
//!
//! # Read from stdin
//! cat /dev/ttyUSB0 | RUST_LOG=edgegw=debug edgegw
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tracing_subscriber::EnvFilter;

mod config;
mod input;
mod net;
mod serial_log;
mod status;

use config::Config;
use gw_service::{
    Gateway, LogRelayClient, NullSerialLog, SerialLog, UnavailableIdentityService,
};
use gw_types::ChannelId;
use serial_log::FileSerialLog;

/// Edge gateway daemon.
#[derive(Parser, Debug)]
#[command(name = "edgegw")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults are used if it does not exist)
    #[arg(long, default_value = "gateway.toml")]
    config: PathBuf,

    /// Serial stream to read (default: stdin)
    #[arg(long)]
    input: Option<PathBuf>,

    /// Channel id of the input (default: from config)
    #[arg(long)]
    channel: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("edgegw=info")),
        )
        .init();

    let cli = Cli::parse();

    let config = if cli.config.exists() {
        Config::from_file(&cli.config).context("Failed to load configuration")?
    } else {
        tracing::info!(
            "No config at {}, using defaults",
            cli.config.display()
        );
        Config::default()
    };

    let pool = net::load_pool(&config.net);
    let serial_log = open_serial_log(&config);
    let gateway = Arc::new(Gateway::new(
        pool,
        Arc::new(UnavailableIdentityService),
        Arc::new(LogRelayClient),
        serial_log,
        config.to_settings(),
    ));

    let channel = ChannelId::new(
        cli.channel
            .unwrap_or_else(|| config.ingest.default_channel.clone()),
    );
    let status = status::spawn_status_task(Arc::clone(&gateway), config.status.clone());

    let reader: Box<dyn AsyncRead + Unpin + Send> = match &cli.input {
        Some(path) => Box::new(
            tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open input {}", path.display()))?,
        ),
        None => Box::new(tokio::io::stdin()),
    };

    tracing::info!("edgegw v{} reading channel {}", env!("CARGO_PKG_VERSION"), channel);
    tokio::select! {
        result = input::pump(reader, &gateway, &channel, config.ingest.max_pending_bytes) => {
            result.context("Failed to read input")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted");
        }
    }

    status.abort();
    if let Err(e) = status::write_status(&gateway, &config.status).await {
        tracing::error!("Status error: {}", e);
    }

    let metrics = gateway.metrics();
    tracing::info!(
        "Shutdown: {} fragments, {} lines, {} decode errors, {} records rejected, {} devices",
        metrics.fragments_total.load(Ordering::Relaxed),
        metrics.lines_total.load(Ordering::Relaxed),
        metrics.decode_errors.load(Ordering::Relaxed),
        metrics.records_rejected.load(Ordering::Relaxed),
        metrics.devices_created.load(Ordering::Relaxed)
    );
    Ok(())
}

fn open_serial_log(config: &Config) -> Arc<dyn SerialLog> {
    if !config.logging.enabled {
        return Arc::new(NullSerialLog);
    }
    match FileSerialLog::new(&config.logging.directory, config.logging.prefix.clone()) {
        Ok(log) => {
            tracing::info!("Mirroring serial input to {}", log.directory().display());
            Arc::new(log)
        }
        Err(e) => {
            tracing::warn!(
                "Serial mirror disabled, cannot use {}: {}",
                config.logging.directory.display(),
                e
            );
            Arc::new(NullSerialLog)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["edgegw"]);
        assert_eq!(cli.config, PathBuf::from("gateway.toml"));
        assert!(cli.input.is_none());
        assert!(cli.channel.is_none());
    }

    #[test]
    fn cli_flags() {
        let cli = Cli::parse_from([
            "edgegw",
            "--config",
            "/etc/edgegw.toml",
            "--input",
            "capture.log",
            "--channel",
            "ttyUSB0",
        ]);
        assert_eq!(cli.config, PathBuf::from("/etc/edgegw.toml"));
        assert_eq!(cli.input, Some(PathBuf::from("capture.log")));
        assert_eq!(cli.channel.as_deref(), Some("ttyUSB0"));
    }

    #[test]
    fn disabled_logging_uses_null_mirror() {
        let mut config = Config::default();
        config.logging.enabled = false;
        let log = open_serial_log(&config);
        assert!(log.append(&ChannelId::generic(), b"x").is_ok());
    }
}
