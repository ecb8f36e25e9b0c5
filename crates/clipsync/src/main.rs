//! clipsync: keep clipboards in sync across machines on a LAN.
//!
//! # Usage
//!
//! ```text
//! clipsync server [-p <PORT>]           run the relay (binds 0.0.0.0)
//! clipsync client <HOST:PORT>           sync this machine through a relay
//!
//! Global options:
//!   --wayland                 use the native Wayland clipboard (Linux)
//!   --poll-interval-ms <MS>   clipboard poll interval [default: 500]
//!   --max-frame-bytes <N>     largest accepted frame [default: 16 MiB]
//!   --config <PATH>           TOML config file
//! ```
//!
//! # Environment variable overrides
//!
//! Command-line flags take precedence over environment variables, which take
//! precedence over the config file.
//!
//! | Variable                    | Flag                 |
//! |-----------------------------|----------------------|
//! | `CLIPSYNC_CONFIG`           | `--config`           |
//! | `CLIPSYNC_WAYLAND`          | `--wayland`          |
//! | `CLIPSYNC_POLL_INTERVAL_MS` | `--poll-interval-ms` |
//! | `CLIPSYNC_MAX_FRAME_BYTES`  | `--max-frame-bytes`  |
//! | `CLIPSYNC_PORT`             | `server -p`          |
//! | `CLIPSYNC_QUEUE_DEPTH`      | `server --queue-depth` |
//! | `CLIPSYNC_RELAY`            | `client <HOST:PORT>` |
//!
//! Logging goes through `tracing`; `RUST_LOG` overrides the config file's
//! `log_level`.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use clipsync::domain::{ClientOverrides, FileConfig, ServerOverrides};
use clipsync_client::infrastructure::clipboard;
use clipsync_client::SyncClient;
use clipsync_relay::SyncRelay;

// ── CLI argument definitions ──────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(name = "clipsync", about = "Keep clipboards in sync across machines", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Use the native Wayland clipboard instead of the system clipboard.
    #[arg(long, global = true, env = "CLIPSYNC_WAYLAND")]
    wayland: bool,

    /// How often to poll the local clipboard, in milliseconds.
    #[arg(long, global = true, env = "CLIPSYNC_POLL_INTERVAL_MS")]
    poll_interval_ms: Option<u64>,

    /// Largest frame body accepted or sent, in bytes.
    #[arg(long, global = true, env = "CLIPSYNC_MAX_FRAME_BYTES")]
    max_frame_bytes: Option<usize>,

    /// Path to a TOML config file.
    #[arg(long, global = true, env = "CLIPSYNC_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the relay that every client connects to.
    Server {
        /// TCP port to listen on [default: 5563].
        #[arg(short = 'p', long, env = "CLIPSYNC_PORT")]
        port: Option<u16>,

        /// Frames buffered per peer before the oldest is dropped [default: 32].
        #[arg(long, env = "CLIPSYNC_QUEUE_DEPTH")]
        queue_depth: Option<usize>,
    },
    /// Sync this machine's clipboard through a relay.
    Client {
        /// Relay address as HOST:PORT.
        #[arg(env = "CLIPSYNC_RELAY")]
        relay: Option<String>,
    },
}

impl Cli {
    fn load_file_config(&self) -> anyhow::Result<FileConfig> {
        match &self.config {
            Some(path) => Ok(FileConfig::load(path)?),
            None => Ok(FileConfig::default()),
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let file = cli.load_file_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(file.log_level()))
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    match cli.command {
        Command::Server { port, queue_depth } => {
            let overrides = ServerOverrides {
                port,
                queue_depth,
                max_frame_bytes: cli.max_frame_bytes,
            };
            run_server(&file, &overrides, running).await
        }
        Command::Client { relay } => {
            let overrides = ClientOverrides {
                relay,
                wayland: cli.wayland,
                poll_interval_ms: cli.poll_interval_ms,
                max_frame_bytes: cli.max_frame_bytes,
            };
            run_client(&file, &overrides, running).await
        }
    }
}

async fn run_server(
    file: &FileConfig,
    overrides: &ServerOverrides,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let config = file.relay_config(overrides);
    info!(
        "clipsync relay starting: bind={}, max_frame={} bytes, queue_depth={}",
        config.bind_addr, config.limits.max_frame_len, config.queue_depth
    );

    let relay = SyncRelay::bind(config).await?;
    relay.run(running).await?;

    info!("clipsync relay stopped");
    Ok(())
}

async fn run_client(
    file: &FileConfig,
    overrides: &ClientOverrides,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let config = file.client_config(overrides)?;
    let backend = file.clipboard_backend(overrides);
    let clipboard = clipboard::open(backend)
        .with_context(|| format!("cannot open {backend:?} clipboard backend"))?;

    let client = SyncClient::new(config);
    info!(
        "clipsync client {} starting: relay={}, backend={backend:?}, poll={:?}",
        client.origin(),
        client.config().relay_addr,
        client.config().poll_interval
    );

    client.run(clipboard, running).await?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_defaults() {
        // Arrange / Act
        let cli = Cli::parse_from(["clipsync", "server"]);

        // Assert
        assert!(matches!(
            cli.command,
            Command::Server {
                port: None,
                queue_depth: None
            }
        ));
        assert!(!cli.wayland);
    }

    #[test]
    fn test_server_short_port_flag() {
        let cli = Cli::parse_from(["clipsync", "server", "-p", "6000"]);
        assert!(matches!(cli.command, Command::Server { port: Some(6000), .. }));
    }

    #[test]
    fn test_client_takes_relay_address() {
        let cli = Cli::parse_from(["clipsync", "client", "192.168.1.10:5563"]);
        match cli.command {
            Command::Client { relay } => assert_eq!(relay.as_deref(), Some("192.168.1.10:5563")),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        // Arrange / Act
        let cli = Cli::parse_from([
            "clipsync",
            "client",
            "relay.lan:5563",
            "--wayland",
            "--poll-interval-ms",
            "100",
            "--max-frame-bytes",
            "4096",
        ]);

        // Assert
        assert!(cli.wayland);
        assert_eq!(cli.poll_interval_ms, Some(100));
        assert_eq!(cli.max_frame_bytes, Some(4096));
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(Cli::try_parse_from(["clipsync"]).is_err());
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        assert!(Cli::try_parse_from(["clipsync", "server", "-p", "70000"]).is_err());
    }

    #[test]
    fn test_no_config_flag_means_default_file_config() {
        let cli = Cli::parse_from(["clipsync", "server"]);
        assert_eq!(cli.load_file_config().unwrap(), FileConfig::default());
    }

    #[test]
    fn test_unreadable_config_is_an_error() {
        let cli = Cli::parse_from(["clipsync", "--config", "/no/such/clipsync.toml", "server"]);
        assert!(cli.load_file_config().is_err());
    }
}
