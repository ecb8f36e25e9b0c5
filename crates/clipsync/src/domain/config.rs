//! Configuration file and effective settings.
//!
//! Settings come from three places, lowest precedence first:
//!
//! 1. Built-in defaults (`RelayConfig::default()`, `SyncClientConfig::default()`).
//! 2. An optional TOML file passed with `--config`.
//! 3. Command-line flags and their `CLIPSYNC_*` environment variables.
//!
//! [`FileConfig`] is the parsed file; its `*_config` methods apply the
//! command-line overrides on top of it and produce the library config
//! structs.
//!
//! # Example file
//!
//! ```toml
//! log_level = "debug"
//! poll_interval_ms = 250
//! max_frame_bytes = 8388608
//!
//! [server]
//! port = 5563
//! queue_depth = 64
//!
//! [client]
//! relay = "relay.lan:5563"
//! wayland = true
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clipsync_client::infrastructure::clipboard::ClipboardBackend;
use clipsync_client::SyncClientConfig;
use clipsync_core::FrameLimits;
use clipsync_relay::RelayConfig;
use serde::Deserialize;
use thiserror::Error;

/// Default relay port.
pub const DEFAULT_PORT: u16 = 5563;

/// Errors raised while loading or applying configuration.  All are fatal at
/// startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("no relay address given; pass <host>:<port> or set `client.relay` in the config file")]
    MissingRelay,
    #[error("poll interval must be at least 1 ms")]
    ZeroPollInterval,
}

/// Settings shared by both roles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// `tracing` filter used when `RUST_LOG` is not set.
    pub log_level: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub max_frame_bytes: Option<usize>,
    pub server: ServerSection,
    pub client: ClientSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub port: Option<u16>,
    pub queue_depth: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientSection {
    pub relay: Option<String>,
    pub wayland: Option<bool>,
}

/// Relay options given on the command line.
#[derive(Debug, Clone, Default)]
pub struct ServerOverrides {
    pub port: Option<u16>,
    pub queue_depth: Option<usize>,
    pub max_frame_bytes: Option<usize>,
}

/// Client options given on the command line.
#[derive(Debug, Clone, Default)]
pub struct ClientOverrides {
    pub relay: Option<String>,
    pub wayland: bool,
    pub poll_interval_ms: Option<u64>,
    pub max_frame_bytes: Option<usize>,
}

impl FileConfig {
    /// Reads and parses a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The log filter to use when `RUST_LOG` is absent.
    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    fn limits(&self, flag: Option<usize>) -> FrameLimits {
        flag.or(self.max_frame_bytes)
            .map(FrameLimits::new)
            .unwrap_or_default()
    }

    /// Effective relay configuration.  The relay always binds all
    /// interfaces.
    pub fn relay_config(&self, overrides: &ServerOverrides) -> RelayConfig {
        let defaults = RelayConfig::default();
        let port = overrides.port.or(self.server.port).unwrap_or(DEFAULT_PORT);
        RelayConfig {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], port)),
            limits: self.limits(overrides.max_frame_bytes),
            queue_depth: overrides
                .queue_depth
                .or(self.server.queue_depth)
                .unwrap_or(defaults.queue_depth),
        }
    }

    /// Effective client configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRelay`] when neither the command line
    /// nor the file names a relay, and [`ConfigError::ZeroPollInterval`] for
    /// a zero poll interval.
    pub fn client_config(
        &self,
        overrides: &ClientOverrides,
    ) -> Result<SyncClientConfig, ConfigError> {
        let defaults = SyncClientConfig::default();
        let relay_addr = overrides
            .relay
            .clone()
            .or_else(|| self.client.relay.clone())
            .ok_or(ConfigError::MissingRelay)?;
        let poll_interval = match overrides.poll_interval_ms.or(self.poll_interval_ms) {
            Some(0) => return Err(ConfigError::ZeroPollInterval),
            Some(ms) => Duration::from_millis(ms),
            None => defaults.poll_interval,
        };
        Ok(SyncClientConfig {
            relay_addr,
            poll_interval,
            limits: self.limits(overrides.max_frame_bytes),
            ..defaults
        })
    }

    /// Which clipboard backend the client should open.
    pub fn clipboard_backend(&self, overrides: &ClientOverrides) -> ClipboardBackend {
        if overrides.wayland || self.client.wayland.unwrap_or(false) {
            ClipboardBackend::Wayland
        } else {
            ClipboardBackend::System
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
