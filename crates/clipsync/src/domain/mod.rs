//! Domain layer for the CLI: configuration.

pub mod config;

pub use config::{ClientOverrides, ConfigError, FileConfig, ServerOverrides};
