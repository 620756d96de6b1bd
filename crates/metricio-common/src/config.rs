//! Configuration types for MetricIO
//!
//! The server reads an optional TOML file into these structures and merges
//! command-line flags over it, flags taking precedence.

use serde::Deserialize;
use std::path::PathBuf;

/// Default database directory
pub const DEFAULT_DB_DIR: &str = "/var/db/metricio";

/// Default listen port
pub const DEFAULT_PORT: u16 = 9410;

/// Default worker pool size
pub const DEFAULT_WORKERS: usize = 8;

/// Root configuration for the MetricIO server
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listener and worker pool configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Worker pool size; each worker services one connection at a time
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            workers: default_workers(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the per-kind table file pairs
    #[serde(default = "default_db_dir")]
    pub db_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_dir: default_db_dir(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter, overridden by `RUST_LOG` when set
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_db_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DB_DIR)
}

fn default_log_level() -> String {
    "info".to_string()
}
