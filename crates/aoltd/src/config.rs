//! Configuration file support for aoltd.
//!
//! Loads and validates daemon configuration from TOML files.
//! Default location: /etc/aoltd/aoltd.toml

use crate::error::{RegistryError, RegistryResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/aoltd/aoltd.toml";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Where snapshots are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// One file per site under `backup_dir`.
    #[default]
    Directory,
    /// Process memory only. Nothing survives a restart.
    Memory,
}

impl SinkKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SinkKind::Directory => "directory",
            SinkKind::Memory => "memory",
        }
    }
}

impl FromStr for SinkKind {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "directory" | "dir" => Ok(SinkKind::Directory),
            "memory" | "mem" => Ok(SinkKind::Memory),
            other => Err(RegistryError::config(
                "sink",
                format!("unknown sink kind '{other}'"),
            )),
        }
    }
}

/// Complete aoltd configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Directory holding one snapshot file per site
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,

    #[serde(default)]
    pub sink: SinkKind,

    /// Periodic flush interval in seconds
    #[serde(default = "default_flush_interval")]
    pub flush_interval_secs: u64,

    /// Load stored snapshots before serving
    #[serde(default = "default_restore_on_start")]
    pub restore_on_start: bool,

    /// Default tracing level when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("backup")
}

fn default_flush_interval() -> u64 {
    60
}

fn default_restore_on_start() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            backup_dir: default_backup_dir(),
            sink: SinkKind::default(),
            flush_interval_secs: default_flush_interval(),
            restore_on_start: default_restore_on_start(),
            log_level: default_log_level(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> RegistryResult<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content).map_err(|e| {
                RegistryError::config(
                    path.display().to_string(),
                    format!("failed to parse config file: {e}"),
                )
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(RegistryError::Io(e)),
        }
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Get flush interval as Duration
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> RegistryResult<()> {
        if self.flush_interval_secs == 0 {
            return Err(RegistryError::config(
                "flush_interval_secs",
                "must be > 0",
            ));
        }

        if self.sink == SinkKind::Directory && self.backup_dir.as_os_str().is_empty() {
            return Err(RegistryError::config(
                "backup_dir",
                "must not be empty for the directory sink",
            ));
        }

        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(RegistryError::config(
                "log_level",
                format!("must be one of {}", LOG_LEVELS.join(", ")),
            ));
        }

        Ok(())
    }
}
