//! Daemon configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use pcvc_core::ProtocolVersion;
use pcvc_proto::{DEFAULT_MAX_FRAME_BYTES, DEFAULT_PORT, ServerConfig};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Daemon settings
    #[serde(default)]
    pub daemon: DaemonConfig,
    /// Listener settings
    #[serde(default)]
    pub server: ListenConfig,
    /// Protocol settings
    #[serde(default)]
    pub protocol: ProtocolConfig,
    /// Mixer backend settings
    #[serde(default)]
    pub mixer: MixerConfig,
}

/// Daemon-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Log level, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self { log_level: default_log_level() }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenConfig {
    /// Address to accept clients on
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Longest accepted message, in bytes
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
    /// Seconds a client may stay silent before it is dropped (0 disables)
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_frame_bytes: default_max_frame_bytes(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

fn default_listen() -> String {
    format!("127.0.0.1:{DEFAULT_PORT}")
}

fn default_max_frame_bytes() -> usize {
    DEFAULT_MAX_FRAME_BYTES
}

fn default_idle_timeout_secs() -> u64 {
    300
}

/// Protocol settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Version clients must speak
    #[serde(default = "default_version")]
    pub version: u32,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self { version: default_version() }
    }
}

fn default_version() -> u32 {
    ProtocolVersion::CURRENT.0
}

/// Mixer backend settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MixerConfig {
    /// JSON file holding the initial mixer state (uses a demo state if not set)
    pub seed_path: Option<PathBuf>,
}

impl Config {
    #[must_use]
    pub fn protocol_version(&self) -> ProtocolVersion {
        ProtocolVersion(self.protocol.version)
    }

    /// Settings for the protocol server.
    #[must_use]
    pub fn server_config(&self) -> ServerConfig {
        let idle = self.server.idle_timeout_secs;
        ServerConfig {
            version: self.protocol_version(),
            max_frame_bytes: self.server.max_frame_bytes,
            idle_timeout: (idle > 0).then(|| Duration::from_secs(idle)),
        }
    }
}

/// Load configuration from file or defaults.
pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

/// Load configuration from `config_path`, falling back to defaults if it is absent.
pub fn load_config_from(config_path: &Path) -> Result<Config> {
    if config_path.exists() {
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {config_path:?}"))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {config_path:?}"))?;
        Ok(config)
    } else {
        info!(?config_path, "Config file not found, using defaults");
        Ok(Config::default())
    }
}

/// Get the configuration file path.
fn config_path() -> Result<PathBuf> {
    let dirs =
        ProjectDirs::from("com", "pcvc", "PCVC").context("Could not determine config directory")?;
    Ok(dirs.config_dir().join("config.toml"))
}
