//! TOML-based configuration persistence for the client.
//!
//! Reads and writes `ClientConfig` to the platform-appropriate config file:
//! - Windows:  `%APPDATA%\Playlink\config.toml`
//! - Linux:    `~/.config/playlink/config.toml`
//! - macOS:    `~/Library/Application Support/Playlink/config.toml`
//!
//! ```toml
//! [client]
//! name = "kitchen tablet"
//! image_size = 240
//!
//! [session]
//! default_target = "192.168.1.20:7700"
//! reconnect = true
//! handshake_timeout_ms = 15000
//! ```
//!
//! Every field has a default, so a missing file, a missing section or a
//! missing key all load cleanly.  `client_id` is generated on first run and
//! written back so the server sees the same identity every time.

use std::path::{Path, PathBuf};
use std::time::Duration;

use playlink_core::protocol::messages::{capabilities, ClientInfo};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::infrastructure::network::TcpTransportConfig;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level client configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    #[serde(default)]
    pub client: ClientSection,
    #[serde(default)]
    pub session: SessionSection,
}

/// Identity this client presents during the handshake.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientSection {
    /// Human-readable name shown by the server.
    #[serde(default = "default_name")]
    pub name: String,
    /// Stable identity; generated on first run when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<Uuid>,
    /// Edge length in pixels of the largest artwork this client displays.
    #[serde(default = "default_image_size")]
    pub image_size: u16,
    /// `tracing` filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Connection and session timing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionSection {
    /// `host:port` to connect to on start-up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_target: Option<String>,
    /// Re-establish the channel after an unsolicited disconnect.
    #[serde(default = "default_true")]
    pub reconnect: bool,
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// How long to wait for player info; absent means wait indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handshake_timeout_ms: Option<u64>,
    /// Pause after the logoff request before the channel is torn down.
    #[serde(default = "default_logoff_grace_ms")]
    pub logoff_grace_ms: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_name() -> String {
    "playlink".to_string()
}
fn default_image_size() -> u16 {
    128
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_reconnect_interval_ms() -> u64 {
    5_000
}
fn default_connect_timeout_ms() -> u64 {
    10_000
}
fn default_logoff_grace_ms() -> u64 {
    200
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            name: default_name(),
            client_id: None,
            image_size: default_image_size(),
            log_level: default_log_level(),
        }
    }
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            default_target: None,
            reconnect: default_true(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            handshake_timeout_ms: None,
            logoff_grace_ms: default_logoff_grace_ms(),
        }
    }
}

impl ClientConfig {
    /// Returns the client id, generating one if the config has none.
    ///
    /// The flag is `true` when a new id was generated and the config should
    /// be saved.
    pub fn ensure_client_id(&mut self) -> (Uuid, bool) {
        match self.client.client_id {
            Some(id) => (id, false),
            None => {
                let id = Uuid::new_v4();
                self.client.client_id = Some(id);
                (id, true)
            }
        }
    }

    /// Builds the handshake identity record.  Uses the nil id when no id has
    /// been assigned yet.
    pub fn client_info(&self) -> ClientInfo {
        ClientInfo::new(
            self.client.client_id.unwrap_or_else(Uuid::nil),
            self.client.name.clone(),
            self.client.image_size,
            capabilities::ALL,
        )
    }
}

impl SessionSection {
    pub fn handshake_timeout(&self) -> Option<Duration> {
        self.handshake_timeout_ms.map(Duration::from_millis)
    }

    pub fn logoff_grace(&self) -> Duration {
        Duration::from_millis(self.logoff_grace_ms)
    }

    pub fn transport_config(&self) -> TcpTransportConfig {
        TcpTransportConfig {
            reconnect: self.reconnect,
            reconnect_interval: Duration::from_millis(self.reconnect_interval_ms),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `ClientConfig` from `path`, returning the default config if the file
/// does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<ClientConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ClientConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Loads `ClientConfig` from the default location.
///
/// # Errors
///
/// See [`load_config_from`].
pub fn load_config() -> Result<ClientConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(config: &ClientConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes `config` to the default location.
///
/// # Errors
///
/// See [`save_config_to`].
pub fn save_config(config: &ClientConfig) -> Result<(), ConfigError> {
    save_config_to(config, &config_file_path()?)
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("Playlink"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("playlink"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("Playlink")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
