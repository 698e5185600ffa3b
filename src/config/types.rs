//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use super::channels::ChannelsConfig;
use super::limits::LimitsConfig;
use super::security::{CloneConfig, InsaneConfig};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server information.
    pub server: ServerConfig,
    /// Connection admission limits.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Address-range sizes used for clone counting.
    #[serde(default)]
    pub clones: CloneConfig,
    /// Ban-mask sanity checks.
    #[serde(default)]
    pub insane: InsaneConfig,
    /// Channel behaviour (invite announcements, half-op rank).
    #[serde(default)]
    pub channels: ChannelsConfig,
    /// STATS access control.
    #[serde(default)]
    pub stats: StatsConfig,
    /// Idle timeout configuration for ping/pong keepalive.
    #[serde(default)]
    pub idle_timeouts: IdleTimeoutsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            limits: LimitsConfig::default(),
            clones: CloneConfig::default(),
            insane: InsaneConfig::default(),
            channels: ChannelsConfig::default(),
            stats: StatsConfig::default(),
            idle_timeouts: IdleTimeoutsConfig::default(),
        }
    }
}

/// Server identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server name (e.g., "irc.straylight.net").
    pub name: String,
    /// Network name (e.g., "Straylight").
    pub network: String,
    /// Server ID for TS6 (3 characters).
    pub sid: String,
    /// Server description.
    #[serde(default)]
    pub description: String,
    /// Port for the Prometheus `/metrics` endpoint. 0 disables it.
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "irc.straylight.net".to_string(),
            network: "Straylight".to_string(),
            sid: "0AA".to_string(),
            description: String::new(),
            metrics_port: None,
        }
    }
}

/// STATS access configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StatsConfig {
    /// Symbols any registered user may request (default: "Pu").
    #[serde(default = "default_userstats")]
    pub userstats: String,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            userstats: default_userstats(),
        }
    }
}

impl StatsConfig {
    /// Whether `symbol` may be requested without operator privileges.
    pub fn is_public(&self, symbol: char) -> bool {
        self.userstats.contains(symbol)
    }
}

fn default_userstats() -> String {
    "Pu".to_string()
}

/// Idle timeout configuration for client connection keepalive.
///
/// A PING is sent to every registered local client each `ping` seconds.
/// A client that has not answered the previous PING by the time the next
/// one is due is disconnected with "Ping timeout".
#[derive(Debug, Clone, Deserialize)]
pub struct IdleTimeoutsConfig {
    /// Seconds between PINGs to registered clients (default: 120).
    #[serde(default = "default_ping_interval")]
    pub ping: u64,

    /// Seconds allowed for the registration handshake before disconnect (default: 60).
    #[serde(default = "default_registration_timeout")]
    pub registration: u64,
}

impl Default for IdleTimeoutsConfig {
    fn default() -> Self {
        Self {
            ping: default_ping_interval(),
            registration: default_registration_timeout(),
        }
    }
}

fn default_ping_interval() -> u64 {
    120
}

fn default_registration_timeout() -> u64 {
    60
}

pub(super) fn default_true() -> bool {
    true
}
