//! Connection admission limits configuration.

use serde::Deserialize;

/// Connection admission limits.
///
/// Clone limits apply per address range (see [`super::CloneConfig`]);
/// a value of 0 disables that limit.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum simultaneous local connections (default: 1024).
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
    /// Maximum connections from one address range to this server (default: 3).
    #[serde(default = "default_clone_max")]
    pub local_max: u32,
    /// Maximum connections from one address range network-wide (default: 3).
    #[serde(default = "default_clone_max")]
    pub global_max: u32,
    /// Command-flood penalty removed per maintenance tick (default: 1000).
    #[serde(default = "default_command_rate")]
    pub command_rate: u32,
    /// Input is throttled while the penalty exceeds this value (default: 10000).
    #[serde(default = "default_penalty_threshold")]
    pub penalty_threshold: u32,
    /// Maximum nickname length (default: 30).
    #[serde(default = "default_nick_max_len")]
    pub nick_max_len: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_clients: default_max_clients(),
            local_max: default_clone_max(),
            global_max: default_clone_max(),
            command_rate: default_command_rate(),
            penalty_threshold: default_penalty_threshold(),
            nick_max_len: default_nick_max_len(),
        }
    }
}

fn default_max_clients() -> usize {
    1024
}

fn default_clone_max() -> u32 {
    3
}

fn default_command_rate() -> u32 {
    1000
}

fn default_penalty_threshold() -> u32 {
    10_000
}

fn default_nick_max_len() -> usize {
    30
}
