//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Core config struct definitions (Config, ServerConfig, IdleTimeoutsConfig)
//! - [`limits`]: Connection admission limits (LimitsConfig)
//! - [`security`]: Clone ranges and ban-mask sanity checks (CloneConfig, InsaneConfig)
//! - [`channels`]: Channel behaviour (ChannelsConfig, InviteAnnounce)
//! - [`validation`]: Startup validation

mod channels;
mod limits;
mod security;
mod types;
mod validation;

pub use channels::{ChannelsConfig, InviteAnnounce};
pub use limits::LimitsConfig;
pub use security::{CloneConfig, InsaneConfig};
pub use types::{Config, ConfigError, IdleTimeoutsConfig, ServerConfig, StatsConfig};
pub use validation::{ValidationError, validate};
