//! Channel behaviour configuration.

use serde::Deserialize;

use super::types::default_true;

/// Who is told when a channel member invites someone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteAnnounce {
    /// Nobody.
    None,
    /// Channel operators.
    Ops,
    /// Members at the lowest elevated rank (half-operator when enabled).
    #[default]
    Dynamic,
}

/// Channel configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelsConfig {
    /// Invite announcement policy (default: dynamic).
    #[serde(default)]
    pub invite_announce: InviteAnnounce,
    /// Whether the half-operator rank exists (default: true).
    #[serde(default = "default_true")]
    pub halfop: bool,
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            invite_announce: InviteAnnounce::default(),
            halfop: true,
        }
    }
}
