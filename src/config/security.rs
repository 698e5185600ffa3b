//! Security configuration for clone counting and ban-mask sanity checks.

use serde::Deserialize;

use crate::security::XLineKind;

/// Address-range sizes used to group connections for clone counting.
///
/// Two addresses with the same leading `ipv4_prefix` (or `ipv6_prefix`)
/// bits count as clones of each other.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CloneConfig {
    /// Prefix length for IPv4 clone ranges (default: 32).
    #[serde(default = "default_ipv4_prefix")]
    pub ipv4_prefix: u8,
    /// Prefix length for IPv6 clone ranges (default: 128).
    #[serde(default = "default_ipv6_prefix")]
    pub ipv6_prefix: u8,
}

impl Default for CloneConfig {
    fn default() -> Self {
        Self {
            ipv4_prefix: default_ipv4_prefix(),
            ipv6_prefix: default_ipv6_prefix(),
        }
    }
}

fn default_ipv4_prefix() -> u8 {
    32
}

fn default_ipv6_prefix() -> u8 {
    128
}

/// Insane ban detection.
///
/// A new ban whose mask covers more than `trigger` percent of the known
/// user population is refused, unless the bypass flag for its kind is set.
#[derive(Debug, Clone, Deserialize)]
pub struct InsaneConfig {
    /// Coverage percentage above which a mask is insane (default: 95.5).
    #[serde(default = "default_trigger")]
    trigger: f64,
    /// Allow insane K/G/E masks.
    #[serde(default)]
    pub hostmasks: bool,
    /// Allow insane Z masks.
    #[serde(default)]
    pub ipmasks: bool,
    /// Allow insane Q masks.
    #[serde(default)]
    pub nickmasks: bool,
    /// Allow insane R masks.
    #[serde(default)]
    pub realnames: bool,
}

impl Default for InsaneConfig {
    fn default() -> Self {
        Self {
            trigger: default_trigger(),
            hostmasks: false,
            ipmasks: false,
            nickmasks: false,
            realnames: false,
        }
    }
}

impl InsaneConfig {
    /// Coverage trigger, clamped to 0..=100.
    pub fn trigger(&self) -> f64 {
        if self.trigger.is_nan() {
            return default_trigger();
        }
        self.trigger.clamp(0.0, 100.0)
    }

    /// Set the coverage trigger.
    pub fn with_trigger(mut self, trigger: f64) -> Self {
        self.trigger = trigger;
        self
    }

    /// Whether insane masks of `kind` are allowed anyway.
    pub fn bypass(&self, kind: XLineKind) -> bool {
        match kind {
            XLineKind::K | XLineKind::G | XLineKind::E => self.hostmasks,
            XLineKind::Z => self.ipmasks,
            XLineKind::Q => self.nickmasks,
            XLineKind::R => self.realnames,
        }
    }
}

fn default_trigger() -> f64 {
    95.5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_is_clamped() {
        assert_eq!(InsaneConfig::default().with_trigger(250.0).trigger(), 100.0);
        assert_eq!(InsaneConfig::default().with_trigger(-3.0).trigger(), 0.0);
        assert_eq!(InsaneConfig::default().with_trigger(42.0).trigger(), 42.0);
    }

    #[test]
    fn bypass_flags_map_to_kinds() {
        let cfg = InsaneConfig {
            hostmasks: true,
            ..InsaneConfig::default()
        };
        assert!(cfg.bypass(XLineKind::K));
        assert!(cfg.bypass(XLineKind::G));
        assert!(cfg.bypass(XLineKind::E));
        assert!(!cfg.bypass(XLineKind::Z));
        assert!(!cfg.bypass(XLineKind::Q));
    }

    #[test]
    fn clone_prefixes_default_to_single_address() {
        let cfg = CloneConfig::default();
        assert_eq!(cfg.ipv4_prefix, 32);
        assert_eq!(cfg.ipv6_prefix, 128);
    }
}
