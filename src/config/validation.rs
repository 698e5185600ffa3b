//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("server.name is required")]
    MissingServerName,
    #[error("server.network is required")]
    MissingNetworkName,
    #[error("server.sid must be exactly 3 characters, got {0}")]
    InvalidSid(usize),
    #[error("server.sid must match pattern [0-9][A-Z0-9][A-Z0-9], got '{0}'")]
    InvalidSidFormat(String),
    #[error("clones.ipv4_prefix must be at most 32, got {0}")]
    InvalidIpv4Prefix(u8),
    #[error("clones.ipv6_prefix must be at most 128, got {0}")]
    InvalidIpv6Prefix(u8),
    #[error("idle_timeouts.ping must be non-zero")]
    ZeroPingInterval,
    #[error("limits.nick_max_len must be non-zero")]
    ZeroNickLength,
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    // Required fields
    if config.server.name.is_empty() {
        errors.push(ValidationError::MissingServerName);
    }
    if config.server.network.is_empty() {
        errors.push(ValidationError::MissingNetworkName);
    }

    // SID validation (TS6 format)
    let sid = &config.server.sid;
    if sid.len() != 3 {
        errors.push(ValidationError::InvalidSid(sid.len()));
    } else {
        let bytes = sid.as_bytes();
        let valid = bytes[0].is_ascii_digit()
            && bytes[1..]
                .iter()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit());
        if !valid {
            errors.push(ValidationError::InvalidSidFormat(sid.clone()));
        }
    }

    if config.clones.ipv4_prefix > 32 {
        errors.push(ValidationError::InvalidIpv4Prefix(config.clones.ipv4_prefix));
    }
    if config.clones.ipv6_prefix > 128 {
        errors.push(ValidationError::InvalidIpv6Prefix(config.clones.ipv6_prefix));
    }

    if config.idle_timeouts.ping == 0 {
        errors.push(ValidationError::ZeroPingInterval);
    }
    if config.limits.nick_max_len == 0 {
        errors.push(ValidationError::ZeroNickLength);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
