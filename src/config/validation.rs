//! Configuration validation.
//!
//! # Responsibilities
//! - Check required keys are present
//! - Validate value shapes (IP address, port range, timeouts, exporter address)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: Configuration → Result<(), Vec<ValidationIssue>>
//! - Runs before config is accepted into the system
//! - Unknown keys are accepted; services read their own keys

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::config::schema::{
    Configuration, KEY_METRICS_ADDRESS, KEY_PORT, KEY_SELF_IP, KEY_SOCKET_TIMEOUT_MS,
    KEY_VERBOSE, REQUIRED_KEYS,
};

/// A single problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    Missing(&'static str),
    Invalid { key: &'static str, value: String },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::Missing(key) => write!(f, "missing required key '{}'", key),
            ValidationIssue::Invalid { key, value } => {
                write!(f, "invalid value '{}' for key '{}'", value, key)
            }
        }
    }
}

/// Validate a configuration, collecting every issue.
pub fn validate_config(config: &Configuration) -> Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();

    for key in REQUIRED_KEYS {
        if config.safe_at(key).is_empty() {
            issues.push(ValidationIssue::Missing(key));
        }
    }

    check(config, KEY_SELF_IP, &mut issues, |v| v.parse::<IpAddr>().is_ok());
    check(config, KEY_PORT, &mut issues, |v| {
        v.parse::<u16>().map(|p| p != 0).unwrap_or(false)
    });
    check(config, KEY_SOCKET_TIMEOUT_MS, &mut issues, |v| {
        v.parse::<u64>().map(|ms| ms > 0).unwrap_or(false)
    });
    check(config, KEY_VERBOSE, &mut issues, |v| {
        matches!(v, "true" | "false" | "1" | "0" | "yes" | "no")
    });
    check(config, KEY_METRICS_ADDRESS, &mut issues, |v| {
        v.parse::<SocketAddr>().is_ok()
    });

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

/// Record an issue when `key` is set to a non-empty value that fails `valid`.
fn check(
    config: &Configuration,
    key: &'static str,
    issues: &mut Vec<ValidationIssue>,
    valid: impl Fn(&str) -> bool,
) {
    let value = config.safe_at(key);
    if !value.is_empty() && !valid(value) {
        issues.push(ValidationIssue::Invalid {
            key,
            value: value.to_string(),
        });
    }
}
