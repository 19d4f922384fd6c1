//! Configuration schema definitions.
//!
//! A node is configured by a flat string map. The runtime reads the keys
//! below; services may read any additional key they need.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// IP address the node binds and sends from.
pub const KEY_SELF_IP: &str = "self_ip";
/// UDP port the node receives on.
pub const KEY_PORT: &str = "port";
/// Logical name of the node.
pub const KEY_TAG: &str = "tag";
/// `true` raises per-transaction logging from debug to info.
pub const KEY_VERBOSE: &str = "verbose";
/// Receive timeout of the run loop while no events are queued.
pub const KEY_SOCKET_TIMEOUT_MS: &str = "socket_timeout_ms";
/// Default tracing filter directive, overridden by `RUST_LOG`.
pub const KEY_LOG_LEVEL: &str = "log_level";
/// Bind address of the Prometheus exporter; absent means no exporter.
pub const KEY_METRICS_ADDRESS: &str = "metrics_address";

pub const REQUIRED_KEYS: [&str; 3] = [KEY_SELF_IP, KEY_PORT, KEY_TAG];

pub const DEFAULT_SOCKET_TIMEOUT: Duration = Duration::from_millis(3000);
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Flat key/value node configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration {
    entries: BTreeMap<String, String>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// The value for `key`, or an empty string when absent.
    pub fn safe_at(&self, key: &str) -> &str {
        self.get(key).unwrap_or_default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Merge `addendum` into this configuration; its values win on conflicts.
    pub fn incorporate(&mut self, addendum: &Configuration) {
        for (key, value) in &addendum.entries {
            self.entries.insert(key.clone(), value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn verbose(&self) -> bool {
        matches!(self.safe_at(KEY_VERBOSE), "true" | "1" | "yes")
    }

    /// Receive timeout for an idle loop; falls back to the default on a missing or bad value.
    pub fn socket_timeout(&self) -> Duration {
        self.get(KEY_SOCKET_TIMEOUT_MS)
            .and_then(|raw| raw.parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_SOCKET_TIMEOUT)
    }

    pub fn log_level(&self) -> &str {
        self.get(KEY_LOG_LEVEL).unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn metrics_address(&self) -> Option<&str> {
        self.get(KEY_METRICS_ADDRESS).filter(|addr| !addr.is_empty())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Configuration {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
