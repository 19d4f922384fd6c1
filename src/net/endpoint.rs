//! Node identity: address plus logical tag.
//!
//! # Responsibilities
//! - Represent a reachable node (`ip`, `port`, `tag`)
//! - Convert to and from the node directory record used in headers and payloads
//! - Build the local identity from configuration
//!
//! # Design Decisions
//! - The tag is the identity used for routing and addressing, never the raw address
//! - Endpoints are immutable once built
//! - Ephemeral nodes are recognized by a tag prefix, not by a flag on the wire

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{Configuration, ConfigError, ValidationIssue, KEY_PORT, KEY_SELF_IP, KEY_TAG};

/// Tag prefix marking nodes created solely to receive one reply.
pub const EPHEMERAL_PREFIX: &str = "temp_";

/// Errors produced while decoding endpoints.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EndpointError {
    #[error("invalid node record: {0}")]
    Record(String),

    #[error("invalid endpoint address '{0}'")]
    Address(String),
}

/// Address + port + logical tag identifying a reachable node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    ip: String,
    port: u16,
    tag: String,
}

/// Wire form of an endpoint: `{"endpoint": "<ip:port>", "tag": "<name>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEntry {
    pub endpoint: String,
    pub tag: String,
}

impl Endpoint {
    pub fn new(ip: impl Into<String>, port: u16, tag: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            port,
            tag: tag.into(),
        }
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// `ip:port`, as used for binding and connecting.
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    /// True when this node only exists to receive a single reply.
    pub fn is_ephemeral(&self) -> bool {
        self.tag.starts_with(EPHEMERAL_PREFIX)
    }

    /// The same address under a different tag.
    pub fn with_tag(&self, tag: impl Into<String>) -> Self {
        Self {
            ip: self.ip.clone(),
            port: self.port,
            tag: tag.into(),
        }
    }

    pub fn entry(&self) -> NodeEntry {
        NodeEntry {
            endpoint: self.address(),
            tag: self.tag.clone(),
        }
    }

    /// Serialize as a node directory record.
    pub fn to_record(&self) -> String {
        // Serializing two strings cannot fail.
        serde_json::to_string(&self.entry()).unwrap_or_default()
    }

    /// Decode a node directory record.
    pub fn from_record(record: &str) -> Result<Self, EndpointError> {
        let entry: NodeEntry = serde_json::from_str(record)
            .map_err(|e| EndpointError::Record(e.to_string()))?;
        Self::try_from(entry)
    }

    /// Parse `scheme://host:port[/path]` or `host:port`; the tag defaults to the host.
    pub fn parse_url(url: &str) -> Result<Self, EndpointError> {
        let rest = strip_scheme(url);
        let authority = rest.split('/').next().unwrap_or_default();
        let (host, port) = split_host_port(authority)
            .ok_or_else(|| EndpointError::Address(url.to_string()))?;
        Ok(Self::new(host, port, host))
    }

    /// Build the local node identity from the `self_ip`, `port` and `tag` keys.
    pub fn from_configuration(config: &Configuration) -> Result<Self, ConfigError> {
        let mut issues = Vec::new();
        let ip = config.safe_at(KEY_SELF_IP);
        let tag = config.safe_at(KEY_TAG);
        let port = config.safe_at(KEY_PORT);

        if ip.is_empty() {
            issues.push(ValidationIssue::Missing(KEY_SELF_IP));
        }
        if tag.is_empty() {
            issues.push(ValidationIssue::Missing(KEY_TAG));
        }
        let port = match port.parse::<u16>() {
            Ok(p) => Some(p),
            Err(_) if port.is_empty() => {
                issues.push(ValidationIssue::Missing(KEY_PORT));
                None
            }
            Err(_) => {
                issues.push(ValidationIssue::Invalid {
                    key: KEY_PORT,
                    value: port.to_string(),
                });
                None
            }
        };

        match port {
            Some(port) if issues.is_empty() => Ok(Self::new(ip, port, tag)),
            _ => Err(ConfigError::Validation(issues)),
        }
    }
}

impl TryFrom<NodeEntry> for Endpoint {
    type Error = EndpointError;

    fn try_from(entry: NodeEntry) -> Result<Self, Self::Error> {
        if entry.tag.is_empty() || entry.endpoint.is_empty() {
            return Err(EndpointError::Record(format!(
                "empty field in {{endpoint: {:?}, tag: {:?}}}",
                entry.endpoint, entry.tag
            )));
        }
        let (host, port) = split_host_port(&entry.endpoint)
            .ok_or_else(|| EndpointError::Address(entry.endpoint.clone()))?;
        Ok(Self::new(host, port, entry.tag))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.tag, self.ip, self.port)
    }
}

fn strip_scheme(url: &str) -> &str {
    ["http://", "tcp://", "udp://"]
        .iter()
        .find_map(|scheme| url.strip_prefix(scheme))
        .unwrap_or(url)
}

fn split_host_port(authority: &str) -> Option<(&str, u16)> {
    let (host, port) = authority.rsplit_once(':')?;
    if host.is_empty() {
        return None;
    }
    Some((host, port.parse().ok()?))
}
