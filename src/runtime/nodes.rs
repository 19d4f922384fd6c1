//! Known-node table.
//!
//! # Responsibilities
//! - Keep one neighbor (and its outbound channel) per tag
//! - Connect new neighbors from the local node's address
//!
//! # Design Decisions
//! - Keyed by tag; a second node with a known tag is rejected, not replaced
//! - Removing a node drops its neighbor, which closes the channel

use std::collections::BTreeMap;

use crate::net::{Endpoint, Neighbor, TransportError};
use crate::observability::metrics;

/// Errors from node-table operations.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("node '{0}' is already known")]
    AlreadyKnown(String),

    #[error("node '{0}' is not known")]
    Unknown(String),

    #[error("could not open a channel to '{tag}': {source}")]
    Transport {
        tag: String,
        #[source]
        source: TransportError,
    },

    #[error("channel to '{0}' is not connected")]
    NotConnected(String),
}

/// Neighbors keyed by tag.
#[derive(Debug)]
pub struct NodeTable {
    local_ip: String,
    nodes: BTreeMap<String, Neighbor>,
}

impl NodeTable {
    /// An empty table whose channels are sourced from `local_ip`.
    pub fn new(local_ip: impl Into<String>) -> Self {
        Self {
            local_ip: local_ip.into(),
            nodes: BTreeMap::new(),
        }
    }

    /// Connect to `endpoint` and remember it under its tag.
    pub async fn add(&mut self, endpoint: Endpoint) -> Result<&Neighbor, NodeError> {
        let tag = endpoint.tag().to_string();
        if self.nodes.contains_key(&tag) {
            return Err(NodeError::AlreadyKnown(tag));
        }

        let neighbor = Neighbor::connect(endpoint, &self.local_ip)
            .await
            .map_err(|source| NodeError::Transport {
                tag: tag.clone(),
                source,
            })?;
        if !neighbor.connected() {
            return Err(NodeError::NotConnected(tag));
        }

        self.nodes.insert(tag.clone(), neighbor);
        metrics::record_known_nodes(self.nodes.len());
        self.nodes.get(&tag).ok_or(NodeError::Unknown(tag))
    }

    /// Forget the node with the same tag as `endpoint`, closing its channel.
    pub fn delete(&mut self, endpoint: &Endpoint) -> Result<Neighbor, NodeError> {
        let removed = self
            .nodes
            .remove(endpoint.tag())
            .ok_or_else(|| NodeError::Unknown(endpoint.tag().to_string()))?;
        metrics::record_known_nodes(self.nodes.len());
        Ok(removed)
    }

    pub fn find(&self, tag: &str) -> Option<&Neighbor> {
        self.nodes.get(tag)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.nodes.contains_key(tag)
    }

    /// Directory listing, ordered by tag.
    pub fn entries(&self) -> Vec<Endpoint> {
        self.nodes.values().map(|n| n.endpoint().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Drop every neighbor.
    pub fn clear(&mut self) {
        self.nodes.clear();
        metrics::record_known_nodes(0);
    }
}
