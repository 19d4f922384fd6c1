//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for Ctrl+C
//! - Translate it into a terminate message to the local node
//!
//! # Design Decisions
//! - The node is stopped through its own message path, so the loop drains and
//!   finalizes exactly as it would for a remote terminate
//! - A second Ctrl+C while the node is still draining exits the process

use std::time::Duration;

use crate::client::{self, ClientError};
use crate::http::status;
use crate::net::Endpoint;

/// How long to wait for the node to acknowledge the terminate message.
pub const TERMINATE_ACK_TIMEOUT: Duration = Duration::from_secs(1);

/// Wait for Ctrl+C, then ask `node` to terminate.
pub async fn terminate_on_ctrl_c(node: Endpoint) -> Result<(), ClientError> {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        return Ok(());
    }
    tracing::info!(tag = %node.tag(), "Shutdown signal received");

    let reply = client::terminate_node(&node, TERMINATE_ACK_TIMEOUT).await?;
    if reply.status() != Some(status::OK) {
        tracing::warn!(
            tag = %node.tag(),
            status = reply.status().unwrap_or_default(),
            "Terminate not acknowledged"
        );
    }

    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::warn!("Second shutdown signal, exiting immediately");
        std::process::exit(130);
    }
    Ok(())
}
