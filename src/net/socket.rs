//! UDP datagram transport.
//!
//! # Responsibilities
//! - Bind a receive channel on a node address
//! - Open outbound channels connected to a single peer, sourced from the local IP
//! - Send datagrams and receive them with a per-call timeout
//!
//! # Design Decisions
//! - Thin wrapper over `tokio::net::UdpSocket`
//! - Receive timeouts are expressed as `Ok(None)`, not as errors
//! - bind/connect are not time-bounded

use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;

use crate::net::envelope::Envelope;

/// Largest datagram the transport will read.
pub const MAX_DATAGRAM_LEN: usize = 65_535;

/// Error type for transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid address '{0}'")]
    Address(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("send failed: {0}")]
    Send(#[source] io::Error),

    #[error("receive failed: {0}")]
    Receive(#[source] io::Error),

    #[error("socket is not connected")]
    NotConnected,
}

/// A UDP socket used either as a receive channel or as a connected outbound channel.
#[derive(Debug)]
pub struct DatagramSocket {
    inner: UdpSocket,
    peer: Option<SocketAddr>,
}

impl DatagramSocket {
    /// Bind a receive channel on `addr` (`ip:port`).
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let parsed: SocketAddr = addr
            .parse()
            .map_err(|_| TransportError::Address(addr.to_string()))?;

        let inner = UdpSocket::bind(parsed)
            .await
            .map_err(|source| TransportError::Bind {
                addr: addr.to_string(),
                source,
            })?;

        tracing::trace!(address = %parsed, "Datagram socket bound");
        Ok(Self { inner, peer: None })
    }

    /// Open an outbound channel to `remote`, sourced from `local_ip` on an ephemeral port.
    pub async fn connect(remote: &str, local_ip: &str) -> Result<Self, TransportError> {
        let remote_addr: SocketAddr = remote
            .parse()
            .map_err(|_| TransportError::Address(remote.to_string()))?;
        let source = format!("{}:0", local_ip);
        let local_addr: SocketAddr = source
            .parse()
            .map_err(|_| TransportError::Address(source.clone()))?;

        let inner = UdpSocket::bind(local_addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: local_addr.to_string(),
                source,
            })?;
        inner
            .connect(remote_addr)
            .await
            .map_err(|source| TransportError::Connect {
                addr: remote.to_string(),
                source,
            })?;

        Ok(Self {
            inner,
            peer: Some(remote_addr),
        })
    }

    /// Send one datagram to the connected peer.
    pub async fn send(&self, payload: &[u8]) -> Result<usize, TransportError> {
        if self.peer.is_none() {
            return Err(TransportError::NotConnected);
        }
        self.inner.send(payload).await.map_err(TransportError::Send)
    }

    /// Wait up to `timeout` for one datagram.
    pub async fn recv_timeout(&self, timeout: Duration) -> Result<Option<Envelope>, TransportError> {
        let mut buffer = vec![0u8; MAX_DATAGRAM_LEN];
        match tokio::time::timeout(timeout, self.inner.recv_from(&mut buffer)).await {
            Ok(Ok((read, sender))) => {
                buffer.truncate(read);
                Ok(Some(Envelope::new(buffer, sender)))
            }
            Ok(Err(e)) => Err(TransportError::Receive(e)),
            Err(_) => Ok(None),
        }
    }

    /// True while the socket has a connected peer.
    pub fn is_connected(&self) -> bool {
        self.peer.is_some() && self.inner.peer_addr().is_ok()
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.inner
            .local_addr()
            .map_err(|source| TransportError::Bind {
                addr: "local".to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connected_send_reaches_bound_socket() {
        let server = DatagramSocket::bind("127.0.0.1:0").await.unwrap();
        let server_addr = server.local_addr().unwrap().to_string();

        let client = DatagramSocket::connect(&server_addr, "127.0.0.1").await.unwrap();
        assert!(client.is_connected());
        client.send(b"WOWZA").await.unwrap();

        let envelope = server
            .recv_timeout(Duration::from_secs(2))
            .await
            .unwrap()
            .expect("datagram should arrive");
        assert_eq!(envelope.payload(), b"WOWZA");
        assert_eq!(envelope.sender(), client.local_addr().unwrap());
    }

    #[tokio::test]
    async fn recv_timeout_returns_none() {
        let server = DatagramSocket::bind("127.0.0.1:0").await.unwrap();
        let received = server.recv_timeout(Duration::from_millis(20)).await.unwrap();
        assert!(received.is_none());
    }

    #[tokio::test]
    async fn unconnected_send_is_rejected() {
        let socket = DatagramSocket::bind("127.0.0.1:0").await.unwrap();
        assert!(matches!(
            socket.send(b"x").await,
            Err(TransportError::NotConnected)
        ));
        assert!(!socket.is_connected());
    }

    #[tokio::test]
    async fn bad_address_is_reported() {
        assert!(matches!(
            DatagramSocket::bind("nonsense").await,
            Err(TransportError::Address(_))
        ));
    }
}
