//! A known node together with its outbound channel.

use std::ops::Deref;

use crate::http::{headers, Message, Method};
use crate::net::endpoint::Endpoint;
use crate::net::socket::{DatagramSocket, TransportError};

/// A node with an established outbound channel.
///
/// The channel lives exactly as long as the neighbor: dropping it closes the socket.
#[derive(Debug)]
pub struct Neighbor {
    endpoint: Endpoint,
    socket: DatagramSocket,
}

impl Neighbor {
    /// Open a channel toward `endpoint`, using `local_ip` as the source address.
    pub async fn connect(endpoint: Endpoint, local_ip: &str) -> Result<Self, TransportError> {
        let socket = DatagramSocket::connect(&endpoint.address(), local_ip).await?;
        tracing::trace!(
            tag = %endpoint.tag(),
            remote = %endpoint.address(),
            "Neighbor channel opened"
        );
        Ok(Self { endpoint, socket })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Whether the outbound channel still has a peer.
    pub fn connected(&self) -> bool {
        self.socket.is_connected()
    }

    pub async fn send(&self, payload: &[u8]) -> Result<usize, TransportError> {
        self.socket.send(payload).await
    }

    /// A request already addressed to this neighbor.
    pub fn request(&self, method: Method, path: impl Into<String>) -> Message {
        let mut message = Message::request(method, path);
        message
            .headers
            .insert(headers::SERVICE_DST, self.endpoint.to_record());
        message
    }

    /// A response already addressed to this neighbor.
    pub fn response(&self, status: u16) -> Message {
        let mut message = Message::response(status);
        message
            .headers
            .insert(headers::SERVICE_DST, self.endpoint.to_record());
        message
    }
}

impl Deref for Neighbor {
    type Target = Endpoint;

    fn deref(&self) -> &Self::Target {
        &self.endpoint
    }
}
