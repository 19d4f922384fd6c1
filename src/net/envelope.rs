//! Raw datagram plus sender address.

use std::net::SocketAddr;

/// A received datagram as it came off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    payload: Vec<u8>,
    sender: SocketAddr,
}

impl Envelope {
    pub fn new(payload: Vec<u8>, sender: SocketAddr) -> Self {
        Self { payload, sender }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn sender(&self) -> SocketAddr {
        self.sender
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Lossy text view for logging.
    pub fn to_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}
