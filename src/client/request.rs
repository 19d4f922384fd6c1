//! One-shot request helpers for processes that are not running a messenger.
//!
//! # Responsibilities
//! - Find a free ephemeral port to receive the reply on
//! - Address the request from a `temp_` node so the receiver forgets it afterwards
//! - Send, and for the sync variant wait for exactly one datagram
//!
//! # Design Decisions
//! - A reply timeout is a 408 response, not an error
//! - No retries; delivery is at most once
//! - Every call opens and drops its own sockets

use std::ops::RangeInclusive;
use std::time::Duration;

use rand::Rng;

use crate::http::{headers, parse, serialize, status, validate, Message, Method};
use crate::http::{ParseError, SerializeError, ValidationError};
use crate::net::{DatagramSocket, Endpoint, EndpointError, Neighbor, TransportError, EPHEMERAL_PREFIX};
use crate::runtime::EventType;

/// Ports tried for the reply socket.
pub const CLIENT_PORT_RANGE: RangeInclusive<u16> = 5050..=9090;
/// Random attempts before giving up on binding a reply socket.
pub const MAX_BIND_TRIALS: usize = 300;
/// Port conventionally used by service nodes.
pub const DEFAULT_SERVICE_PORT: u16 = 40401;
/// Port conventionally used by request-issuing nodes.
pub const DEFAULT_REQUEST_PORT: u16 = 40400;
/// Reply timeout used by the command-line client.
pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_millis(300);

/// Error type for client helpers.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("no free port on {ip} after {trials} attempts")]
    NoEphemeralPort { ip: String, trials: usize },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("request rejected: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Serialize(#[from] SerializeError),

    #[error("unreadable reply: {0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Endpoint(#[from] EndpointError),
}

/// Bind a receive socket on `ip` at a random port from [`CLIENT_PORT_RANGE`].
pub async fn bind_ephemeral(ip: &str) -> Result<(DatagramSocket, u16), ClientError> {
    for _ in 0..MAX_BIND_TRIALS {
        let port = rand::thread_rng().gen_range(CLIENT_PORT_RANGE);
        match DatagramSocket::bind(&format!("{ip}:{port}")).await {
            Ok(socket) => return Ok((socket, port)),
            Err(TransportError::Bind { .. }) => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Err(ClientError::NoEphemeralPort {
        ip: ip.to_string(),
        trials: MAX_BIND_TRIALS,
    })
}

/// Channels and wire bytes for one client transaction.
struct Prepared {
    neighbor: Neighbor,
    reply_socket: DatagramSocket,
    payload: Vec<u8>,
}

async fn prepare(
    mut request: Message,
    source_ip: &str,
    source_tag: &str,
    dest: &Endpoint,
) -> Result<Prepared, ClientError> {
    let neighbor = Neighbor::connect(dest.clone(), source_ip).await?;
    let (reply_socket, port) = bind_ephemeral(source_ip).await?;

    let source = Endpoint::new(source_ip, port, format!("{EPHEMERAL_PREFIX}{source_tag}"));
    request.headers.insert(headers::SERVICE_SRC, source.to_record());
    if !request.headers.contains(headers::SERVICE_DST) {
        request.headers.insert(headers::SERVICE_DST, dest.to_record());
    }

    validate(&request)?;
    let payload = serialize(&request)?;

    Ok(Prepared {
        neighbor,
        reply_socket,
        payload,
    })
}

async fn exchange(prepared: Prepared, dest: &Endpoint, timeout: Duration) -> Result<Message, ClientError> {
    prepared.neighbor.send(&prepared.payload).await?;

    match prepared.reply_socket.recv_timeout(timeout).await? {
        Some(envelope) => Ok(parse(envelope.payload())?),
        None => {
            tracing::warn!(
                dest = %dest.tag(),
                address = %dest.address(),
                timeout_ms = timeout.as_millis() as u64,
                "No reply before timeout"
            );
            Ok(Message::response(status::REQUEST_TIMEOUT))
        }
    }
}

/// Send `request` to `dest` and wait up to `timeout` for one reply.
///
/// The request goes out from `host.ip` with source tag `temp_<host.tag>`. If
/// nothing arrives in time the result is a bare `408` response.
pub async fn sync_send_request(
    request: Message,
    host: &Endpoint,
    dest: &Endpoint,
    timeout: Duration,
) -> Result<Message, ClientError> {
    let prepared = prepare(request, host.ip(), host.tag(), dest).await?;
    exchange(prepared, dest, timeout).await
}

/// Send `request` to `dest` without waiting for a reply.
pub async fn async_send_request(
    request: Message,
    host: &Endpoint,
    dest: &Endpoint,
) -> Result<(), ClientError> {
    let prepared = prepare(request, host.ip(), host.tag(), dest).await?;
    prepared.neighbor.send(&prepared.payload).await?;
    tracing::debug!(dest = %dest.tag(), "Request sent without waiting");
    Ok(())
}

/// Ask `dest` to stop its loop. Returns its reply, or `408` if none arrived.
///
/// The message is sent from an anonymous `temp_<uuid>` node on whatever
/// local address routes to `dest`.
pub async fn terminate_node(dest: &Endpoint, timeout: Duration) -> Result<Message, ClientError> {
    let source_ip = route_ip(dest).await?;
    let source_tag = uuid::Uuid::new_v4().to_string();

    let request = Message::application(
        &Endpoint::new(source_ip.as_str(), DEFAULT_REQUEST_PORT, source_tag.as_str()),
        "/api",
        EventType::SERVICE_TERMINATE.id(),
        Vec::new(),
        Method::Get,
    );

    tracing::info!(dest = %dest.tag(), address = %dest.address(), "Sending terminate");
    let prepared = prepare(request, &source_ip, &source_tag, dest).await?;
    exchange(prepared, dest, timeout).await
}

/// Local IP the kernel would use to reach `dest`.
async fn route_ip(dest: &Endpoint) -> Result<String, ClientError> {
    let route = DatagramSocket::connect(&dest.address(), "0.0.0.0").await?;
    Ok(route.local_addr()?.ip().to_string())
}
