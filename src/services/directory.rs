//! Node directory service.
//!
//! # Responsibilities
//! - `PUT /advertise`: learn a node from its `{"endpoint", "tag"}` entry
//! - `GET /nodes`: list the known nodes as entries
//! - `GET /api/v1/ping`: liveness check
//! - Optionally advertise this node to another directory once started
//!
//! # Design Decisions
//! - Method checks live in the handlers; the router only matches paths
//! - Listing returns the table as it stands; a temporary client is already gone
//!   by its next request because its delete-node event runs first

use futures_util::future::BoxFuture;

use crate::http::{headers, status, Message, Method};
use crate::net::{Endpoint, NodeEntry};
use crate::routing::RouteParams;
use crate::runtime::{Context, HandlerError, Messenger, MessengerError, Service};

/// Configuration key naming a directory (`host:port`) to advertise to after startup.
pub const KEY_ADVERTISE_TO: &str = "advertise_to";

/// Counters kept in the context extensions.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryStats {
    pub advertised: u64,
    pub listed: u64,
}

/// Directory of nodes reachable from this one.
#[derive(Debug, Default)]
pub struct DirectoryService;

impl DirectoryService {
    pub fn new() -> Self {
        Self
    }
}

impl Service for DirectoryService {
    fn init(&mut self, messenger: &mut Messenger) -> Result<(), MessengerError> {
        messenger.add_route("/advertise", advertise);
        messenger.add_route("/nodes", list_nodes);
        messenger.add_route("/api/v1/ping", ping);
        messenger
            .context_mut()
            .extensions_mut()
            .insert(DirectoryStats::default());
        Ok(())
    }

    async fn after_init(&mut self, ctx: &mut Context) -> Result<(), HandlerError> {
        let target = ctx.config().safe_at(KEY_ADVERTISE_TO).to_string();
        if target.is_empty() {
            return Ok(());
        }

        let directory = Endpoint::parse_url(&target)
            .map_err(|e| HandlerError::failed(format!("{KEY_ADVERTISE_TO}: {e}")))?;
        let body = serde_json::to_vec(&ctx.node_self().entry())?;
        let message = Message::request(Method::Put, "/advertise")
            .with_header(headers::SERVICE_DST, directory.to_record())
            .with_body(body);

        ctx.commit(message).await?;
        tracing::info!(
            tag = %ctx.node_self().tag(),
            directory = %directory.address(),
            "Advertised to directory"
        );
        Ok(())
    }

    async fn finalize(&mut self, ctx: &mut Context) -> Result<(), HandlerError> {
        let stats = ctx
            .extensions()
            .get::<DirectoryStats>()
            .copied()
            .unwrap_or_default();
        tracing::info!(
            tag = %ctx.node_self().tag(),
            known = ctx.nodes().len(),
            advertised = stats.advertised,
            listed = stats.listed,
            "Directory stopped"
        );
        Ok(())
    }
}

fn bump(ctx: &mut Context, update: impl FnOnce(&mut DirectoryStats)) {
    if let Some(stats) = ctx.extensions_mut().get_mut::<DirectoryStats>() {
        update(stats);
    }
}

fn advertise(
    ctx: &mut Context,
    _params: RouteParams,
    request: Message,
) -> BoxFuture<'_, Result<Message, HandlerError>> {
    Box::pin(async move {
        if request.method() != Some(Method::Put) {
            return Ok(request.reply(status::METHOD_NOT_ALLOWED));
        }

        let node = match serde_json::from_slice::<NodeEntry>(&request.body)
            .ok()
            .and_then(|entry| Endpoint::try_from(entry).ok())
        {
            Some(node) => node,
            None => {
                tracing::debug!(body = %request.body_text(), "Rejecting malformed advertisement");
                return Ok(request.reply(status::BAD_REQUEST));
            }
        };

        if ctx.nodes().contains(node.tag()) {
            return Ok(request.reply(status::CONFLICT));
        }

        ctx.add_node(node).await?;
        bump(ctx, |stats| stats.advertised += 1);
        Ok(request.reply(status::CREATED))
    })
}

fn list_nodes(
    ctx: &mut Context,
    _params: RouteParams,
    request: Message,
) -> BoxFuture<'_, Result<Message, HandlerError>> {
    Box::pin(async move {
        if request.method() != Some(Method::Get) {
            return Ok(request.reply(status::METHOD_NOT_ALLOWED));
        }

        let entries: Vec<NodeEntry> = ctx.nodes().entries().iter().map(Endpoint::entry).collect();
        let body = serde_json::to_vec(&entries)?;
        bump(ctx, |stats| stats.listed += 1);
        Ok(request.reply(status::OK).with_body(body))
    })
}

fn ping(
    _ctx: &mut Context,
    _params: RouteParams,
    request: Message,
) -> BoxFuture<'_, Result<Message, HandlerError>> {
    Box::pin(async move { Ok(request.reply(status::OK)) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;

    fn context(port: u16) -> Context {
        let config: Configuration = [("self_ip", "127.0.0.1"), ("port", "41950"), ("tag", "dir")]
            .into_iter()
            .collect();
        let mut ctx = Context::new(Endpoint::new("127.0.0.1", port, "dir"), config);
        ctx.extensions_mut().insert(DirectoryStats::default());
        ctx
    }

    fn incoming(method: Method, path: &str, body: &str) -> Message {
        Message::request(method, path)
            .with_header(
                headers::SERVICE_SRC,
                Endpoint::new("127.0.0.1", 41951, "temp_client").to_record(),
            )
            .with_header(headers::SERVICE_DST, Endpoint::new("127.0.0.1", 41950, "dir").to_record())
            .with_body(body)
    }

    #[tokio::test]
    async fn advertise_adds_node_once() {
        let mut ctx = context(41950);
        let body = r#"{"endpoint":"127.0.0.1:41952","tag":"worker"}"#;

        let reply = advertise(&mut ctx, RouteParams::default(), incoming(Method::Put, "/advertise", body))
            .await
            .unwrap();
        assert_eq!(reply.status(), Some(status::CREATED));
        assert!(ctx.nodes().contains("worker"));
        assert_eq!(ctx.extensions().get::<DirectoryStats>().unwrap().advertised, 1);

        let reply = advertise(&mut ctx, RouteParams::default(), incoming(Method::Put, "/advertise", body))
            .await
            .unwrap();
        assert_eq!(reply.status(), Some(status::CONFLICT));
    }

    #[tokio::test]
    async fn advertise_checks_method_and_body() {
        let mut ctx = context(41950);

        let reply = advertise(&mut ctx, RouteParams::default(), incoming(Method::Get, "/advertise", ""))
            .await
            .unwrap();
        assert_eq!(reply.status(), Some(status::METHOD_NOT_ALLOWED));

        let reply = advertise(
            &mut ctx,
            RouteParams::default(),
            incoming(Method::Put, "/advertise", r#"{"endpoint":"","tag":"x"}"#),
        )
        .await
        .unwrap();
        assert_eq!(reply.status(), Some(status::BAD_REQUEST));
        assert!(ctx.nodes().is_empty());
    }

    #[tokio::test]
    async fn lists_known_nodes() {
        let mut ctx = context(41950);
        ctx.add_node(Endpoint::new("127.0.0.1", 41953, "alpha")).await.unwrap();

        let reply = list_nodes(&mut ctx, RouteParams::default(), incoming(Method::Get, "/nodes", ""))
            .await
            .unwrap();
        assert_eq!(reply.status(), Some(status::OK));
        let entries: Vec<NodeEntry> = serde_json::from_slice(&reply.body).unwrap();
        assert_eq!(entries, vec![Endpoint::new("127.0.0.1", 41953, "alpha").entry()]);
        // Addressed back to the sender.
        assert_eq!(
            reply.destination().unwrap().unwrap().tag(),
            "temp_client"
        );
    }
}
