mod common;

use std::time::Duration;

use serde_json::json;

use udp_messenger::client::{async_send_request, sync_send_request};
use udp_messenger::http::{headers, parse, serialize, status};
use udp_messenger::net::{DatagramSocket, NodeEntry};
use udp_messenger::runtime::{Event, EventType, HandlerError, NoService};
use udp_messenger::services::DirectoryService;
use udp_messenger::{Context, Endpoint, Message, Messenger, MessengerError, Method, RuntimeState, Service};

use common::{node_config, spawn_node, tester, REPLY_TIMEOUT};

async fn request(dest: &Endpoint, method: Method, path: &str, body: &str) -> Message {
    sync_send_request(
        Message::request(method, path).with_body(body),
        &tester(),
        dest,
        REPLY_TIMEOUT,
    )
    .await
    .expect("request failed")
}

fn listed(reply: &Message) -> Vec<NodeEntry> {
    serde_json::from_slice(&reply.body).expect("node listing is not json")
}

#[tokio::test]
async fn ping_is_answered_by_the_node() {
    let node = spawn_node(node_config(41101, "directory"), DirectoryService::new()).await;

    let reply = request(&node.endpoint, Method::Get, "/api/v1/ping", "").await;
    assert_eq!(reply.status(), Some(status::OK));
    assert_eq!(reply.source().unwrap().unwrap(), node.endpoint);

    node.terminate().await.unwrap();
}

#[tokio::test]
async fn unknown_path_gets_404() {
    let node = spawn_node(node_config(41102, "directory"), DirectoryService::new()).await;

    let reply = request(&node.endpoint, Method::Get, "/no/such/route", "").await;
    assert_eq!(reply.status(), Some(status::NOT_FOUND));

    node.terminate().await.unwrap();
}

#[tokio::test]
async fn advertise_then_list() {
    let node = spawn_node(node_config(41103, "directory"), DirectoryService::new()).await;
    let worker = json!({"endpoint": "127.0.0.1:41190", "tag": "worker"}).to_string();

    let reply = request(&node.endpoint, Method::Put, "/advertise", &worker).await;
    assert_eq!(reply.status(), Some(status::CREATED));

    let reply = request(&node.endpoint, Method::Put, "/advertise", &worker).await;
    assert_eq!(reply.status(), Some(status::CONFLICT));

    let reply = request(&node.endpoint, Method::Post, "/advertise", &worker).await;
    assert_eq!(reply.status(), Some(status::METHOD_NOT_ALLOWED));

    let reply = request(&node.endpoint, Method::Put, "/advertise", "not json").await;
    assert_eq!(reply.status(), Some(status::BAD_REQUEST));

    // Temporary clients are forgotten after each reply; only the worker remains.
    let reply = request(&node.endpoint, Method::Get, "/nodes", "").await;
    assert_eq!(reply.status(), Some(status::OK));
    assert_eq!(
        listed(&reply),
        vec![Endpoint::new("127.0.0.1", 41190, "worker").entry()]
    );

    node.terminate().await.unwrap();
}

#[tokio::test]
async fn node_advertises_itself_on_startup() {
    let directory = spawn_node(node_config(41104, "directory"), DirectoryService::new()).await;

    let mut config = node_config(41105, "member");
    config.set("advertise_to", "127.0.0.1:41104");
    let member = spawn_node(config, DirectoryService::new()).await;

    let expected = member.endpoint.entry();
    let mut found = false;
    for _ in 0..20 {
        let reply = request(&directory.endpoint, Method::Get, "/nodes", "").await;
        if listed(&reply).contains(&expected) {
            found = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(found, "member never appeared in the directory");

    member.terminate().await.unwrap();
    directory.terminate().await.unwrap();
}

/// Counts greetings through a local event.
#[derive(Default)]
struct GreeterService;

#[derive(Default)]
struct Greetings(Vec<String>);

const GREETED: EventType = EventType(7001);
const WHO_TYPE: u32 = 77;

impl Service for GreeterService {
    fn init(&mut self, messenger: &mut Messenger) -> Result<(), MessengerError> {
        messenger.context_mut().extensions_mut().insert(Greetings::default());

        messenger.add_route("/hello/{name}", |ctx, params, request| {
            Box::pin(async move {
                let name = params
                    .value("name")
                    .ok_or_else(|| HandlerError::failed("missing name"))?
                    .to_string();
                ctx.dispatch_event(Event::new(GREETED).with_params(json!(name)));
                Ok(request.reply(status::OK).with_body(format!("hello {name}")))
            })
        });

        messenger.add_route("/greeted", |ctx, _params, request| {
            Box::pin(async move {
                let seen = ctx
                    .extensions()
                    .get::<Greetings>()
                    .map(|g| g.0.join(","))
                    .unwrap_or_default();
                Ok(request.reply(status::OK).with_body(seen))
            })
        });

        messenger.add_route("/fail", |_ctx, _params, _request| {
            Box::pin(async move { Err(HandlerError::failed("always fails")) })
        });

        messenger.register_evt_handler(GREETED, |ctx, params| {
            Box::pin(async move {
                let name = params.as_str().unwrap_or_default().to_string();
                if let Some(greetings) = ctx.extensions_mut().get_mut::<Greetings>() {
                    greetings.0.push(name);
                }
                Ok(())
            })
        })?;

        messenger.register_msg_handler(WHO_TYPE, |ctx, message| {
            Box::pin(async move {
                let tag = ctx.node_self().tag().to_string();
                Ok(Some(message.reply(status::ACCEPTED).with_body(tag)))
            })
        })?;
        Ok(())
    }

    async fn after_init(&mut self, ctx: &mut Context) -> Result<(), HandlerError> {
        if ctx.is_running() {
            Ok(())
        } else {
            Err(HandlerError::failed("loop not marked running"))
        }
    }
}

#[tokio::test]
async fn route_parameters_and_events() {
    let node = spawn_node(node_config(41106, "greeter"), GreeterService).await;

    let reply = request(&node.endpoint, Method::Get, "/hello/ada", "").await;
    assert_eq!(reply.status(), Some(status::OK));
    assert_eq!(reply.body_text(), "hello ada");

    // The event is handled on the next loop turn, before the next datagram.
    let reply = request(&node.endpoint, Method::Get, "/greeted", "").await;
    assert_eq!(reply.body_text(), "ada");

    node.terminate().await.unwrap();
}

/// Sends from a fixed, non-temporary identity so the node keeps it as a neighbor.
async fn exchange_as(
    socket: &DatagramSocket,
    me: &Endpoint,
    node: &Endpoint,
    path: &str,
) -> Option<Message> {
    let message = Message::request(Method::Get, path)
        .with_header(headers::SERVICE_SRC, me.to_record())
        .with_header(headers::SERVICE_DST, node.to_record());
    let sender = DatagramSocket::connect(&node.address(), "127.0.0.1").await.unwrap();
    sender.send(&serialize(&message).unwrap()).await.unwrap();
    socket
        .recv_timeout(REPLY_TIMEOUT)
        .await
        .unwrap()
        .map(|envelope| parse(envelope.payload()).unwrap())
}

#[tokio::test]
async fn failing_handler_answers_500_to_known_nodes() {
    let node = spawn_node(node_config(41107, "greeter"), GreeterService).await;

    // A temporary client is not a known node, so it gets no error reply.
    let reply = sync_send_request(
        Message::request(Method::Get, "/fail"),
        &tester(),
        &node.endpoint,
        Duration::from_millis(300),
    )
    .await
    .unwrap();
    assert_eq!(reply.status(), Some(status::REQUEST_TIMEOUT));

    // A named node becomes known through its first successful transaction.
    let me = Endpoint::new("127.0.0.1", 41197, "watcher");
    let socket = DatagramSocket::bind(&me.address()).await.unwrap();
    let reply = exchange_as(&socket, &me, &node.endpoint, "/hello/watcher").await.unwrap();
    assert_eq!(reply.status(), Some(status::OK));

    let reply = exchange_as(&socket, &me, &node.endpoint, "/fail").await.unwrap();
    assert_eq!(reply.status(), Some(status::INTERNAL_SERVER_ERROR));

    // The loop keeps serving.
    let reply = request(&node.endpoint, Method::Get, "/hello/bob", "").await;
    assert_eq!(reply.status(), Some(status::OK));

    node.terminate().await.unwrap();
}

#[tokio::test]
async fn application_message_reaches_its_handler() {
    let node = spawn_node(node_config(41108, "greeter"), GreeterService).await;

    let message = Message::request(Method::Get, "/api").with_header(headers::APP_MESSAGE_TYPE, WHO_TYPE.to_string());
    let reply = sync_send_request(message, &tester(), &node.endpoint, REPLY_TIMEOUT)
        .await
        .unwrap();
    assert_eq!(reply.status(), Some(status::ACCEPTED));
    assert_eq!(reply.body_text(), "greeter");

    node.terminate().await.unwrap();
}

#[tokio::test]
async fn garbage_datagrams_do_not_stop_the_loop() {
    let node = spawn_node(node_config(41109, "plain"), NoService).await;

    let socket = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket.send_to(b"\x00\x01 not a message", "127.0.0.1:41109").await.unwrap();

    // Fire-and-forget requests are processed like any other.
    async_send_request(Message::request(Method::Get, "/anything"), &tester(), &node.endpoint)
        .await
        .unwrap();

    let reply = request(&node.endpoint, Method::Get, "/still/here", "").await;
    assert_eq!(reply.status(), Some(status::NOT_FOUND));
    assert_eq!(node.state(), RuntimeState::Running);

    node.terminate().await.unwrap();
}
