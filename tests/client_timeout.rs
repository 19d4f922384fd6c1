mod common;

use std::time::{Duration, Instant};

use udp_messenger::client::{sync_send_request, terminate_node};
use udp_messenger::http::status;
use udp_messenger::runtime::NoService;
use udp_messenger::{Endpoint, Message, Method};

use common::{node_config, spawn_node, tester};

#[tokio::test]
async fn unreachable_node_yields_408_within_timeout() {
    let dest = Endpoint::new("127.0.0.1", 41120, "nobody");
    let timeout = Duration::from_millis(200);

    let started = Instant::now();
    let reply = sync_send_request(Message::request(Method::Get, "/api/v1/ping"), &tester(), &dest, timeout)
        .await
        .unwrap();

    assert_eq!(reply.status(), Some(status::REQUEST_TIMEOUT));
    assert!(started.elapsed() >= timeout);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn short_budget_is_honoured_closely() {
    let dest = Endpoint::new("127.0.0.1", 41123, "nobody");
    let timeout = Duration::from_millis(100);

    let started = Instant::now();
    let reply = sync_send_request(Message::request(Method::Get, "/api/v1/ping"), &tester(), &dest, timeout)
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(reply.status(), Some(status::REQUEST_TIMEOUT));
    assert!(elapsed >= timeout, "returned early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(300), "overran the budget: {elapsed:?}");
}

#[tokio::test]
async fn terminate_of_absent_node_times_out() {
    let dest = Endpoint::new("127.0.0.1", 41121, "nobody");
    let reply = terminate_node(&dest, Duration::from_millis(100)).await.unwrap();
    assert_eq!(reply.status(), Some(status::REQUEST_TIMEOUT));
}

#[tokio::test]
async fn terminated_node_stops_answering() {
    let node = spawn_node(node_config(41122, "short-lived"), NoService).await;
    let endpoint = node.endpoint.clone();
    node.terminate().await.unwrap();

    let reply = sync_send_request(
        Message::request(Method::Get, "/api/v1/ping"),
        &tester(),
        &endpoint,
        Duration::from_millis(200),
    )
    .await
    .unwrap();
    assert_eq!(reply.status(), Some(status::REQUEST_TIMEOUT));
}
