//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::thread;
use std::time::Duration;

use tokio::sync::watch;

use udp_messenger::client::terminate_node;
use udp_messenger::http::status;
use udp_messenger::lifecycle::wait_for_state;
use udp_messenger::{Configuration, Endpoint, Messenger, MessengerError, RuntimeState, Service};

/// Upper bound for any single wait in these tests.
pub const WAIT: Duration = Duration::from_secs(5);

/// Reply timeout for client requests against a live node.
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(2);

/// A messenger running on its own thread and runtime.
pub struct TestNode {
    pub endpoint: Endpoint,
    state: watch::Receiver<RuntimeState>,
    handle: Option<thread::JoinHandle<Result<(), MessengerError>>>,
}

impl TestNode {
    pub fn state(&self) -> RuntimeState {
        *self.state.borrow()
    }

    /// Stop the node through its terminate message and wait for it to finish.
    pub async fn terminate(mut self) -> Result<(), MessengerError> {
        let reply = terminate_node(&self.endpoint, REPLY_TIMEOUT)
            .await
            .expect("terminate message could not be sent");
        assert_eq!(reply.status(), Some(status::OK));

        let reached = tokio::time::timeout(WAIT, wait_for_state(&mut self.state, RuntimeState::is_terminal))
            .await
            .expect("node did not terminate in time");
        assert_eq!(reached, Some(RuntimeState::Terminated));

        let handle = self.handle.take().expect("node already joined");
        tokio::task::spawn_blocking(move || handle.join().expect("node thread panicked"))
            .await
            .expect("join task failed")
    }
}

/// Minimal node configuration on 127.0.0.1.
pub fn node_config(port: u16, tag: &str) -> Configuration {
    [
        ("self_ip", "127.0.0.1".to_string()),
        ("port", port.to_string()),
        ("tag", tag.to_string()),
        ("socket_timeout_ms", "200".to_string()),
    ]
    .into_iter()
    .collect()
}

/// Identity used by tests when acting as a client.
pub fn tester() -> Endpoint {
    Endpoint::new("127.0.0.1", 0, "tester")
}

/// Start `service` on a fresh messenger and wait until it is serving.
pub async fn spawn_node<S: Service + 'static>(config: Configuration, mut service: S) -> TestNode {
    let mut messenger = Messenger::new(config).expect("invalid test configuration");
    let endpoint = messenger.node_self().clone();
    let mut state = messenger.state_watch();

    let handle = thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("failed to build node runtime");
        runtime.block_on(messenger.run(&mut service))
    });

    let reached = tokio::time::timeout(WAIT, wait_for_state(&mut state, |s| {
        s == RuntimeState::Running || s.is_terminal()
    }))
    .await
    .expect("node did not start in time");
    assert_eq!(reached, Some(RuntimeState::Running), "node failed to start");

    TestNode {
        endpoint,
        state,
        handle: Some(handle),
    }
}
