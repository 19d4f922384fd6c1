//! Node lifecycle states.

use std::fmt;
use tokio::sync::watch;

/// State of a messenger's run loop.
///
/// `Created → Initializing → Running → Draining → Terminated`; a failed
/// initialization goes straight to `Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeState {
    /// Built, not started.
    Created,
    /// Binding the receive socket and running service setup hooks.
    Initializing,
    /// Serving datagrams and events.
    Running,
    /// Loop stopped; finalizing the service and releasing channels.
    Draining,
    /// All resources released.
    Terminated,
}

impl RuntimeState {
    pub fn is_terminal(self) -> bool {
        self == RuntimeState::Terminated
    }
}

impl fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuntimeState::Created => "created",
            RuntimeState::Initializing => "initializing",
            RuntimeState::Running => "running",
            RuntimeState::Draining => "draining",
            RuntimeState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Wait until the observed state satisfies `done`. Returns the state reached,
/// or `None` if the messenger was dropped first.
pub async fn wait_for_state(
    rx: &mut watch::Receiver<RuntimeState>,
    done: impl Fn(RuntimeState) -> bool,
) -> Option<RuntimeState> {
    rx.wait_for(|state| done(*state)).await.ok().map(|state| *state)
}
