//! Service hooks run around the messenger loop.

use std::future::Future;

use crate::runtime::context::Context;
use crate::runtime::handler::HandlerError;
use crate::runtime::messenger::{Messenger, MessengerError};

/// Behavior layered on a [`Messenger`]: routes, handlers and setup/teardown.
///
/// All hooks default to no-ops.
pub trait Service: Send {
    /// Register routes and handlers. Runs after the receive socket is bound
    /// and the built-in handlers are installed.
    fn init(&mut self, _messenger: &mut Messenger) -> Result<(), MessengerError> {
        Ok(())
    }

    /// Runs once before the loop starts; may already send messages.
    fn after_init(
        &mut self,
        _ctx: &mut Context,
    ) -> impl Future<Output = Result<(), HandlerError>> + Send {
        async { Ok(()) }
    }

    /// Runs after the loop stops, before channels are released.
    fn finalize(
        &mut self,
        _ctx: &mut Context,
    ) -> impl Future<Output = Result<(), HandlerError>> + Send {
        async { Ok(()) }
    }
}

/// A messenger with no behavior beyond the built-in handlers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoService;

impl Service for NoService {}
