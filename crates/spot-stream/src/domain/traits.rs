use async_trait::async_trait;

use super::config::Credentials;
use super::events::{OutboundFrame, StreamPayload, TerminateCause};
use super::state::ConnectionState;
use crate::error::RestError;

/// Listen-key lifecycle as consumed from the REST side
///
/// Shared process-wide; implementations must tolerate concurrent calls
/// from many connections.
#[async_trait]
pub trait ListenKeyApi: Send + Sync {
    /// Create a user-data listen key
    async fn create(&self, credentials: &Credentials) -> Result<String, RestError>;

    /// Extend the validity of an existing listen key
    async fn keepalive(&self, listen_key: &str, credentials: &Credentials)
    -> Result<(), RestError>;

    /// Invalidate a listen key
    async fn close(&self, listen_key: &str, credentials: &Credentials) -> Result<(), RestError>;
}

/// User-replaceable connection callbacks
///
/// Defaults log only. Hooks run on the connection task and must not block;
/// offload long work to another task before returning.
pub trait StreamHandler: Send + 'static {
    /// Called once the handshake completes, before any frame is dispatched
    fn on_connect(&mut self, state: &ConnectionState) -> Option<OutboundFrame> {
        tracing::info!(connection = state.name(), "stream connected");
        None
    }

    /// Called for every decoded inbound payload, in socket order
    fn on_response(
        &mut self,
        payload: StreamPayload,
        state: &ConnectionState,
    ) -> Option<OutboundFrame> {
        tracing::debug!(connection = state.name(), ?payload, "stream response");
        None
    }

    /// Called once after the last frame
    fn on_disconnect(&mut self, state: &ConnectionState) {
        tracing::info!(
            connection = state.name(),
            heartbeats = state.heartbeat_count(),
            "stream disconnected"
        );
    }

    /// Called once with the termination cause, after `on_disconnect`
    fn on_terminate(&mut self, cause: TerminateCause, state: &ConnectionState) {
        tracing::debug!(connection = state.name(), ?cause, "stream terminated");
    }
}

/// Handler that keeps every default
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl StreamHandler for LoggingHandler {}

/// Wraps a closure as the `on_response` hook; other hooks keep their defaults
pub struct FnHandler<F>(pub F);

impl<F> StreamHandler for FnHandler<F>
where
    F: FnMut(StreamPayload, &ConnectionState) -> Option<OutboundFrame> + Send + 'static,
{
    fn on_response(
        &mut self,
        payload: StreamPayload,
        state: &ConnectionState,
    ) -> Option<OutboundFrame> {
        (self.0)(payload, state)
    }
}
