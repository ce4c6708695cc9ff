//! Connection manager boundary
//!
//! The connection manager owns the lifecycle of connections that were
//! accepted by an inbound: it opens the upstream through a dialer, relays
//! data, keeps accounting, and reports completion through `on_close`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::adapter::{BoxPacketConn, BoxStream, Destination, InboundContext, Network};
use crate::context::RequestContext;
use crate::error::{ConnectionError, OutboundError};
use crate::outbound::Outbound;

/// Completion callback of a handed-off connection, invoked exactly once
pub type CloseHandler = Box<dyn FnOnce(Result<(), ConnectionError>) + Send>;

/// Box a closure as a `CloseHandler`
pub fn close_handler<F>(f: F) -> CloseHandler
where
    F: FnOnce(Result<(), ConnectionError>) + Send + 'static,
{
    Box::new(f)
}

/// A `CloseHandler` that ignores the outcome
#[must_use]
pub fn noop_close_handler() -> CloseHandler {
    Box::new(|_| {})
}

/// Generic connection lifecycle owner
#[async_trait]
pub trait ConnectionManager: Send + Sync {
    /// Relay `conn` to an upstream stream opened through `dialer`.
    async fn new_connection(
        &self,
        ctx: RequestContext,
        dialer: Arc<dyn Outbound>,
        conn: BoxStream,
        metadata: InboundContext,
        on_close: CloseHandler,
    );

    /// Relay `conn` to an upstream packet session opened through `dialer`.
    async fn new_packet_connection(
        &self,
        ctx: RequestContext,
        dialer: Arc<dyn Outbound>,
        conn: BoxPacketConn,
        metadata: InboundContext,
        on_close: CloseHandler,
    );
}

/// Dialer that fails every attempt with a fixed error
///
/// Handed to the connection manager in place of a real upstream so a
/// connection with nowhere to go still passes through the normal
/// open / close / accounting path.
pub struct ErrorDialer {
    tag: String,
    make_error: fn() -> OutboundError,
}

impl ErrorDialer {
    /// Create a dialer that fails with `make_error()`
    pub fn new(tag: impl Into<String>, make_error: fn() -> OutboundError) -> Self {
        Self {
            tag: tag.into(),
            make_error,
        }
    }

    /// Create a dialer that fails with `NoOutboundAvailable`
    pub fn no_outbound(tag: impl Into<String>) -> Self {
        Self::new(tag, || OutboundError::NoOutboundAvailable)
    }
}

#[async_trait]
impl Outbound for ErrorDialer {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn outbound_type(&self) -> &str {
        "error"
    }

    fn networks(&self) -> Vec<Network> {
        Network::ALL.to_vec()
    }

    async fn dial(
        &self,
        _ctx: &RequestContext,
        _network: Network,
        _destination: &Destination,
    ) -> Result<BoxStream, OutboundError> {
        Err((self.make_error)())
    }

    async fn listen_packet(
        &self,
        _ctx: &RequestContext,
        _destination: &Destination,
    ) -> Result<BoxPacketConn, OutboundError> {
        Err((self.make_error)())
    }
}

impl std::fmt::Debug for ErrorDialer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorDialer")
            .field("tag", &self.tag)
            .field("error", &(self.make_error)().to_string())
            .finish()
    }
}
