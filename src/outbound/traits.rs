//! Outbound trait definitions
//!
//! This module defines the core `Outbound` trait that every upstream target
//! implements, together with the optional hand-off capabilities an outbound
//! may declare for connections that were accepted elsewhere.

use async_trait::async_trait;

use crate::adapter::{BoxPacketConn, BoxStream, Destination, InboundContext, Network};
use crate::connection::CloseHandler;
use crate::context::RequestContext;
use crate::error::OutboundError;

/// Core trait for outbound implementations
///
/// All outbound types (direct, block, groups, ...) implement this trait.
#[async_trait]
pub trait Outbound: Send + Sync {
    /// Get the unique tag for this outbound
    fn tag(&self) -> &str;

    /// Get the outbound type name
    fn outbound_type(&self) -> &str;

    /// Networks this outbound can carry
    fn networks(&self) -> Vec<Network>;

    /// Open a stream to `destination` through this outbound.
    ///
    /// # Errors
    ///
    /// Returns `OutboundError` if the connection fails.
    async fn dial(
        &self,
        ctx: &RequestContext,
        network: Network,
        destination: &Destination,
    ) -> Result<BoxStream, OutboundError>;

    /// Open a packet session for `destination` through this outbound.
    ///
    /// # Errors
    ///
    /// Returns `OutboundError` if the socket cannot be set up.
    async fn listen_packet(
        &self,
        ctx: &RequestContext,
        destination: &Destination,
    ) -> Result<BoxPacketConn, OutboundError>;

    /// Direct stream hand-off capability, if this outbound has one
    fn as_connection_handler(&self) -> Option<&dyn ConnectionHandler> {
        None
    }

    /// Direct packet hand-off capability, if this outbound has one
    fn as_packet_connection_handler(&self) -> Option<&dyn PacketConnectionHandler> {
        None
    }

    /// Check if this outbound carries `network`
    fn supports(&self, network: Network) -> bool {
        self.networks().contains(&network)
    }
}

/// Accepts an already established stream connection
///
/// The handler owns the connection from here on and must invoke
/// `on_close` exactly once when it is done with it.
#[async_trait]
pub trait ConnectionHandler: Send + Sync {
    /// Take over `conn`.
    async fn new_connection(
        &self,
        ctx: RequestContext,
        conn: BoxStream,
        metadata: InboundContext,
        on_close: CloseHandler,
    );
}

/// Accepts an already established packet connection
#[async_trait]
pub trait PacketConnectionHandler: Send + Sync {
    /// Take over `conn`.
    async fn new_packet_connection(
        &self,
        ctx: RequestContext,
        conn: BoxPacketConn,
        metadata: InboundContext,
        on_close: CloseHandler,
    );
}
