//! Inbound connection metadata

use std::net::SocketAddr;

use super::network::{Destination, Network};

/// Metadata attached to a connection accepted by an inbound
///
/// Hand-off paths receive this together with the connection; the
/// destination is what the group picks against.
#[derive(Debug, Clone, Default)]
pub struct InboundContext {
    /// Tag of the inbound that accepted the connection
    pub inbound: String,
    /// Transport network
    pub network: Network,
    /// Client address, if known
    pub source: Option<SocketAddr>,
    /// Requested destination
    pub destination: Destination,
}

impl InboundContext {
    /// Create metadata for a connection to `destination`
    pub fn new(inbound: impl Into<String>, network: Network, destination: Destination) -> Self {
        Self {
            inbound: inbound.into(),
            network,
            source: None,
            destination,
        }
    }

    /// Set the client address
    #[must_use]
    pub const fn with_source(mut self, source: SocketAddr) -> Self {
        self.source = Some(source);
        self
    }
}
