//! Shared adapter types
//!
//! Types passed across the outbound, provider, strategy and connection
//! manager boundaries: networks, destinations, inbound metadata and the
//! stream / packet connection abstractions.

mod conn;
mod metadata;
mod network;

pub use conn::{AsyncStream, BoxPacketConn, BoxStream, PacketConn, UdpPacketConn};
pub use metadata::InboundContext;
pub use network::{Destination, Network};
