//! Direct outbound implementation
//!
//! This module provides the `DirectOutbound` type which connects directly
//! to the destination, optionally through a specific interface or with
//! a routing mark.
//!
//! Supports both TCP and UDP protocols.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use socket2::{Domain, Protocol, Socket, TcpKeepalive, Type};
use tokio::net::{TcpSocket, UdpSocket};
use tokio::time::timeout;
use tracing::{debug, warn};

use super::traits::Outbound;
use crate::adapter::{BoxPacketConn, BoxStream, Destination, Network, UdpPacketConn};
use crate::config::OutboundConfig;
use crate::connection::OutboundStats;
use crate::context::RequestContext;
use crate::error::OutboundError;

/// Direct outbound - connects directly to the destination
///
/// Supports:
/// - `bind_interface`: Bind to a specific network interface (`SO_BINDTODEVICE`)
/// - `routing_mark`: Set routing mark for policy routing (`SO_MARK`)
pub struct DirectOutbound {
    /// Configuration
    config: OutboundConfig,
    /// Connection statistics
    stats: Arc<OutboundStats>,
    /// Whether the outbound is enabled
    enabled: AtomicBool,
}

impl DirectOutbound {
    /// Create a new direct outbound from configuration
    pub fn new(config: OutboundConfig) -> Self {
        Self {
            enabled: AtomicBool::new(config.enabled),
            config,
            stats: Arc::new(OutboundStats::new()),
        }
    }

    /// Create a simple direct outbound with just a tag
    pub fn simple(tag: impl Into<String>) -> Self {
        Self::new(OutboundConfig::direct(tag))
    }

    /// Check if this outbound is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Enable or disable this outbound
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Get connection statistics
    pub fn stats(&self) -> Arc<OutboundStats> {
        Arc::clone(&self.stats)
    }

    fn check_enabled(&self) -> Result<(), OutboundError> {
        if self.is_enabled() {
            Ok(())
        } else {
            Err(OutboundError::unavailable(
                &self.config.tag,
                "outbound is disabled",
            ))
        }
    }

    /// Create a socket for `addr`'s family with the configured options
    fn create_socket(&self, addr: SocketAddr, ty: Type) -> Result<Socket, OutboundError> {
        let (domain, protocol) = match (addr.is_ipv4(), ty == Type::STREAM) {
            (true, true) => (Domain::IPV4, Protocol::TCP),
            (true, false) => (Domain::IPV4, Protocol::UDP),
            (false, true) => (Domain::IPV6, Protocol::TCP),
            (false, false) => (Domain::IPV6, Protocol::UDP),
        };
        let socket = Socket::new(domain, ty, Some(protocol))?;

        if let Some(ref interface) = self.config.bind_interface {
            set_bind_device(&socket, interface)?;
        }

        if let Some(mark) = self.config.routing_mark {
            set_routing_mark(&socket, mark)?;
        }

        if ty == Type::STREAM {
            // Detect dead peers on long-lived connections
            let keepalive = TcpKeepalive::new()
                .with_time(Duration::from_secs(60))
                .with_interval(Duration::from_secs(15));
            socket
                .set_tcp_keepalive(&keepalive)
                .map_err(|e| OutboundError::SocketOption {
                    option: "TCP_KEEPALIVE".into(),
                    reason: e.to_string(),
                })?;
        }

        socket
            .set_nonblocking(true)
            .map_err(|e| OutboundError::SocketOption {
                option: "O_NONBLOCK".into(),
                reason: e.to_string(),
            })?;

        Ok(socket)
    }
}

/// Set `SO_BINDTODEVICE` to bind to a specific interface
#[cfg(target_os = "linux")]
fn set_bind_device(socket: &Socket, interface: &str) -> Result<(), OutboundError> {
    // IFNAMSIZ is 16 including the terminating NUL
    if interface.len() > 15 {
        return Err(OutboundError::SocketOption {
            option: "SO_BINDTODEVICE".into(),
            reason: format!("Interface name too long: {interface} (max 15 chars)"),
        });
    }

    socket
        .bind_device(Some(interface.as_bytes()))
        .map_err(|e| OutboundError::SocketOption {
            option: "SO_BINDTODEVICE".into(),
            reason: format!("Failed to bind to interface {interface}: {e}"),
        })?;

    debug!("Bound socket to interface: {}", interface);
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn set_bind_device(_socket: &Socket, _interface: &str) -> Result<(), OutboundError> {
    Err(OutboundError::SocketOption {
        option: "SO_BINDTODEVICE".into(),
        reason: "only supported on Linux".into(),
    })
}

/// Set `SO_MARK` for policy routing
#[cfg(target_os = "linux")]
fn set_routing_mark(socket: &Socket, mark: u32) -> Result<(), OutboundError> {
    socket.set_mark(mark).map_err(|e| OutboundError::SocketOption {
        option: "SO_MARK".into(),
        reason: format!("Failed to set routing mark {mark}: {e}"),
    })?;

    debug!("Set routing mark: {}", mark);
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn set_routing_mark(_socket: &Socket, _mark: u32) -> Result<(), OutboundError> {
    Err(OutboundError::SocketOption {
        option: "SO_MARK".into(),
        reason: "only supported on Linux".into(),
    })
}

#[async_trait]
impl Outbound for DirectOutbound {
    fn tag(&self) -> &str {
        &self.config.tag
    }

    fn outbound_type(&self) -> &str {
        "direct"
    }

    fn networks(&self) -> Vec<Network> {
        Network::ALL.to_vec()
    }

    async fn dial(
        &self,
        _ctx: &RequestContext,
        network: Network,
        destination: &Destination,
    ) -> Result<BoxStream, OutboundError> {
        self.check_enabled()?;
        if network != Network::Tcp {
            // Datagrams go through listen_packet
            return Err(OutboundError::unsupported_network(&self.config.tag, network));
        }

        self.stats.record_connection();

        let connect_timeout = self.config.connect_timeout();
        let result = timeout(connect_timeout, async {
            let addr = destination.resolve().await?;
            let socket = self.create_socket(addr, Type::STREAM)?;
            let std_stream: std::net::TcpStream = socket.into();
            let stream = TcpSocket::from_std_stream(std_stream)
                .connect(addr)
                .await
                .map_err(|e| OutboundError::connection_failed(destination.clone(), e.to_string()))?;
            Ok::<_, OutboundError>(stream)
        })
        .await;

        match result {
            Ok(Ok(stream)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    warn!("Failed to set TCP_NODELAY: {}", e);
                }
                debug!(
                    "Direct connection to {} via {} successful",
                    destination, self.config.tag
                );
                Ok(Box::new(stream))
            }
            Ok(Err(e)) => {
                self.stats.record_error();
                Err(e)
            }
            Err(_) => {
                self.stats.record_error();
                Err(OutboundError::Timeout {
                    addr: destination.clone(),
                    timeout_secs: connect_timeout.as_secs(),
                })
            }
        }
    }

    async fn listen_packet(
        &self,
        _ctx: &RequestContext,
        destination: &Destination,
    ) -> Result<BoxPacketConn, OutboundError> {
        self.check_enabled()?;
        self.stats.record_connection();

        let local: SocketAddr = match destination {
            Destination::Unspecified => (Ipv4Addr::UNSPECIFIED, 0).into(),
            dest => match dest.resolve().await? {
                SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
                SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
            },
        };

        let socket = self.create_socket(local, Type::DGRAM)?;
        socket.bind(&local.into()).map_err(|e| {
            self.stats.record_error();
            OutboundError::SocketOption {
                option: "bind".into(),
                reason: format!("Failed to bind to {local}: {e}"),
            }
        })?;
        let std_socket: std::net::UdpSocket = socket.into();
        let socket = UdpSocket::from_std(std_socket)?;

        debug!(
            "Direct UDP socket for {} via {} bound to {:?}",
            destination,
            self.config.tag,
            socket.local_addr()
        );

        Ok(Box::new(UdpPacketConn::new(socket)))
    }
}

impl std::fmt::Debug for DirectOutbound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectOutbound")
            .field("tag", &self.config.tag)
            .field("enabled", &self.is_enabled())
            .field("bind_interface", &self.config.bind_interface)
            .field("routing_mark", &self.config.routing_mark)
            .finish()
    }
}
