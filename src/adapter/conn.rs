//! Connection abstractions handed between outbounds and the connection manager

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UdpSocket;

use super::network::Destination;

/// A bidirectional byte stream
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> AsyncStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Owned stream connection as returned by `Outbound::dial`
pub type BoxStream = Box<dyn AsyncStream>;

/// Datagram connection that can address arbitrary destinations
#[async_trait]
pub trait PacketConn: Send + Sync {
    /// Send one datagram to `target`.
    async fn send_to(&self, buf: &[u8], target: &Destination) -> io::Result<usize>;

    /// Receive one datagram, returning its length and sender.
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, Destination)>;

    /// Local address of the underlying socket.
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

/// Owned packet connection as returned by `Outbound::listen_packet`
pub type BoxPacketConn = Box<dyn PacketConn>;

/// `PacketConn` over a plain UDP socket
#[derive(Debug)]
pub struct UdpPacketConn {
    socket: UdpSocket,
}

impl UdpPacketConn {
    /// Wrap an already bound socket
    #[must_use]
    pub const fn new(socket: UdpSocket) -> Self {
        Self { socket }
    }

    /// Bind a socket on `addr`
    ///
    /// # Errors
    ///
    /// Returns the bind error.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        Ok(Self::new(UdpSocket::bind(addr).await?))
    }

    /// Get the underlying socket
    #[must_use]
    pub const fn socket(&self) -> &UdpSocket {
        &self.socket
    }
}

#[async_trait]
impl PacketConn for UdpPacketConn {
    async fn send_to(&self, buf: &[u8], target: &Destination) -> io::Result<usize> {
        let addr = target.resolve().await?;
        self.socket.send_to(buf, addr).await
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, Destination)> {
        let (n, from) = self.socket.recv_from(buf).await?;
        Ok((n, Destination::Socket(from)))
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}
