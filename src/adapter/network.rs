//! Network and destination types
//!
//! `Network` names the transport a request travels over; `Destination` is
//! the address the client asked for, either a socket address or a domain
//! that is resolved by the outbound that finally dials it.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Transport network of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Stream connections
    #[default]
    Tcp,
    /// Datagram sessions
    Udp,
}

impl Network {
    /// Both networks, in the order groups advertise them
    pub const ALL: [Self; 2] = [Self::Tcp, Self::Udp];

    /// Parse a network name ("tcp" or "udp", case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Some(Self::Tcp),
            "udp" => Some(Self::Udp),
            _ => None,
        }
    }

    /// Get the network as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested destination of a connection or packet session
///
/// The default value is `Unspecified`, used for display-only picks that
/// carry no real target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Destination {
    /// No destination (zero address)
    #[default]
    Unspecified,
    /// Literal socket address
    Socket(SocketAddr),
    /// Domain name and port, resolved by the dialing outbound
    Domain { host: String, port: u16 },
}

impl Destination {
    /// Create a domain destination
    pub fn domain(host: impl Into<String>, port: u16) -> Self {
        Self::Domain {
            host: host.into(),
            port,
        }
    }

    /// Check if this is the zero destination
    #[must_use]
    pub const fn is_unspecified(&self) -> bool {
        matches!(self, Self::Unspecified)
    }

    /// Destination port, zero when unspecified
    #[must_use]
    pub const fn port(&self) -> u16 {
        match self {
            Self::Unspecified => 0,
            Self::Socket(addr) => addr.port(),
            Self::Domain { port, .. } => *port,
        }
    }

    /// Resolve to the first socket address.
    ///
    /// # Errors
    ///
    /// Returns an error if the destination is unspecified or the lookup
    /// yields no address.
    pub async fn resolve(&self) -> io::Result<SocketAddr> {
        match self {
            Self::Unspecified => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "destination is unspecified",
            )),
            Self::Socket(addr) => Ok(*addr),
            Self::Domain { host, port } => tokio::net::lookup_host((host.as_str(), *port))
                .await?
                .next()
                .ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("no address found for {host}"),
                    )
                }),
        }
    }
}

impl From<SocketAddr> for Destination {
    fn from(addr: SocketAddr) -> Self {
        Self::Socket(addr)
    }
}

impl FromStr for Destination {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(addr) = s.parse::<SocketAddr>() {
            return Ok(Self::Socket(addr));
        }
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("missing port in destination: {s}"))?;
        if host.is_empty() {
            return Err(format!("missing host in destination: {s}"));
        }
        let port = port
            .parse::<u16>()
            .map_err(|e| format!("invalid port in destination {s}: {e}"))?;
        Ok(Self::domain(host, port))
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unspecified => f.write_str("unspecified"),
            Self::Socket(addr) => write!(f, "{addr}"),
            Self::Domain { host, port } => write!(f, "{host}:{port}"),
        }
    }
}
