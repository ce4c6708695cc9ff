//! Relay Connection Manager
//!
//! Default `ConnectionManager`: opens the upstream through the given dialer
//! and relays data until either side finishes, with
//! - connection limiting via semaphore-based backpressure
//! - graceful shutdown
//! - statistics collection

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::handler::{CloseHandler, ConnectionManager};
use super::stats::{ConnectionStats, StatsSnapshot};
use crate::adapter::{BoxPacketConn, BoxStream, InboundContext, Network};
use crate::config::ConnectionConfig;
use crate::context::RequestContext;
use crate::error::{ConnectionError, OutboundError};
use crate::outbound::Outbound;

/// Connection manager that relays handed-off connections upstream
pub struct RelayConnectionManager {
    /// Semaphore for connection limiting
    semaphore: Arc<Semaphore>,

    /// Maximum connections allowed
    max_connections: usize,

    /// Connection statistics
    stats: Arc<ConnectionStats>,

    /// Connect timeout for upstream connections
    connect_timeout: Duration,

    /// Datagram buffer size
    buffer_size: usize,

    /// Idle timeout of packet sessions
    udp_timeout: Duration,

    /// Shutdown signal sender
    shutdown_tx: broadcast::Sender<()>,

    /// Whether shutdown has been initiated
    shutting_down: AtomicBool,
}

impl RelayConnectionManager {
    /// Create a new connection manager
    #[must_use]
    pub fn new(config: &ConnectionConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            semaphore: Arc::new(Semaphore::new(config.max_connections)),
            max_connections: config.max_connections,
            stats: Arc::new(ConnectionStats::new()),
            connect_timeout: config.connect_timeout(),
            buffer_size: config.buffer_size,
            udp_timeout: config.udp_timeout(),
            shutdown_tx,
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Get a snapshot of current statistics
    #[must_use]
    pub fn stats_snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Get current active connection count
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.max_connections - self.semaphore.available_permits()
    }

    /// Check if shutting down
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Relaxed)
    }

    /// Stop accepting connections and signal running relays to stop
    pub fn shutdown(&self) {
        if self
            .shutting_down
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::Relaxed)
            .is_err()
        {
            return;
        }

        info!(
            "Shutting down relay connection manager ({} active)",
            self.active_connections()
        );
        let _ = self.shutdown_tx.send(());
    }

    /// Admission check; on refusal `on_close` has already been called
    fn admit(&self, on_close: CloseHandler) -> Option<(OwnedSemaphorePermit, CloseHandler)> {
        if self.is_shutting_down() {
            on_close(Err(ConnectionError::ShuttingDown));
            return None;
        }

        if let Ok(permit) = Arc::clone(&self.semaphore).try_acquire_owned() {
            self.stats.record_accepted();
            Some((permit, on_close))
        } else {
            self.stats.record_rejected();
            let current = self.active_connections();
            warn!(
                "Connection limit reached ({}/{}), rejecting connection",
                current, self.max_connections
            );
            on_close(Err(ConnectionError::limit_reached(current, self.max_connections)));
            None
        }
    }

    async fn open<T, F>(&self, ctx: &RequestContext, tag: &str, dial: F) -> Result<T, ConnectionError>
    where
        F: std::future::Future<Output = Result<T, OutboundError>>,
    {
        let result = tokio::select! {
            () = ctx.cancelled() => Err(OutboundError::Cancelled),
            r = timeout(self.connect_timeout, dial) => r.unwrap_or_else(|_| {
                Err(OutboundError::unavailable(tag, "upstream connect timed out"))
            }),
        };
        result.map_err(|e| ConnectionError::dial(tag, e))
    }
}

#[async_trait]
impl ConnectionManager for RelayConnectionManager {
    async fn new_connection(
        &self,
        ctx: RequestContext,
        dialer: Arc<dyn Outbound>,
        mut conn: BoxStream,
        metadata: InboundContext,
        on_close: CloseHandler,
    ) {
        let Some((permit, on_close)) = self.admit(on_close) else {
            return;
        };

        let upstream = self
            .open(
                &ctx,
                dialer.tag(),
                dialer.dial(&ctx, Network::Tcp, &metadata.destination),
            )
            .await;
        let mut upstream = match upstream {
            Ok(upstream) => upstream,
            Err(e) => {
                debug!(
                    "Failed to open {} via {}: {}",
                    metadata.destination,
                    dialer.tag(),
                    e
                );
                self.stats.record_error();
                drop(permit);
                on_close(Err(e));
                return;
            }
        };

        let stats = Arc::clone(&self.stats);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let tag = dialer.tag().to_string();

        tokio::spawn(async move {
            // Hold the permit until the relay is done
            let _permit = permit;

            let result = tokio::select! {
                r = tokio::io::copy_bidirectional(&mut conn, &mut upstream) => {
                    r.map_err(|e| ConnectionError::transfer(e.to_string()))
                }
                () = ctx.cancelled() => Ok((0, 0)),
                _ = shutdown_rx.recv() => Err(ConnectionError::ShuttingDown),
            };

            match result {
                Ok((up, down)) => {
                    debug!(
                        "Relay to {} via {} finished ({} up, {} down)",
                        metadata.destination, tag, up, down
                    );
                    stats.record_completed(up, down);
                    on_close(Ok(()));
                }
                Err(e) => {
                    debug!("Relay to {} via {} failed: {}", metadata.destination, tag, e);
                    stats.record_error();
                    on_close(Err(e));
                }
            }
        });
    }

    async fn new_packet_connection(
        &self,
        ctx: RequestContext,
        dialer: Arc<dyn Outbound>,
        conn: BoxPacketConn,
        metadata: InboundContext,
        on_close: CloseHandler,
    ) {
        let Some((permit, on_close)) = self.admit(on_close) else {
            return;
        };

        let upstream = self
            .open(
                &ctx,
                dialer.tag(),
                dialer.listen_packet(&ctx, &metadata.destination),
            )
            .await;
        let upstream = match upstream {
            Ok(upstream) => upstream,
            Err(e) => {
                debug!(
                    "Failed to open packet session for {} via {}: {}",
                    metadata.destination,
                    dialer.tag(),
                    e
                );
                self.stats.record_error();
                drop(permit);
                on_close(Err(e));
                return;
            }
        };

        let stats = Arc::clone(&self.stats);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let buffer_size = self.buffer_size;
        let idle = self.udp_timeout;

        tokio::spawn(async move {
            let _permit = permit;
            let mut up = 0u64;
            let mut down = 0u64;
            let mut client_buf = vec![0u8; buffer_size];
            let mut upstream_buf = vec![0u8; buffer_size];

            let result: Result<(), ConnectionError> = loop {
                let step = tokio::select! {
                    r = conn.recv_from(&mut client_buf) => match r {
                        Ok((n, target)) => upstream
                            .send_to(&client_buf[..n], &target)
                            .await
                            .map(|_| up += n as u64),
                        Err(e) => Err(e),
                    },
                    r = upstream.recv_from(&mut upstream_buf) => match r {
                        Ok((n, from)) => conn
                            .send_to(&upstream_buf[..n], &from)
                            .await
                            .map(|_| down += n as u64),
                        Err(e) => Err(e),
                    },
                    () = tokio::time::sleep(idle) => break Ok(()),
                    () = ctx.cancelled() => break Ok(()),
                    _ = shutdown_rx.recv() => break Err(ConnectionError::ShuttingDown),
                };
                if let Err(e) = step {
                    break Err(ConnectionError::transfer(e.to_string()));
                }
            };

            match result {
                Ok(()) => {
                    stats.record_completed(up, down);
                    on_close(Ok(()));
                }
                Err(e) => {
                    debug!("Packet relay for {} failed: {}", metadata.destination, e);
                    stats.record_error();
                    on_close(Err(e));
                }
            }
        });
    }
}

impl std::fmt::Debug for RelayConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConnectionManager")
            .field("max_connections", &self.max_connections)
            .field("active", &self.active_connections())
            .field("shutting_down", &self.is_shutting_down())
            .finish()
    }
}
