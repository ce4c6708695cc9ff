//! Per-request context
//!
//! Carries the caller's cancellation signal into every pick and every
//! dial/listen attempt, and marks connections that were accepted elsewhere
//! and handed to an outbound rather than dialed locally.

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Cancellable request context
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    cancel: CancellationToken,
    external_connection: bool,
}

impl RequestContext {
    /// Create a context that is never cancelled unless `cancel` is called
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context driven by an existing token
    #[must_use]
    pub fn with_token(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            external_connection: false,
        }
    }

    /// Derive a child context; cancelling the parent cancels the child
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            external_connection: self.external_connection,
        }
    }

    /// Mark the context as carrying an externally originated connection
    #[must_use]
    pub fn with_external_connection(mut self) -> Self {
        self.external_connection = true;
        self
    }

    /// Whether the connection was accepted elsewhere and handed off
    #[must_use]
    pub const fn is_external_connection(&self) -> bool {
        self.external_connection
    }

    /// Cancel this context and all children
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the context has been cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the context is cancelled
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// Get the underlying token
    #[must_use]
    pub const fn token(&self) -> &CancellationToken {
        &self.cancel
    }
}
