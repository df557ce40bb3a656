//! Execution Context
//!
//! The logical context a fan-out runs in: the runtime its scheduler and
//! units are spawned on, and the cancellation token that stops them.
//! Cancelling a context cancels every fan-out started from it.

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::fanout::FanOutError;

/// Runtime and cancellation scope shared by the fan-outs started from it.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    runtime: Handle,
    cancel: CancellationToken,
}

impl ExecutionContext {
    /// Creates a context on the given runtime with a fresh cancellation token.
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            cancel: CancellationToken::new(),
        }
    }

    /// Captures the runtime the caller is running on.
    ///
    /// Fails with a configuration error when called outside a tokio runtime.
    pub fn current() -> Result<Self, FanOutError> {
        let runtime = Handle::try_current().map_err(|e| {
            FanOutError::configuration(format!("no tokio runtime available: {}", e))
        })?;
        Ok(Self::new(runtime))
    }

    /// Replaces the cancellation token, e.g. to tie the context to a
    /// shutdown signal owned elsewhere.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Derives a context that is cancelled with this one but can also be
    /// cancelled on its own.
    pub fn child(&self) -> Self {
        Self {
            runtime: self.runtime.clone(),
            cancel: self.cancel.child_token(),
        }
    }

    /// Cancels this context and every context derived from it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns true once the context has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Runtime that fan-outs from this context are spawned on.
    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    /// Cancellation token of this context.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }
}
