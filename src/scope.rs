//! Cancellation scope with a terminal cause
//!
//! Every session owns one `CancelScope`, shared by all of its tasks. The
//! first call to `cancel` records the cause and fires the underlying
//! `CancellationToken`; later calls are ignored. Cleanup actions registered
//! with `after_cancel` each run exactly once, after the scope fires.

use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::error::CancelCause;

#[derive(Debug, Clone, Default)]
pub struct CancelScope {
    inner: Arc<ScopeInner>,
}

#[derive(Debug, Default)]
struct ScopeInner {
    token: CancellationToken,
    cause: OnceLock<CancelCause>,
}

impl CancelScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope that cancels itself with `CancelCause::Timeout` once `limit`
    /// has elapsed, unless something cancels it earlier.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn with_deadline(limit: Duration) -> Self {
        let scope = Self::new();

        let timer = scope.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = timer.cancelled() => {}
                _ = tokio::time::sleep(limit) => {
                    timer.cancel(CancelCause::Timeout);
                }
            }
        });

        scope
    }

    /// Cancel with `cause`. Returns false if the scope was already cancelled.
    pub fn cancel(&self, cause: CancelCause) -> bool {
        if self.inner.cause.set(cause).is_err() {
            return false;
        }
        self.inner.token.cancel();
        true
    }

    /// Resolves once the scope is cancelled
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.inner.token.cancelled()
    }

    /// The cause recorded by the first `cancel`
    pub fn cause(&self) -> Option<&CancelCause> {
        self.inner.cause.get()
    }

    /// Run `action` once the scope is cancelled, whatever the cause
    ///
    /// Must be called from within a Tokio runtime.
    pub fn after_cancel<F, Fut>(&self, action: F)
    where
        F: FnOnce(CancelScope) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let scope = self.clone();
        tokio::spawn(async move {
            scope.cancelled().await;
            action(scope).await;
        });
    }
}
