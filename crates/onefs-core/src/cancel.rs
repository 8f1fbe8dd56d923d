//! Cooperative cancellation for remote calls.
//!
//! Remote calls are futures; cancelling one means dropping it. [`guarded`]
//! races every call against a [`CancellationToken`] so that a fired token stops
//! the in-flight call and the caller sees [`OnefsError::Cancelled`] instead of
//! a partial success.

use async_trait::async_trait;
use futures::future::{self, Either};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use crate::errors::{OnefsError, Result};

/// Cooperative cancellation token.
#[async_trait]
pub trait CancellationToken: Send + Sync {
    /// Resolves when cancellation is requested.
    async fn cancelled(&self);

    /// Non-blocking cancellation check.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Cancellation token that never triggers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

#[async_trait]
impl CancellationToken for NeverCancel {
    async fn cancelled(&self) {
        future::pending::<()>().await;
    }
}

/// Cancellation token fired by calling [`CancelSignal::cancel`].
///
/// Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    inner: Arc<SignalState>,
}

#[derive(Debug, Default)]
struct SignalState {
    fired: AtomicBool,
    notify: Notify,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.inner.fired.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }
}

#[async_trait]
impl CancellationToken for CancelSignal {
    async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.inner.fired.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }

    fn is_cancelled(&self) -> bool {
        self.inner.fired.load(Ordering::SeqCst)
    }
}

/// Run a remote call unless cancellation has fired, aborting it if
/// cancellation fires while it is in flight.
pub async fn guarded<T, F>(token: &dyn CancellationToken, operation: &str, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if token.is_cancelled() {
        return Err(OnefsError::cancelled(operation));
    }

    let call = std::pin::pin!(call);
    let cancelled = token.cancelled();
    match future::select(call, cancelled).await {
        Either::Left((result, _)) => result,
        Either::Right(((), _)) => {
            tracing::debug!(operation, "remote call cancelled in flight");
            Err(OnefsError::cancelled(operation))
        }
    }
}
