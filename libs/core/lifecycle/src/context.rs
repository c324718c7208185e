//! Cancellation scopes.
//!
//! A [`Context`] is a cheap, cloneable handle on a node in a cancellation
//! tree. Canceling a node cancels every context derived from it; a node with
//! a deadline cancels itself with [`CancelCause::DeadlineExceeded`] once the
//! deadline passes.
//!
//! ```ignore
//! let root = Context::background();
//! let request = root.child();
//!
//! tokio::select! {
//!     cause = request.done() => return Err(cause.into()),
//!     chunk = stream.next() => { /* ... */ }
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;

/// Why a context ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum CancelCause {
    #[error("context canceled")]
    Canceled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

struct Inner {
    state: watch::Sender<Option<CancelCause>>,
    parent: Option<Context>,
    deadline: Option<Instant>,
}

impl Context {
    /// Root context; never canceled on its own.
    pub fn background() -> Self {
        Self::node(None, None)
    }

    /// Derived context, canceled with its parent or by [`Context::cancel`].
    pub fn child(&self) -> Self {
        Self::node(Some(self.clone()), None)
    }

    /// Derived context that also expires `timeout` from now.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self::node(Some(self.clone()), Some(Instant::now() + timeout))
    }

    fn node(parent: Option<Context>, deadline: Option<Instant>) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                state,
                parent,
                deadline,
            }),
        }
    }

    /// Cancels this context and everything derived from it.
    ///
    /// The first cause recorded wins; later calls are no-ops.
    pub fn cancel(&self) {
        if self.err().is_some() {
            return;
        }
        self.inner.state.send_if_modified(|state| {
            if state.is_none() {
                *state = Some(CancelCause::Canceled);
                true
            } else {
                false
            }
        });
    }

    /// `Some(cause)` once this context is done.
    pub fn err(&self) -> Option<CancelCause> {
        if let Some(cause) = *self.inner.state.borrow() {
            return Some(cause);
        }
        if self.inner.deadline.is_some_and(|d| Instant::now() >= d) {
            return Some(CancelCause::DeadlineExceeded);
        }
        self.inner.parent.as_ref().and_then(Context::err)
    }

    /// Guard that cancels this context when dropped.
    pub fn drop_guard(&self) -> DropGuard {
        DropGuard(self.clone())
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Resolves with the cause once this context is done.
    pub fn done(&self) -> Pin<Box<dyn Future<Output = CancelCause> + Send + '_>> {
        Box::pin(async move {
            if let Some(cause) = self.err() {
                return cause;
            }

            let mut rx = self.inner.state.subscribe();
            let own = async move {
                // Copy out so the `!Send` borrow ends before any await.
                let recorded = rx.wait_for(Option::is_some).await.map(|cause| *cause);
                match recorded {
                    Ok(cause) => cause.unwrap_or(CancelCause::Canceled),
                    // Sender lives in `inner`, which `self` keeps alive.
                    Err(_) => std::future::pending().await,
                }
            };

            let expired = async {
                match self.inner.deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            let parent = async {
                match &self.inner.parent {
                    Some(parent) => parent.done().await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                cause = own => cause,
                _ = expired => CancelCause::DeadlineExceeded,
                cause = parent => cause,
            }
        })
    }
}

/// Cancels its context on drop, see [`Context::drop_guard`].
#[must_use = "the context is canceled as soon as the guard is dropped"]
pub struct DropGuard(Context);

impl Drop for DropGuard {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("err", &self.err())
            .field("deadline", &self.inner.deadline)
            .finish()
    }
}
