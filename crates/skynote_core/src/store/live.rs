//! Live-query plumbing: cancellation tokens, subscriptions and publishing.
//!
//! # Invariants
//! - A publish that observes a cancelled token delivers nothing.
//! - Cancelling through [`replace_subscription`] takes the sink's write lock,
//!   so no publish from the cancelled subscription can land afterwards.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::AbortHandle;

/// Shared flag handed to a live query when it is opened.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Handle to one running live query. Dropping it cancels the query.
#[derive(Debug)]
pub struct Subscription {
    token: CancelToken,
    task: AbortHandle,
}

impl Subscription {
    pub(crate) fn new(token: CancelToken, task: AbortHandle) -> Self {
        Self { token, task }
    }

    /// Stops delivery and aborts the background task.
    pub fn cancel(&self) {
        self.token.cancel();
        self.task.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Publishes `value` into `sink` unless `token` is cancelled.
///
/// Receivers are only notified when the value actually changed. Returns
/// `false` once the token is cancelled so the caller can stop its loop.
pub(crate) fn publish<T: PartialEq>(sink: &watch::Sender<T>, token: &CancelToken, value: T) -> bool {
    let mut live = true;
    sink.send_if_modified(|current| {
        if token.is_cancelled() {
            live = false;
            return false;
        }
        if *current == value {
            return false;
        }
        *current = value;
        true
    });
    live
}

/// Cancels the subscription held in `slot` while holding `sink`'s write lock,
/// then applies `reset` to the published value.
///
/// Callers store the replacement subscription in `slot` afterwards.
pub fn replace_subscription<T>(
    slot: &mut Option<Subscription>,
    sink: &watch::Sender<T>,
    reset: impl FnOnce(&mut T) -> bool,
) {
    sink.send_if_modified(|current| {
        if let Some(previous) = slot.take() {
            previous.cancel();
        }
        reset(current)
    });
}
