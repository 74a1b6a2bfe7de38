//! Single-slot debounce register.
//!
//! # Responsibility
//! - Hold at most one pending delayed job.
//! - Hand each scheduled job a ticket so late results can be discarded.
//!
//! # Invariants
//! - Scheduling or cancelling aborts the pending job and invalidates every
//!   ticket issued before it.
//! - `apply_if_current` runs under the register lock, so it is ordered with
//!   respect to `schedule`/`cancel`.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::AbortHandle;

/// Identifies one scheduled job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    pending: Option<AbortHandle>,
}

#[derive(Debug, Default)]
pub struct Debouncer {
    slot: Mutex<Slot>,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any pending job with `job`, started after `delay`.
    ///
    /// Must be called from inside a Tokio runtime.
    pub fn schedule<F, Fut>(&self, delay: Duration, job: F) -> Ticket
    where
        F: FnOnce(Ticket) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.lock();
        if let Some(pending) = slot.pending.take() {
            pending.abort();
        }
        slot.generation += 1;
        let ticket = Ticket(slot.generation);

        let work = job(ticket);
        let task = tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            work.await;
        });
        slot.pending = Some(task.abort_handle());
        ticket
    }

    /// Drops the pending job, if any, and invalidates outstanding tickets.
    pub fn cancel(&self) {
        let mut slot = self.lock();
        if let Some(pending) = slot.pending.take() {
            pending.abort();
        }
        slot.generation += 1;
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.lock().generation == ticket.0
    }

    /// Runs `apply` only if `ticket` is still the latest one.
    pub fn apply_if_current<R>(&self, ticket: Ticket, apply: impl FnOnce() -> R) -> Option<R> {
        let slot = self.lock();
        if slot.generation != ticket.0 {
            return None;
        }
        let result = apply();
        drop(slot);
        Some(result)
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
