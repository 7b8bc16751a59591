//! Cancellable debounce slot
//!
//! A [`Debounced`] holds at most one pending value with a due time. Every
//! `schedule` replaces the pending value and pushes the due time out by the
//! quiet period; `poll` releases the value once the quiet period has elapsed.
//! The owner drives it with explicit instants, so the same type works under a
//! tokio timer and in plain unit tests.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Pending<T> {
    value: T,
    due: Instant,
}

#[derive(Debug, Clone)]
pub struct Debounced<T> {
    quiet: Duration,
    pending: Option<Pending<T>>,
}

impl<T> Debounced<T> {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: None,
        }
    }

    /// Replace any pending value and restart the quiet period from `now`
    pub fn schedule(&mut self, value: T, now: Instant) {
        self.pending = Some(Pending {
            value,
            due: now + self.quiet,
        });
    }

    /// Drop the pending value, if any
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.due)
    }

    /// Release the pending value if its quiet period has elapsed
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some(pending) if pending.due <= now => self.pending.take().map(|p| p.value),
            _ => None,
        }
    }

    /// Release the pending value immediately
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|p| p.value)
    }
}
