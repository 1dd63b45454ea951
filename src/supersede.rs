//! Supersession tracking for overlapping async operations
//!
//! A [`Generation`] is a shared, monotonically increasing counter. Every async
//! operation takes a [`Ticket`] when it is issued and checks it before applying
//! its result: if anything has bumped the counter in the meantime, the result
//! is stale and gets dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared generation counter
#[derive(Debug, Clone, Default)]
pub struct Generation {
    counter: Arc<AtomicU64>,
}

/// Snapshot of a [`Generation`] taken when an operation was issued
#[derive(Debug, Clone)]
pub struct Ticket {
    id: u64,
    counter: Arc<AtomicU64>,
}

impl Generation {
    /// Create a counter starting at zero
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the counter and return a ticket for the new value
    ///
    /// Every ticket issued earlier becomes stale.
    #[must_use]
    pub fn issue(&self) -> Ticket {
        let id = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ticket {
            id,
            counter: Arc::clone(&self.counter),
        }
    }

    /// Ticket for the current value, without invalidating anything
    #[must_use]
    pub fn current(&self) -> Ticket {
        Ticket {
            id: self.counter.load(Ordering::SeqCst),
            counter: Arc::clone(&self.counter),
        }
    }

    /// Invalidate every outstanding ticket
    pub fn bump(&self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }
}

impl Ticket {
    /// Whether no newer ticket has been issued since this one
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.counter.load(Ordering::SeqCst) == self.id
    }

    /// Numeric id of this ticket
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newer_ticket_supersedes_older() {
        let generation = Generation::new();
        let first = generation.issue();
        assert!(first.is_current());

        let second = generation.issue();
        assert!(!first.is_current());
        assert!(second.is_current());
        assert!(second.id() > first.id());
    }

    #[test]
    fn test_current_does_not_invalidate() {
        let generation = Generation::new();
        let issued = generation.issue();
        let observed = generation.current();

        assert!(issued.is_current());
        assert!(observed.is_current());

        generation.bump();
        assert!(!issued.is_current());
        assert!(!observed.is_current());
    }
}
