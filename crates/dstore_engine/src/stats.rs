//! Engine statistics.
//!
//! Counters let tests and callers observe how much work a reconciliation
//! really did, e.g. that a no-op persist issued zero writes.

use std::sync::atomic::{AtomicU64, Ordering};

/// Engine counters.
///
/// All counters are atomic and monotonically increasing.
#[derive(Debug, Default)]
pub struct EngineStats {
    /// Commands applied, inside or outside transactions.
    commands_applied: AtomicU64,
    /// `WATCH` calls.
    watches: AtomicU64,
    /// Transactions that committed.
    transactions_committed: AtomicU64,
    /// Transactions discarded because of a watch conflict or injected fault.
    transactions_aborted: AtomicU64,
}

impl EngineStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_command(&self) {
        self.commands_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_watch(&self) {
        self.watches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self) {
        self.transactions_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_abort(&self) {
        self.transactions_aborted.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a point-in-time copy of every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            commands_applied: self.commands_applied.load(Ordering::Relaxed),
            watches: self.watches.load(Ordering::Relaxed),
            transactions_committed: self.transactions_committed.load(Ordering::Relaxed),
            transactions_aborted: self.transactions_aborted.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`EngineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Commands applied.
    pub commands_applied: u64,
    /// `WATCH` calls.
    pub watches: u64,
    /// Committed transactions.
    pub transactions_committed: u64,
    /// Aborted transactions.
    pub transactions_aborted: u64,
}

impl StatsSnapshot {
    /// Returns the counter deltas between `earlier` and `self`.
    #[must_use]
    pub fn since(&self, earlier: &StatsSnapshot) -> StatsSnapshot {
        StatsSnapshot {
            commands_applied: self.commands_applied - earlier.commands_applied,
            watches: self.watches - earlier.watches,
            transactions_committed: self.transactions_committed - earlier.transactions_committed,
            transactions_aborted: self.transactions_aborted - earlier.transactions_aborted,
        }
    }
}
