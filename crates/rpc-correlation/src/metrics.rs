//! Counters for correlation activity.
//!
//! Observability only: nothing in the table reads these to make a decision.

use crate::domain::OutcomeKind;
use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for one call table
#[derive(Debug, Default)]
pub struct CorrelationStats {
    /// Calls accepted by `register`
    pub registered: AtomicU64,
    /// Calls completed with a value
    pub completed: AtomicU64,
    /// Calls completed with a remote fault
    pub faulted: AtomicU64,
    /// Calls retired by the sweeper
    pub timed_out: AtomicU64,
    /// Calls cancelled explicitly or by drain
    pub cancelled: AtomicU64,
    /// Resolutions for ids that were no longer pending
    pub stale: AtomicU64,
    /// Outcomes set after the caller stopped waiting
    pub abandoned: AtomicU64,
    /// Registrations rejected because the id was live
    pub duplicates: AtomicU64,
    /// Calls taken out of the table without an outcome
    pub removed: AtomicU64,
}

impl CorrelationStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_registered(&self) {
        self.registered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retired(&self, kind: OutcomeKind) {
        let counter = match kind {
            OutcomeKind::Completed => &self.completed,
            OutcomeKind::Faulted => &self.faulted,
            OutcomeKind::TimedOut => &self.timed_out,
            OutcomeKind::Cancelled => &self.cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_stale(&self) {
        self.stale.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_abandoned(&self) {
        self.abandoned.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_removed(&self) {
        self.removed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current statistics snapshot
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            registered: self.registered.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            faulted: self.faulted.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`CorrelationStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub registered: u64,
    pub completed: u64,
    pub faulted: u64,
    pub timed_out: u64,
    pub cancelled: u64,
    pub stale: u64,
    pub abandoned: u64,
    pub duplicates: u64,
    pub removed: u64,
}

impl StatsSnapshot {
    /// Calls that reached a terminal state
    pub fn retired(&self) -> u64 {
        self.completed + self.faulted + self.timed_out + self.cancelled
    }

    /// Registered calls neither retired nor removed.
    ///
    /// Counters are read independently, so under load this is approximate.
    pub fn in_flight(&self) -> u64 {
        self.registered
            .saturating_sub(self.retired())
            .saturating_sub(self.removed)
    }
}
