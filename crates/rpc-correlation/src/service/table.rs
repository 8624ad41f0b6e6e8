//! Pending call table.
//!
//! Maps correlation ids to the settable half of each outstanding call.
//!
//! Flow:
//! 1. Caller creates a [`PendingCall`] and calls `register()`
//! 2. Caller sends the request frame carrying the id (external)
//! 3. Receive path calls `resolve()` when the matching response arrives
//! 4. Sweeper calls `expire_due()` to retire calls past their deadline
//! 5. Teardown calls `drain()` so no caller is left waiting
//!
//! Whichever of steps 3, 4 and 5 removes the entry first settles the call.
//! The others find nothing and return [`Resolution::Stale`].
//!
//! ## Locking
//!
//! - `calls` is a sharded map; unrelated ids never contend on one lock.
//! - `expiries` is a min-heap of deadlines. It is never held while a map
//!   shard is locked for writing, and never across a scan of the map:
//!   compaction takes the heap out, filters it unlocked, then merges back
//!   whatever was pushed in the meantime.
//! - `closed` is a gate: `register` holds it shared, `cancel_all`/`drain`
//!   hold it exclusively, so a registration either lands before a drain (and
//!   is cancelled by it) or observes the closed table and is rejected.

use crate::domain::call::Delivery;
use crate::domain::{CallId, CallOutcome, PendingCall, Resolution, SessionId};
use crate::error::CorrelationError;
use crate::metrics::CorrelationStats;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Heap entries for calls settled outside the sweeper are dropped lazily;
/// once there are more than this many, and more than live calls, the heap is
/// compacted.
const COMPACT_SLACK: usize = 1024;

/// A registered call plus the registration stamp its expiry refers to
struct Slot<T> {
    stamp: u64,
    call: PendingCall<T>,
}

/// Deadline of one registration. Ordered by deadline first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Expiry {
    deadline: Instant,
    stamp: u64,
    id: CallId,
}

/// Registry of outstanding calls for one connection/session.
pub struct PendingCallTable<T> {
    session: SessionId,
    calls: DashMap<CallId, Slot<T>>,
    expiries: Mutex<BinaryHeap<Reverse<Expiry>>>,
    closed: RwLock<bool>,
    next_stamp: AtomicU64,
    /// Heap entries whose call already left the map
    stale_expiries: AtomicUsize,
    compacting: AtomicBool,
    wake: Notify,
    stats: CorrelationStats,
}

impl<T> PendingCallTable<T> {
    /// Create an empty table for a fresh session
    pub fn new() -> Self {
        Self::for_session(SessionId::new())
    }

    /// Create an empty table owned by `session`
    pub fn for_session(session: SessionId) -> Self {
        Self {
            session,
            calls: DashMap::new(),
            expiries: Mutex::new(BinaryHeap::new()),
            closed: RwLock::new(false),
            next_stamp: AtomicU64::new(0),
            stale_expiries: AtomicUsize::new(0),
            compacting: AtomicBool::new(false),
            wake: Notify::new(),
            stats: CorrelationStats::new(),
        }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Register a call under its id.
    ///
    /// The call's creation time is captured here. Fails without touching the
    /// existing entry if the id is already pending, and fails once the table
    /// has been drained. A rejected call is dropped, so its handle resolves
    /// to `CallError::Abandoned`.
    pub fn register(&self, mut call: PendingCall<T>) -> Result<(), CorrelationError> {
        let id = call.id();
        let closed = self.closed.read();
        if *closed {
            debug!(session_id = %self.session, call_id = %id, "Rejected registration on closed table");
            return Err(CorrelationError::Closed { id });
        }

        let stamp = self.next_stamp.fetch_add(1, Ordering::Relaxed);
        let deadline = match self.calls.entry(id) {
            Entry::Occupied(_) => {
                self.stats.record_duplicate();
                warn!(
                    session_id = %self.session,
                    call_id = %id,
                    "Duplicate registration rejected"
                );
                return Err(CorrelationError::DuplicateRegistration { id });
            }
            Entry::Vacant(vacant) => {
                call.stamp(Instant::now());
                let deadline = call.deadline();
                vacant.insert(Slot { stamp, call });
                deadline
            }
        };

        let earliest = {
            let mut heap = self.expiries.lock();
            let earliest = heap
                .peek()
                .map_or(true, |Reverse(front)| deadline < front.deadline);
            heap.push(Reverse(Expiry {
                deadline,
                stamp,
                id,
            }));
            earliest
        };
        drop(closed);

        self.stats.record_registered();
        if earliest {
            self.wake.notify_one();
        }

        debug!(session_id = %self.session, call_id = %id, "Registered pending call");
        Ok(())
    }

    /// Retire the call `id` with `outcome`.
    ///
    /// A missing id is expected (late response after timeout, duplicate
    /// delivery) and is reported as [`Resolution::Stale`], never as an error.
    pub fn resolve(&self, id: CallId, outcome: CallOutcome<T>) -> Resolution {
        match self.calls.remove(&id) {
            Some((_, slot)) => {
                let resolution = self.retire(slot.call, outcome);
                self.note_stale_expiry();
                resolution
            }
            None => {
                self.stats.record_stale();
                debug!(
                    session_id = %self.session,
                    call_id = %id,
                    outcome = %outcome.kind(),
                    "Stale resolution dropped (call no longer pending)"
                );
                Resolution::Stale
            }
        }
    }

    /// Cancel one call
    pub fn cancel(&self, id: CallId) -> Resolution {
        self.resolve(id, CallOutcome::Cancelled)
    }

    /// Remove a call without settling it.
    ///
    /// Ownership of the settable half goes back to the caller.
    pub fn remove(&self, id: CallId) -> Option<PendingCall<T>> {
        let (_, slot) = self.calls.remove(&id)?;
        self.stats.record_removed();
        self.note_stale_expiry();
        debug!(session_id = %self.session, call_id = %id, "Removed pending call unsettled");
        Some(slot.call)
    }

    /// Retire every call whose deadline is at or before `now`.
    ///
    /// Returns the number of calls moved to the timeout outcome.
    pub fn expire_due(&self, now: Instant) -> usize {
        let due = {
            let mut heap = self.expiries.lock();
            let mut due = Vec::new();
            while heap
                .peek()
                .is_some_and(|Reverse(front)| front.deadline <= now)
            {
                if let Some(Reverse(expiry)) = heap.pop() {
                    due.push(expiry);
                }
            }
            due
        };

        let mut expired = 0;
        let mut skipped = 0;
        for expiry in due {
            // The id may have been resolved and re-registered since; only the
            // registration this deadline belongs to is expired.
            let removed = self
                .calls
                .remove_if(&expiry.id, |_, slot| slot.stamp == expiry.stamp);
            if let Some((_, slot)) = removed {
                warn!(
                    session_id = %self.session,
                    call_id = %expiry.id,
                    timeout_ms = slot.call.timeout().as_millis() as u64,
                    "Pending call timed out"
                );
                self.retire(slot.call, CallOutcome::TimedOut);
                expired += 1;
            } else {
                skipped += 1;
            }
        }

        self.forget_stale_expiries(skipped);
        expired
    }

    /// Earliest deadline still tracked, if any.
    ///
    /// May belong to a call that was already resolved; expiring it is then a
    /// no-op.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.expiries
            .lock()
            .peek()
            .map(|Reverse(front)| front.deadline)
    }

    /// Cancel every pending call, leaving the table open.
    pub fn cancel_all(&self) -> usize {
        self.cancel_pending(false)
    }

    /// Cancel every pending call and close the table.
    ///
    /// Later registrations fail with `CorrelationError::Closed`. Used on
    /// connection teardown.
    pub fn drain(&self) -> usize {
        self.cancel_pending(true)
    }

    /// Number of pending calls
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn contains(&self, id: CallId) -> bool {
        self.calls.contains_key(&id)
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.read()
    }

    pub fn stats(&self) -> &CorrelationStats {
        &self.stats
    }

    /// Resolves when a registration moved the earliest deadline forward or
    /// the table was drained.
    pub(crate) async fn changed(&self) {
        self.wake.notified().await
    }

    fn cancel_pending(&self, close: bool) -> usize {
        let mut closed = self.closed.write();
        if close {
            *closed = true;
        }

        let ids: Vec<CallId> = self.calls.iter().map(|entry| *entry.key()).collect();
        let mut cancelled = 0;
        for id in ids {
            if let Some((_, slot)) = self.calls.remove(&id) {
                self.retire(slot.call, CallOutcome::Cancelled);
                cancelled += 1;
            }
        }
        self.expiries.lock().clear();
        self.stale_expiries.store(0, Ordering::Relaxed);
        drop(closed);

        self.wake.notify_one();
        info!(
            session_id = %self.session,
            cancelled = cancelled,
            closed = close,
            "Cancelled pending calls"
        );
        cancelled
    }

    fn retire(&self, call: PendingCall<T>, outcome: CallOutcome<T>) -> Resolution {
        let id = call.id();
        let kind = outcome.kind();
        let elapsed = call.created_at().elapsed();
        self.stats.record_retired(kind);

        match call.settle(outcome) {
            Delivery::Delivered => {
                debug!(
                    session_id = %self.session,
                    call_id = %id,
                    outcome = %kind,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Pending call resolved"
                );
                Resolution::Resolved
            }
            Delivery::ReceiverGone => {
                self.stats.record_abandoned();
                debug!(
                    session_id = %self.session,
                    call_id = %id,
                    outcome = %kind,
                    "Caller stopped waiting before resolution"
                );
                Resolution::Abandoned
            }
        }
    }

    /// Count one heap entry left behind by a call settled outside the
    /// sweeper, compacting once they pile up.
    fn note_stale_expiry(&self) {
        let stale = self.stale_expiries.fetch_add(1, Ordering::Relaxed) + 1;
        if stale > COMPACT_SLACK && stale > self.calls.len() {
            self.compact();
        }
    }

    fn forget_stale_expiries(&self, count: usize) {
        if count == 0 {
            return;
        }
        // Relaxed accounting: the counter only schedules compaction.
        let _ = self
            .stale_expiries
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_sub(count))
            });
    }

    /// Drop heap entries whose registration is gone.
    ///
    /// The heap lock is held only to take the heap out and to merge the
    /// survivors back; registrations meanwhile push into the emptied heap.
    fn compact(&self) {
        if self
            .compacting
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return;
        }

        let taken = std::mem::take(&mut *self.expiries.lock());
        let before = taken.len();
        let survivors: BinaryHeap<Reverse<Expiry>> = taken
            .into_iter()
            .filter(|Reverse(expiry)| {
                self.calls
                    .get(&expiry.id)
                    .is_some_and(|slot| slot.stamp == expiry.stamp)
            })
            .collect();
        let after = survivors.len();

        {
            let mut heap = self.expiries.lock();
            let pushed = std::mem::replace(&mut *heap, survivors);
            heap.extend(pushed);
        }
        self.forget_stale_expiries(before - after);
        self.compacting.store(false, Ordering::Release);

        // The sweeper may have parked on the emptied heap.
        self.wake.notify_one();
        debug!(
            session_id = %self.session,
            before = before,
            after = after,
            "Compacted expiry heap"
        );
    }

    #[cfg(test)]
    fn expiry_entries(&self) -> usize {
        self.expiries.lock().len()
    }
}

impl<T> Default for PendingCallTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for PendingCallTable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCallTable")
            .field("session", &self.session)
            .field("pending", &self.calls.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
