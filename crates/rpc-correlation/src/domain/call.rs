//! Pending calls and their single-shot outcome slot.
//!
//! A call is split in two halves when it is created:
//!
//! - [`PendingCall`] holds the settable half. It is registered in the call
//!   table and consumed by whichever actor resolves it first.
//! - [`PendingCallHandle`] holds the receiving half. The caller awaits it
//!   (or blocks on it) and observes exactly one outcome.
//!
//! Settling consumes the `PendingCall`, so a second outcome cannot be set.

use crate::domain::{CallId, RemoteFault};
use crate::error::CallError;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// Terminal outcome of one call.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome<T> {
    /// Response arrived with a value
    Completed(T),
    /// Response arrived reporting a remote fault
    Faulted(RemoteFault),
    /// No response within the timeout window
    TimedOut,
    /// Cancelled explicitly or by teardown drain
    Cancelled,
}

impl<T> CallOutcome<T> {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            CallOutcome::Completed(_) => OutcomeKind::Completed,
            CallOutcome::Faulted(_) => OutcomeKind::Faulted,
            CallOutcome::TimedOut => OutcomeKind::TimedOut,
            CallOutcome::Cancelled => OutcomeKind::Cancelled,
        }
    }

    fn into_result(self, id: CallId, timeout: Duration) -> Result<T, CallError> {
        match self {
            CallOutcome::Completed(value) => Ok(value),
            CallOutcome::Faulted(fault) => Err(CallError::Remote(fault)),
            CallOutcome::TimedOut => Err(CallError::TimedOut { id, timeout }),
            CallOutcome::Cancelled => Err(CallError::Cancelled { id }),
        }
    }
}

/// Payload-free tag of a [`CallOutcome`], for stats and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    Completed,
    Faulted,
    TimedOut,
    Cancelled,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Completed => "completed",
            OutcomeKind::Faulted => "faulted",
            OutcomeKind::TimedOut => "timed_out",
            OutcomeKind::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a resolve attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The call was pending and its caller received the outcome
    Resolved,
    /// The call was pending but its caller had stopped waiting
    Abandoned,
    /// No call with this id was pending (late, duplicate or unknown)
    Stale,
}

impl Resolution {
    /// True when this attempt retired a pending call.
    pub fn retired(&self) -> bool {
        !matches!(self, Resolution::Stale)
    }
}

/// Result of handing an outcome to the receiving half
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Delivered,
    ReceiverGone,
}

/// Settable half of an outstanding call.
pub struct PendingCall<T> {
    id: CallId,
    timeout: Duration,
    created_at: Instant,
    slot: oneshot::Sender<CallOutcome<T>>,
}

impl<T> PendingCall<T> {
    /// Create a call and the handle its caller waits on.
    pub fn new(id: CallId, timeout: Duration) -> (Self, PendingCallHandle<T>) {
        let (tx, rx) = oneshot::channel();
        let call = Self {
            id,
            timeout,
            created_at: Instant::now(),
            slot: tx,
        };
        let handle = PendingCallHandle { id, timeout, rx };
        (call, handle)
    }

    pub fn id(&self) -> CallId {
        self.id
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Creation timestamp, re-captured when the call is registered
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Instant at which the call becomes eligible for the timeout outcome
    pub fn deadline(&self) -> Instant {
        self.created_at
            .checked_add(self.timeout)
            .unwrap_or_else(far_future)
    }

    /// True when the caller dropped its handle
    pub fn is_abandoned(&self) -> bool {
        self.slot.is_closed()
    }

    pub(crate) fn stamp(&mut self, now: Instant) {
        self.created_at = now;
    }

    pub(crate) fn settle(self, outcome: CallOutcome<T>) -> Delivery {
        match self.slot.send(outcome) {
            Ok(()) => Delivery::Delivered,
            Err(_) => Delivery::ReceiverGone,
        }
    }
}

impl<T> fmt::Debug for PendingCall<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCall")
            .field("id", &self.id)
            .field("timeout", &self.timeout)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Receiving half of an outstanding call.
///
/// Await it from async code, or call [`wait_blocking`](Self::wait_blocking)
/// from a plain thread. Either way exactly one outcome is observed. If the
/// settable half is dropped without an outcome the handle yields
/// [`CallError::Abandoned`] instead of hanging.
#[must_use = "a pending call does nothing unless its handle is awaited"]
pub struct PendingCallHandle<T> {
    id: CallId,
    timeout: Duration,
    rx: oneshot::Receiver<CallOutcome<T>>,
}

impl<T> PendingCallHandle<T> {
    pub fn id(&self) -> CallId {
        self.id
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Block the current thread until the call reaches a terminal state.
    ///
    /// Panics if called from within an async execution context, like
    /// [`oneshot::Receiver::blocking_recv`].
    pub fn wait_blocking(self) -> Result<T, CallError> {
        let Self { id, timeout, rx } = self;
        match rx.blocking_recv() {
            Ok(outcome) => outcome.into_result(id, timeout),
            Err(_) => Err(CallError::Abandoned { id }),
        }
    }
}

impl<T> Future for PendingCallHandle<T> {
    type Output = Result<T, CallError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome.into_result(this.id, this.timeout)),
            Poll::Ready(Err(_)) => Poll::Ready(Err(CallError::Abandoned { id: this.id })),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> fmt::Debug for PendingCallHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCallHandle")
            .field("id", &self.id)
            .field("timeout", &self.timeout)
            .finish()
    }
}

// Roughly 30 years, as tokio does for unbounded sleeps.
fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86400 * 365 * 30)
}
