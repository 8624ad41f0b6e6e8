// Allow missing docs for internal items in development
#![allow(missing_docs)]

//! Call correlation for socket RPC.
//!
//! Matches asynchronous responses to the calls that caused them, enforces a
//! per-call timeout and guarantees every caller observes exactly one outcome.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         Session (per connection)                 │
//! ├──────────────────────────────────────────────────────────────────┤
//! │   RpcClient ──issue──▶ ┌──────────────────┐ ◀──complete/fail──┐  │
//! │       │                │  CallCorrelator  │                   │  │
//! │       │ send           └────────┬─────────┘                   │  │
//! │       ▼                         │                             │  │
//! │   FrameSender          ┌────────┴─────────┐      ResponseListener│
//! │       │                │ PendingCallTable │◀── expire_due ──┐  ▲ │
//! │       │                │ (id → oneshot)   │                 │  │ │
//! │       │                └──────────────────┘   TimeoutSweeper│  │ │
//! └───────┼──────────────────────────────────────────────────────┼──┘
//!         ▼                                                      │
//!       Peer ───────────────── response frames ──────▶ FrameReceiver
//! ```
//!
//! # Outcomes
//!
//! A call moves from pending to exactly one of `Completed`, `Faulted`,
//! `TimedOut` or `Cancelled`. Whoever removes the entry from the table first
//! (response path, sweeper or drain) decides the outcome; later attempts are
//! reported as [`Resolution::Stale`] and change nothing.
//!
//! # Usage
//!
//! ```ignore
//! use rpc_correlation::{CorrelationConfig, Session};
//!
//! let session = Session::<serde_json::Value>::open(CorrelationConfig::from_env()?)?;
//! let (id, handle) = session.correlator().issue_call()?;
//! // send a request frame carrying `id`, then:
//! let value = handle.await?;
//! session.close().await;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod adapters;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod service;
pub mod session;

// Re-exports
pub use adapters::{ListenerReport, ResponseListener, RpcClient};
pub use domain::{
    CallId, CallOutcome, CorrelationConfig, OutcomeKind, PendingCall, PendingCallHandle,
    RemoteFault, RequestFrame, Resolution, ResponseFrame, ResponseStatus, SessionId,
};
pub use error::{CallError, ConfigError, CorrelationError, TransportError};
pub use metrics::{CorrelationStats, StatsSnapshot};
pub use ports::{CorrelationApi, FrameReceiver, FrameSender};
pub use service::{CallCorrelator, PendingCallTable, SweepReport, SweeperHandle, TimeoutSweeper};
pub use session::{Session, SessionReport};
