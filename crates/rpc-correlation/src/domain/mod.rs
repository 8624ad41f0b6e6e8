//! Domain types for the correlation layer.
//!
//! Pure data and the single-shot outcome slot. The concurrent table and the
//! sweeper live in `service`.

pub mod call;
pub mod config;
pub mod fault;
pub mod frames;
pub mod ids;

pub use call::{CallOutcome, OutcomeKind, PendingCall, PendingCallHandle, Resolution};
pub use config::{timeout_from_millis, validate_timeout, CorrelationConfig, MAX_SWEEP_INTERVAL};
pub use fault::RemoteFault;
pub use frames::{RequestFrame, ResponseFrame, ResponseStatus};
pub use ids::{CallId, SessionId};
