//! Error types for the correlation layer

use crate::domain::{CallId, RemoteFault};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
///
/// Always raised synchronously; the previously configured value stays in
/// effect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Timeout must be strictly positive
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),

    /// Sweep interval must be strictly positive
    #[error("invalid sweep interval: {0}")]
    InvalidSweepInterval(String),

    /// Environment override could not be parsed
    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },
}

/// Local failures of the table itself.
///
/// These are caller-side bugs or lifecycle violations, never network
/// conditions, so they are kept apart from [`CallError`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorrelationError {
    #[error("call {id} is already pending (duplicate registration)")]
    DuplicateRegistration { id: CallId },

    #[error("call table is closed, call {id} rejected")]
    Closed { id: CallId },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Terminal failure delivered to the caller awaiting one call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallError {
    /// The peer answered with a fault
    #[error("remote fault: {0}")]
    Remote(RemoteFault),

    /// No response arrived within the timeout window
    #[error("call {id} timed out after {}ms", timeout.as_millis())]
    TimedOut { id: CallId, timeout: Duration },

    /// The call was cancelled, usually by connection teardown
    #[error("call {id} cancelled")]
    Cancelled { id: CallId },

    /// The settable half was discarded without an outcome
    #[error("call {id} abandoned before completion")]
    Abandoned { id: CallId },

    /// The request frame never left this side
    #[error("call {id} could not be sent: {reason}")]
    SendFailed { id: CallId, reason: String },

    /// The call could not be issued at all
    #[error("call rejected: {0}")]
    Rejected(#[from] CorrelationError),
}

/// Transport failures seen by the client and the response listener
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,
    #[error("send failed: {0}")]
    SendFailed(String),
    #[error("receive failed: {0}")]
    ReceiveFailed(String),
    #[error("malformed frame: {0}")]
    Malformed(String),
}

impl CallError {
    /// The id of the call this error belongs to, when known locally.
    pub fn call_id(&self) -> Option<CallId> {
        match self {
            CallError::Remote(_) => None,
            CallError::Rejected(CorrelationError::DuplicateRegistration { id })
            | CallError::Rejected(CorrelationError::Closed { id }) => Some(*id),
            CallError::Rejected(CorrelationError::Config(_)) => None,
            CallError::TimedOut { id, .. }
            | CallError::Cancelled { id }
            | CallError::Abandoned { id }
            | CallError::SendFailed { id, .. } => Some(*id),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CallError::TimedOut { .. })
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, CallError::Remote(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, CallError::Cancelled { .. })
    }
}
