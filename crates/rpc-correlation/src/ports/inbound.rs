//! Inbound Ports (Driving Ports)
//!
//! The API the transport side uses to drive correlation.

use std::time::Duration;

use crate::domain::{CallId, PendingCallHandle, RemoteFault, Resolution};
use crate::error::CorrelationError;
use crate::service::CallCorrelator;

/// Correlation API (Driving Port)
pub trait CorrelationApi<T>: Send + Sync {
    /// Register a new call before its request frame is sent.
    ///
    /// `None` applies the configured default timeout.
    fn issue(
        &self,
        timeout: Option<Duration>,
    ) -> Result<(CallId, PendingCallHandle<T>), CorrelationError>;

    /// Deliver a successful response
    fn complete_call(&self, id: CallId, value: T) -> Resolution;

    /// Deliver a remote fault
    fn fail_call(&self, id: CallId, fault: RemoteFault) -> Resolution;

    /// Cancel one call
    fn cancel_call(&self, id: CallId) -> Resolution;

    /// Teardown hook: cancel every outstanding call and reject new ones
    fn drain(&self) -> usize;
}

impl<T> CorrelationApi<T> for CallCorrelator<T>
where
    T: Send + 'static,
{
    fn issue(
        &self,
        timeout: Option<Duration>,
    ) -> Result<(CallId, PendingCallHandle<T>), CorrelationError> {
        match timeout {
            Some(timeout) => self.issue_call_with_timeout(timeout),
            None => self.issue_call(),
        }
    }

    fn complete_call(&self, id: CallId, value: T) -> Resolution {
        CallCorrelator::complete_call(self, id, value)
    }

    fn fail_call(&self, id: CallId, fault: RemoteFault) -> Resolution {
        CallCorrelator::fail_call(self, id, fault)
    }

    fn cancel_call(&self, id: CallId) -> Resolution {
        CallCorrelator::cancel_call(self, id)
    }

    fn drain(&self) -> usize {
        CallCorrelator::drain(self)
    }
}
