//! Receive-side adapter: routes response frames to waiting callers.

use crate::domain::{ResponseFrame, Resolution};
use crate::error::TransportError;
use crate::ports::{CorrelationApi, FrameReceiver};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Totals for one listener run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerReport {
    /// Frames that settled a waiting call
    pub routed: u64,
    /// Frames for ids that were no longer pending
    pub stale: u64,
    /// Calls cancelled when the transport closed
    pub drained: usize,
}

/// Response listener that feeds incoming frames into the correlator
pub struct ResponseListener {
    correlator: Arc<dyn CorrelationApi<Value>>,
    receiver: Arc<dyn FrameReceiver>,
}

impl ResponseListener {
    pub fn new(
        correlator: Arc<dyn CorrelationApi<Value>>,
        receiver: Arc<dyn FrameReceiver>,
    ) -> Self {
        Self {
            correlator,
            receiver,
        }
    }

    /// Run until the transport closes, then drain the correlator.
    pub async fn run(self) -> ListenerReport {
        let mut report = ListenerReport::default();
        loop {
            match self.receiver.receive().await {
                Ok(frame) => {
                    if self.handle_frame(frame).retired() {
                        report.routed += 1;
                    } else {
                        report.stale += 1;
                    }
                }
                Err(TransportError::Closed) => {
                    warn!("Response stream closed, stopping listener");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Error receiving response frame");
                }
            }
        }

        // Nothing can answer the remaining calls any more.
        report.drained = self.correlator.drain();
        report
    }

    fn handle_frame(&self, frame: ResponseFrame) -> Resolution {
        let id = frame.id;
        let resolution = match frame.into_result() {
            Ok(payload) => self.correlator.complete_call(id, payload),
            Err(fault) => self.correlator.fail_call(id, fault),
        };

        if resolution == Resolution::Stale {
            debug!(call_id = %id, "Response for unknown or expired call id");
        }
        resolution
    }
}
