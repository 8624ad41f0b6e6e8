//! Call-side adapter: issue, send, await.

use crate::domain::RequestFrame;
use crate::error::CallError;
use crate::ports::{CorrelationApi, FrameSender};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Issues calls over a frame transport
#[derive(Clone)]
pub struct RpcClient {
    correlator: Arc<dyn CorrelationApi<Value>>,
    sender: Arc<dyn FrameSender>,
}

impl RpcClient {
    pub fn new(correlator: Arc<dyn CorrelationApi<Value>>, sender: Arc<dyn FrameSender>) -> Self {
        Self { correlator, sender }
    }

    /// Call `method` with the default timeout
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, CallError> {
        self.dispatch(method, params, None).await
    }

    /// Call `method` with its own timeout
    pub async fn call_with_timeout(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, CallError> {
        self.dispatch(method, params, Some(timeout)).await
    }

    async fn dispatch(
        &self,
        method: &str,
        params: Value,
        timeout: Option<Duration>,
    ) -> Result<Value, CallError> {
        let (id, handle) = self.correlator.issue(timeout)?;

        if let Err(e) = self.sender.send(RequestFrame::new(id, method, params)).await {
            // The call was registered before sending; retire it here so it
            // does not linger until the sweeper times it out.
            self.correlator.cancel_call(id);
            warn!(call_id = %id, method = method, error = %e, "Request frame not sent");
            return Err(CallError::SendFailed {
                id,
                reason: e.to_string(),
            });
        }

        debug!(call_id = %id, method = method, "Sent request frame");
        handle.await
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient").finish_non_exhaustive()
    }
}
