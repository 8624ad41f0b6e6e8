//! Request and response frames exchanged with the peer.
//!
//! Only the fields the correlation layer needs: the call id plus an opaque
//! JSON payload. Framing and socket I/O live in the transport.

use crate::domain::{CallId, RemoteFault};
use crate::error::TransportError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outgoing call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub id: CallId,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl RequestFrame {
    pub fn new(id: CallId, method: impl Into<String>, params: Value) -> Self {
        Self {
            id,
            method: method.into(),
            params,
        }
    }
}

/// Whether the peer handled the call or rejected it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Ok,
    Fault,
}

/// Decoded response for one call id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub id: CallId,
    pub status: ResponseStatus,
    #[serde(default)]
    pub payload: Value,
}

impl ResponseFrame {
    pub fn ok(id: CallId, payload: Value) -> Self {
        Self {
            id,
            status: ResponseStatus::Ok,
            payload,
        }
    }

    pub fn fault(id: CallId, fault: &RemoteFault) -> Self {
        Self {
            id,
            status: ResponseStatus::Fault,
            payload: serde_json::to_value(fault).unwrap_or(Value::Null),
        }
    }

    /// Payload of a successful response, or the peer's fault
    pub fn into_result(self) -> Result<Value, RemoteFault> {
        match self.status {
            ResponseStatus::Ok => Ok(self.payload),
            ResponseStatus::Fault => Err(RemoteFault::from_payload(self.payload)),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, TransportError> {
        serde_json::from_str(raw).map_err(|e| TransportError::Malformed(e.to_string()))
    }
}
