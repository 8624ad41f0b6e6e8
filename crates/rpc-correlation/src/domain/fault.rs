//! Remote fault payload.
//!
//! A fault is what the peer reports when it processed the request and
//! decided it failed. It travels in the response payload and is delivered to
//! the waiting caller unchanged; it is never a local error.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fault codes in the JSON-RPC 2.0 numbering
pub mod codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    /// Generic server-side failure
    pub const SERVER_ERROR: i32 = -32000;
    /// Authorization filter rejected the action
    pub const UNAUTHORIZED: i32 = -32010;
}

/// Fault reported by the remote peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteFault {
    /// Fault code
    pub code: i32,
    /// Human readable message
    pub message: String,
    /// Optional structured detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RemoteFault {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(code: i32, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", method),
        )
    }

    pub fn unauthorized(details: impl Into<String>) -> Self {
        Self::new(
            codes::UNAUTHORIZED,
            format!("Unauthorized: {}", details.into()),
        )
    }

    pub fn server_error(details: impl Into<String>) -> Self {
        Self::new(codes::SERVER_ERROR, details.into())
    }

    /// Interpret a fault payload.
    ///
    /// Peers that do not send a structured fault still produce a usable one:
    /// the raw payload becomes the message and is kept as `data`.
    pub fn from_payload(payload: serde_json::Value) -> Self {
        match serde_json::from_value::<RemoteFault>(payload.clone()) {
            Ok(fault) => fault,
            Err(_) => {
                let message = match &payload {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Self::with_data(codes::SERVER_ERROR, message, payload)
            }
        }
    }
}

impl fmt::Display for RemoteFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for RemoteFault {}
