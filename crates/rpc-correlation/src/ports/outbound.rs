//! Outbound Ports (Driven Ports)
//!
//! What the correlation layer needs from a transport: a way to push request
//! frames and a way to pull decoded response frames.

use async_trait::async_trait;

use crate::domain::{RequestFrame, ResponseFrame};
use crate::error::TransportError;

/// Sends request frames to the peer
#[async_trait]
pub trait FrameSender: Send + Sync {
    async fn send(&self, frame: RequestFrame) -> Result<(), TransportError>;
}

/// Receives decoded response frames from the peer
#[async_trait]
pub trait FrameReceiver: Send + Sync {
    /// Next response frame.
    ///
    /// Returns `TransportError::Closed` once the connection is gone; callers
    /// treat that as the end of the stream.
    async fn receive(&self) -> Result<ResponseFrame, TransportError>;
}
