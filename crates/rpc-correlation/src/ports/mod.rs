//! Ports Layer
//!
//! - Driving port (inbound): the correlation API used by the client and the
//!   response listener
//! - Driven ports (outbound): the frame transport

pub mod inbound;
pub mod outbound;

pub use inbound::CorrelationApi;
pub use outbound::{FrameReceiver, FrameSender};
