//! Transport plumbing around the correlation core.
//!
//! - `client`: issue a call, send its frame, await the outcome
//! - `listener`: route response frames back to waiting callers
//! - `loopback`: in-memory transport and scripted peer

pub mod client;
pub mod listener;
pub mod loopback;

pub use client::RpcClient;
pub use listener::{ListenerReport, ResponseListener};
pub use loopback::{LoopbackReceiver, LoopbackSender, PeerEnd, PeerReport, ScriptedPeer};
