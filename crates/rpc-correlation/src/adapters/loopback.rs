//! In-memory transport for tests and the demo runtime.
//!
//! [`channel`] returns the local ends (a [`FrameSender`] and a
//! [`FrameReceiver`]) plus the [`PeerEnd`] a fake peer reads requests from and
//! writes responses to. [`ScriptedPeer`] is such a fake with three methods:
//!
//! - `echo` answers with the request params
//! - `fault` answers with a server fault
//! - `silent` never answers, like a peer whose filter pipeline aborted the
//!   dispatch
//!
//! Any other method gets a method-not-found fault.

use crate::domain::{RemoteFault, RequestFrame, ResponseFrame};
use crate::error::TransportError;
use crate::ports::{FrameReceiver, FrameSender};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Local sending end
#[derive(Debug, Clone)]
pub struct LoopbackSender(mpsc::Sender<RequestFrame>);

/// Local receiving end
#[derive(Debug)]
pub struct LoopbackReceiver(Mutex<mpsc::Receiver<ResponseFrame>>);

/// The far side of a loopback channel
#[derive(Debug)]
pub struct PeerEnd {
    pub requests: mpsc::Receiver<RequestFrame>,
    pub responses: mpsc::Sender<ResponseFrame>,
}

#[async_trait]
impl FrameSender for LoopbackSender {
    async fn send(&self, frame: RequestFrame) -> Result<(), TransportError> {
        self.0.send(frame).await.map_err(|_| TransportError::Closed)
    }
}

#[async_trait]
impl FrameReceiver for LoopbackReceiver {
    async fn receive(&self) -> Result<ResponseFrame, TransportError> {
        let mut guard = self.0.lock().await;
        guard.recv().await.ok_or(TransportError::Closed)
    }
}

/// Create a loopback channel pair with `buffer` slots in each direction
pub fn channel(buffer: usize) -> (LoopbackSender, LoopbackReceiver, PeerEnd) {
    let (req_tx, req_rx) = mpsc::channel(buffer);
    let (resp_tx, resp_rx) = mpsc::channel(buffer);
    (
        LoopbackSender(req_tx),
        LoopbackReceiver(Mutex::new(resp_rx)),
        PeerEnd {
            requests: req_rx,
            responses: resp_tx,
        },
    )
}

/// What the scripted peer did before its request stream ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeerReport {
    pub answered: u64,
    pub faulted: u64,
    pub ignored: u64,
}

/// Fake peer answering requests from a fixed script
#[derive(Debug)]
pub struct ScriptedPeer {
    end: PeerEnd,
    latency: Duration,
}

impl ScriptedPeer {
    pub fn new(end: PeerEnd) -> Self {
        Self {
            end,
            latency: Duration::ZERO,
        }
    }

    /// Delay every answer by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn spawn(self) -> JoinHandle<PeerReport> {
        tokio::spawn(self.run())
    }

    /// Serve requests until the local sender is dropped.
    ///
    /// Answers are sent from their own tasks so a slow answer never holds up
    /// the next request. The response stream closes once the last answer is
    /// out.
    pub async fn run(self) -> PeerReport {
        let Self { mut end, latency } = self;
        let mut report = PeerReport::default();

        while let Some(request) = end.requests.recv().await {
            trace!(call_id = %request.id, method = %request.method, "Peer received request");
            let response = match request.method.as_str() {
                "echo" => {
                    report.answered += 1;
                    ResponseFrame::ok(request.id, request.params)
                }
                "fault" => {
                    report.faulted += 1;
                    let fault = RemoteFault::server_error(describe(&request.params));
                    ResponseFrame::fault(request.id, &fault)
                }
                "silent" => {
                    report.ignored += 1;
                    continue;
                }
                other => {
                    report.faulted += 1;
                    ResponseFrame::fault(request.id, &RemoteFault::method_not_found(other))
                }
            };

            let responses = end.responses.clone();
            tokio::spawn(async move {
                if !latency.is_zero() {
                    tokio::time::sleep(latency).await;
                }
                if responses.send(response).await.is_err() {
                    debug!("Peer response dropped, local receiver gone");
                }
            });
        }

        debug!(
            answered = report.answered,
            faulted = report.faulted,
            ignored = report.ignored,
            "Scripted peer finished"
        );
        report
    }
}

fn describe(params: &Value) -> String {
    match params {
        Value::String(s) => s.clone(),
        Value::Null => "fault requested".to_string(),
        other => other.to_string(),
    }
}
