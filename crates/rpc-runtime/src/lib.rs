//! # Socket RPC Demo Runtime
//!
//! Wires one correlation session to the loopback transport and a scripted
//! peer, then drives a batch of calls through it.
//!
//! ## Flow
//!
//! ```text
//! RpcClient ──RequestFrame──▶ LoopbackSender ──▶ ScriptedPeer
//!     ▲                                              │
//!     │ handle resolves                              │ echo / fault / (silent)
//!     │                                              ▼
//! CallCorrelator ◀── ResponseListener ◀── LoopbackReceiver
//!     ▲
//!     └── TimeoutSweeper retires the silent calls
//! ```
//!
//! ## Startup Sequence
//!
//! 1. Load correlation config (env overrides, validated)
//! 2. Open the session (spawns the sweeper)
//! 3. Spawn the scripted peer and the response listener
//! 4. Run the call batch
//! 5. Shut down: close the transport, join the tasks, close the session

use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::future::join_all;
use rpc_correlation::adapters::loopback::{self, PeerReport, ScriptedPeer};
use rpc_correlation::{
    CallError, CorrelationConfig, ListenerReport, ResponseListener, RpcClient, Session,
    SessionReport, StatsSnapshot,
};
use rpc_telemetry::{log_call_event, log_session_event};
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::info;

/// Env var for the number of calls issued per scripted method
pub const ENV_DEMO_CALLS: &str = "RPC_DEMO_CALLS";

/// Env var for the scripted peer's answer latency, in milliseconds
pub const ENV_DEMO_LATENCY_MS: &str = "RPC_DEMO_LATENCY_MS";

/// Env var for the timeout given to calls the peer never answers
pub const ENV_DEMO_SILENT_TIMEOUT_MS: &str = "RPC_DEMO_SILENT_TIMEOUT_MS";

/// Demo runtime configuration
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub correlation: CorrelationConfig,
    /// Calls issued per method (`echo`, `fault`, `silent`)
    pub calls_per_method: usize,
    pub peer_latency: Duration,
    /// Per-call timeout for `silent` calls, so the demo does not wait out the
    /// default timeout
    pub silent_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            correlation: CorrelationConfig::default(),
            calls_per_method: 10,
            peer_latency: Duration::from_millis(20),
            silent_timeout: Duration::from_millis(250),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let correlation =
            CorrelationConfig::from_env().context("invalid correlation configuration")?;

        let calls_per_method = match env::var(ENV_DEMO_CALLS) {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("{} must be a count, got {:?}", ENV_DEMO_CALLS, raw))?,
            Err(_) => defaults.calls_per_method,
        };

        Ok(Self {
            correlation,
            calls_per_method,
            peer_latency: millis_var(ENV_DEMO_LATENCY_MS)?.unwrap_or(defaults.peer_latency),
            silent_timeout: millis_var(ENV_DEMO_SILENT_TIMEOUT_MS)?
                .unwrap_or(defaults.silent_timeout),
        })
    }
}

fn millis_var(var: &str) -> Result<Option<Duration>> {
    match env::var(var) {
        Ok(raw) => {
            let millis: u64 = raw
                .parse()
                .with_context(|| format!("{} must be milliseconds, got {:?}", var, raw))?;
            Ok(Some(Duration::from_millis(millis)))
        }
        Err(_) => Ok(None),
    }
}

/// Outcome counts for one batch of calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub completed: usize,
    pub faulted: usize,
    pub timed_out: usize,
    /// Cancelled, abandoned, rejected or unsent calls
    pub failed: usize,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.completed + self.faulted + self.timed_out + self.failed
    }

    fn record(&mut self, result: &Result<Value, CallError>) {
        match result {
            Ok(_) => self.completed += 1,
            Err(CallError::Remote(_)) => self.faulted += 1,
            Err(CallError::TimedOut { .. }) => self.timed_out += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// Everything joined at shutdown
#[derive(Debug, Clone, Copy)]
pub struct ShutdownReport {
    pub session: SessionReport,
    pub listener: ListenerReport,
    pub peer: PeerReport,
    pub stats: StatsSnapshot,
}

/// A running session with its transport tasks
pub struct DemoRuntime {
    config: RuntimeConfig,
    session: Session<Value>,
    client: RpcClient,
    peer: JoinHandle<PeerReport>,
    listener: JoinHandle<ListenerReport>,
}

impl DemoRuntime {
    /// Open the session and spawn the peer and listener tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: RuntimeConfig) -> Result<Self> {
        let session = Session::open(config.correlation.clone())
            .context("failed to open correlation session")?;

        let (sender, receiver, end) = loopback::channel(config.calls_per_method.max(1) * 3);
        let peer = ScriptedPeer::new(end)
            .with_latency(config.peer_latency)
            .spawn();
        let listener = tokio::spawn(ResponseListener::new(session.api(), Arc::new(receiver)).run());
        let client = RpcClient::new(session.api(), Arc::new(sender));

        log_session_event!(info, "Demo runtime started", session.id());
        Ok(Self {
            config,
            session,
            client,
            peer,
            listener,
        })
    }

    pub fn client(&self) -> &RpcClient {
        &self.client
    }

    pub fn session(&self) -> &Session<Value> {
        &self.session
    }

    /// Issue `calls_per_method` calls to each scripted method concurrently
    /// and wait for all of them.
    pub async fn run_batch(&self) -> BatchReport {
        let n = self.config.calls_per_method;
        let session_id = self.session.id();
        let mut calls = Vec::with_capacity(n * 3);

        for seq in 0..n {
            let client = self.client.clone();
            calls.push(tokio::spawn(async move {
                client.call("echo", json!({ "seq": seq })).await
            }));

            let client = self.client.clone();
            calls.push(tokio::spawn(async move {
                client.call("fault", json!(format!("rejected #{}", seq))).await
            }));

            let client = self.client.clone();
            let timeout = self.config.silent_timeout;
            calls.push(tokio::spawn(async move {
                client.call_with_timeout("silent", Value::Null, timeout).await
            }));
        }

        let mut report = BatchReport::default();
        for joined in join_all(calls).await {
            match joined {
                Ok(result) => {
                    if let Err(e) = &result {
                        if let Some(call_id) = e.call_id() {
                            log_call_event!(debug, "Call did not complete", session_id, call_id, error = %e);
                        }
                    }
                    report.record(&result);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Call task panicked");
                    report.failed += 1;
                }
            }
        }

        log_session_event!(
            info,
            "Call batch finished",
            session_id,
            completed = report.completed,
            faulted = report.faulted,
            timed_out = report.timed_out,
            failed = report.failed
        );
        report
    }

    /// Close the transport, join the peer and listener, close the session.
    pub async fn shutdown(self) -> Result<ShutdownReport> {
        let Self {
            session,
            client,
            peer,
            listener,
            ..
        } = self;

        // Dropping the only client closes the request stream; the peer then
        // finishes and the response stream closes behind it.
        drop(client);
        let peer = peer.await.context("scripted peer task failed")?;
        let listener = listener.await.context("response listener task failed")?;

        let stats = session.correlator().stats();
        let session = session.close().await;
        info!(
            routed = listener.routed,
            stale = listener.stale,
            cancelled = session.cancelled,
            "Demo runtime stopped"
        );

        Ok(ShutdownReport {
            session,
            listener,
            peer,
            stats,
        })
    }
}
