//! # Socket RPC Demo
//!
//! Runs one batch of echo, fault and silent calls over the loopback
//! transport and prints what happened to each of them.
//!
//! ## Environment
//!
//! - `RPC_CALL_TIMEOUT_MS`, `RPC_SWEEP_INTERVAL_MS`: correlation settings
//! - `RPC_DEMO_CALLS`, `RPC_DEMO_LATENCY_MS`, `RPC_DEMO_SILENT_TIMEOUT_MS`:
//!   batch shape
//! - `RPC_LOG_LEVEL`, `RPC_JSON_LOGS`, `RPC_CONSOLE_OUTPUT`: logging

use anyhow::{Context, Result};
use rpc_runtime::{DemoRuntime, RuntimeConfig};
use rpc_telemetry::{init_telemetry, TelemetryConfig};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let _telemetry = init_telemetry(TelemetryConfig::from_env())
        .context("failed to initialize telemetry")?;

    // Load configuration
    let config = RuntimeConfig::from_env()?;
    info!(
        timeout_ms = config.correlation.default_timeout.as_millis() as u64,
        sweep_interval_ms = config.correlation.sweep_interval.as_millis() as u64,
        calls_per_method = config.calls_per_method,
        "Starting socket RPC demo"
    );

    let runtime = DemoRuntime::start(config)?;
    let batch = runtime.run_batch().await;
    let report = runtime.shutdown().await?;

    info!(
        completed = batch.completed,
        faulted = batch.faulted,
        timed_out = batch.timed_out,
        failed = batch.failed,
        registered = report.stats.registered,
        stale = report.stats.stale,
        sweeper_passes = report.session.sweep.passes,
        "Demo finished"
    );

    if report.stats.in_flight() != 0 {
        warn!(in_flight = report.stats.in_flight(), "Calls left unresolved");
    }

    Ok(())
}
