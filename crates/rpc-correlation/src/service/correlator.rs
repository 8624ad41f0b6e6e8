//! Correlation facade.
//!
//! Thin layer over one [`PendingCallTable`]: allocates call ids, applies the
//! configured default timeout and exposes complete/fail/cancel by id. It does
//! no I/O; sending the request frame and decoding responses belong to the
//! transport.

use crate::domain::{
    timeout_from_millis, validate_timeout, CallId, CallOutcome, CorrelationConfig, PendingCall,
    PendingCallHandle, RemoteFault, Resolution, SessionId,
};
use crate::error::{ConfigError, CorrelationError};
use crate::metrics::StatsSnapshot;
use crate::service::{PendingCallTable, SweeperHandle, TimeoutSweeper};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Issues calls and routes their outcomes for one session.
pub struct CallCorrelator<T> {
    table: Arc<PendingCallTable<T>>,
    next_id: AtomicU64,
    default_timeout: RwLock<Duration>,
    sweep_interval: Duration,
}

impl<T> CallCorrelator<T> {
    /// Create a correlator with a fresh table
    pub fn new(config: CorrelationConfig) -> Result<Self, ConfigError> {
        Self::with_table(Arc::new(PendingCallTable::new()), config)
    }

    /// Create a correlator over an existing table
    pub fn with_table(
        table: Arc<PendingCallTable<T>>,
        config: CorrelationConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            table,
            next_id: AtomicU64::new(1),
            default_timeout: RwLock::new(config.default_timeout),
            sweep_interval: config.sweep_interval,
        })
    }

    /// Issue a call with the default timeout.
    ///
    /// The returned id goes into the request frame; the handle resolves once
    /// the call is completed, failed, timed out or cancelled.
    pub fn issue_call(&self) -> Result<(CallId, PendingCallHandle<T>), CorrelationError> {
        let timeout = self.default_timeout();
        self.register_new(timeout)
    }

    /// Issue a call with its own timeout
    pub fn issue_call_with_timeout(
        &self,
        timeout: Duration,
    ) -> Result<(CallId, PendingCallHandle<T>), CorrelationError> {
        validate_timeout(timeout)?;
        self.register_new(timeout)
    }

    fn register_new(&self, timeout: Duration) -> Result<(CallId, PendingCallHandle<T>), CorrelationError> {
        let id = CallId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (call, handle) = PendingCall::new(id, timeout);
        self.table.register(call)?;
        Ok((id, handle))
    }

    /// Deliver a successful response
    pub fn complete_call(&self, id: CallId, value: T) -> Resolution {
        self.table.resolve(id, CallOutcome::Completed(value))
    }

    /// Deliver a remote fault
    pub fn fail_call(&self, id: CallId, fault: RemoteFault) -> Resolution {
        self.table.resolve(id, CallOutcome::Faulted(fault))
    }

    /// Cancel one outstanding call
    pub fn cancel_call(&self, id: CallId) -> Resolution {
        self.table.cancel(id)
    }

    /// Cancel everything and reject later calls. Run on teardown.
    pub fn drain(&self) -> usize {
        self.table.drain()
    }

    /// Cancel everything but keep accepting calls
    pub fn cancel_all(&self) -> usize {
        self.table.cancel_all()
    }

    /// Replace the default timeout for calls issued from now on.
    ///
    /// Zero is rejected and the previous value stays in effect.
    pub fn configure_timeout(&self, timeout: Duration) -> Result<(), ConfigError> {
        if let Err(e) = validate_timeout(timeout) {
            warn!(session_id = %self.session(), "Rejected timeout configuration: {}", e);
            return Err(e);
        }
        *self.default_timeout.write() = timeout;
        info!(
            session_id = %self.session(),
            timeout_ms = timeout.as_millis() as u64,
            "Default call timeout updated"
        );
        Ok(())
    }

    /// Signed millisecond variant of [`configure_timeout`](Self::configure_timeout)
    pub fn configure_timeout_ms(&self, millis: i64) -> Result<(), ConfigError> {
        match timeout_from_millis(millis) {
            Ok(timeout) => self.configure_timeout(timeout),
            Err(e) => {
                warn!(session_id = %self.session(), millis = millis, "Rejected timeout configuration");
                Err(e)
            }
        }
    }

    pub fn default_timeout(&self) -> Duration {
        *self.default_timeout.read()
    }

    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    /// Outstanding calls
    pub fn pending_count(&self) -> usize {
        self.table.len()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.table.stats().snapshot()
    }

    pub fn table(&self) -> &Arc<PendingCallTable<T>> {
        &self.table
    }

    pub fn session(&self) -> SessionId {
        self.table.session()
    }
}

impl<T> CallCorrelator<T>
where
    T: Send + 'static,
{
    /// Start the timeout sweeper for this correlator's table
    pub fn spawn_sweeper(&self) -> SweeperHandle {
        debug!(session_id = %self.session(), "Spawning timeout sweeper");
        TimeoutSweeper::spawn(Arc::clone(&self.table), self.sweep_interval)
    }
}

impl<T> std::fmt::Debug for CallCorrelator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallCorrelator")
            .field("session", &self.session())
            .field("pending", &self.pending_count())
            .field("default_timeout", &self.default_timeout())
            .field("sweep_interval", &self.sweep_interval)
            .finish()
    }
}
