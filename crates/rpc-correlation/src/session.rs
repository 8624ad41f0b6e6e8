//! Connection-scoped correlation state.
//!
//! A [`Session`] owns one correlator and its sweeper task. Open it when a
//! connection is established and close it on teardown; callers still waiting
//! at that point observe `CallError::Cancelled`.

use crate::domain::{CorrelationConfig, SessionId};
use crate::error::ConfigError;
use crate::ports::CorrelationApi;
use crate::service::{CallCorrelator, SweepReport, SweeperHandle};
use std::sync::Arc;
use tracing::{info, warn};

/// What happened when a session was closed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionReport {
    /// Calls cancelled by the teardown drain
    pub cancelled: usize,
    /// Final sweeper totals
    pub sweep: SweepReport,
}

/// One connection's correlator plus its timeout sweeper
pub struct Session<T>
where
    T: Send + 'static,
{
    correlator: Arc<CallCorrelator<T>>,
    sweeper: Option<SweeperHandle>,
}

impl<T> Session<T>
where
    T: Send + 'static,
{
    /// Open a session and start its sweeper.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(config: CorrelationConfig) -> Result<Self, ConfigError> {
        let correlator = Arc::new(CallCorrelator::new(config)?);
        let sweeper = correlator.spawn_sweeper();
        info!(
            session_id = %correlator.session(),
            timeout_ms = correlator.default_timeout().as_millis() as u64,
            sweep_interval_ms = correlator.sweep_interval().as_millis() as u64,
            "Correlation session opened"
        );
        Ok(Self {
            correlator,
            sweeper: Some(sweeper),
        })
    }

    pub fn id(&self) -> SessionId {
        self.correlator.session()
    }

    pub fn correlator(&self) -> &Arc<CallCorrelator<T>> {
        &self.correlator
    }

    /// The correlator behind the driving port, for the client and listener
    pub fn api(&self) -> Arc<dyn CorrelationApi<T>> {
        self.correlator.clone()
    }

    /// Drain outstanding calls and stop the sweeper.
    pub async fn close(mut self) -> SessionReport {
        let cancelled = self.correlator.drain();
        let sweep = match self.sweeper.take() {
            Some(sweeper) => sweeper.stop().await,
            None => SweepReport::default(),
        };
        info!(
            session_id = %self.id(),
            cancelled = cancelled,
            expired = sweep.expired,
            "Correlation session closed"
        );
        SessionReport { cancelled, sweep }
    }
}

impl<T> Drop for Session<T>
where
    T: Send + 'static,
{
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            let cancelled = self.correlator.drain();
            sweeper.signal_stop();
            warn!(
                session_id = %self.id(),
                cancelled = cancelled,
                "Correlation session dropped without close"
            );
        }
    }
}

impl<T> std::fmt::Debug for Session<T>
where
    T: Send + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id())
            .field("correlator", &self.correlator)
            .field("sweeper_running", &self.sweeper.is_some())
            .finish()
    }
}
