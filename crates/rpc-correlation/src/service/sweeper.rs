//! Timeout sweeper.
//!
//! One background task per call table. It parks until the earliest
//! outstanding deadline and retires every call that is due in a single pass,
//! so nothing waits longer than `timeout + sweep_interval`.
//!
//! The sweeper never spins: with no pending calls it sleeps until a
//! registration wakes it. Passes are spaced at least `sweep_interval` apart,
//! trading timeout precision for fewer wakeups under load.

use crate::service::PendingCallTable;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info};

/// Totals for one sweeper run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Passes that found at least one deadline due
    pub passes: u64,
    /// Calls moved to the timeout outcome
    pub expired: u64,
    /// The task ended abnormally; the totals above are lost
    pub aborted: bool,
}

/// Background expiry loop for one [`PendingCallTable`]
pub struct TimeoutSweeper<T> {
    table: Arc<PendingCallTable<T>>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl<T> TimeoutSweeper<T>
where
    T: Send + 'static,
{
    pub fn new(
        table: Arc<PendingCallTable<T>>,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            table,
            interval,
            shutdown,
        }
    }

    /// Spawn the sweeper on the current tokio runtime.
    pub fn spawn(table: Arc<PendingCallTable<T>>, interval: Duration) -> SweeperHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let session = table.session();
        let sweeper = Self::new(table, interval, shutdown_rx);
        let join = tokio::spawn(sweeper.run());
        debug!(session_id = %session, interval_ms = interval.as_millis() as u64, "Timeout sweeper started");
        SweeperHandle {
            shutdown: shutdown_tx,
            join,
        }
    }

    /// Run until shutdown is signalled or the shutdown sender is dropped.
    pub async fn run(mut self) -> SweepReport {
        let mut report = SweepReport::default();
        let mut last_pass: Option<Instant> = None;

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let now = Instant::now();
            let due = self.table.next_deadline().is_some_and(|d| d <= now);
            let spaced = last_pass.map_or(true, |t| now >= self.next_pass_after(t));
            if due && spaced {
                let expired = self.table.expire_due(now);
                last_pass = Some(now);
                report.passes += 1;
                report.expired += expired as u64;
                if expired > 0 {
                    debug!(
                        session_id = %self.table.session(),
                        expired = expired,
                        "Sweep pass retired expired calls"
                    );
                }
            }

            let wake_at = self.table.next_deadline().map(|deadline| match last_pass {
                Some(t) => deadline.max(self.next_pass_after(t)),
                None => deadline,
            });

            tokio::select! {
                biased;
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = self.table.changed() => {}
                _ = sleep_until(wake_at.unwrap_or(now)), if wake_at.is_some() => {}
            }
        }

        debug!(
            session_id = %self.table.session(),
            passes = report.passes,
            expired = report.expired,
            "Timeout sweeper stopped"
        );
        report
    }

    /// Earliest instant the pass after one at `last` may run.
    ///
    /// An interval too large to represent puts no spacing on passes at all,
    /// so deadlines still drive the sweep.
    fn next_pass_after(&self, last: Instant) -> Instant {
        last.checked_add(self.interval).unwrap_or(last)
    }
}

/// Owner side of a spawned sweeper.
///
/// Dropping the handle also stops the sweeper: the shutdown sender goes away
/// and the loop exits on its next wakeup.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<SweepReport>,
}

impl SweeperHandle {
    /// Ask the sweeper to stop without waiting for it
    pub fn signal_stop(&self) {
        // Only fails when the task already exited.
        let _ = self.shutdown.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Stop the sweeper and wait for its final report
    pub async fn stop(self) -> SweepReport {
        self.signal_stop();
        match self.join.await {
            Ok(report) => {
                info!(passes = report.passes, expired = report.expired, "Timeout sweeper joined");
                report
            }
            Err(e) => {
                error!("Timeout sweeper task failed: {}", e);
                SweepReport {
                    aborted: true,
                    ..SweepReport::default()
                }
            }
        }
    }
}
