//! Concurrent services built on the domain types.

pub mod correlator;
pub mod sweeper;
pub mod table;

pub use correlator::CallCorrelator;
pub use sweeper::{SweepReport, SweeperHandle, TimeoutSweeper};
pub use table::PendingCallTable;
