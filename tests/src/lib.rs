//! # socket-rpc Test Suite
//!
//! Cross-module tests for the correlation core.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── scenarios.rs       # Concurrency and timing properties of the table
//!     └── loopback_flows.rs  # Client, listener and peer over the loopback transport
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p rpc-tests
//!
//! # Benchmarks
//! cargo bench -p rpc-tests
//! ```

pub mod integration;
