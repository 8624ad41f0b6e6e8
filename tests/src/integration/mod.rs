//! Integration tests across the correlation layers.

pub mod loopback_flows;
pub mod scenarios;
