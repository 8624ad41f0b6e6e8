//! Correlation configuration and validation
//!
//! # Example
//!
//! ```ignore
//! use rpc_correlation::CorrelationConfig;
//! use std::time::Duration;
//!
//! let config = CorrelationConfig::default()
//!     .with_default_timeout(Duration::from_secs(5))
//!     .with_sweep_interval(Duration::from_millis(20));
//! config.validate()?;
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Env var overriding the default call timeout, in milliseconds
pub const ENV_CALL_TIMEOUT_MS: &str = "RPC_CALL_TIMEOUT_MS";

/// Env var overriding the sweep interval, in milliseconds
pub const ENV_SWEEP_INTERVAL_MS: &str = "RPC_SWEEP_INTERVAL_MS";

/// Largest accepted spacing between sweeper passes
pub const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Correlation configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Timeout applied to calls issued without an explicit one
    #[serde(with = "humantime_serde")]
    pub default_timeout: Duration,
    /// Minimum spacing between two sweeper passes.
    ///
    /// A call that never gets a response is retired within
    /// `timeout + sweep_interval`.
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            sweep_interval: Duration::from_millis(10),
        }
    }
}

impl CorrelationConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_timeout(self.default_timeout)?;

        if self.sweep_interval.is_zero() {
            return Err(ConfigError::InvalidSweepInterval(
                "sweep_interval cannot be 0".into(),
            ));
        }
        if self.sweep_interval > MAX_SWEEP_INTERVAL {
            return Err(ConfigError::InvalidSweepInterval(format!(
                "sweep_interval cannot exceed {}s, got {:?}",
                MAX_SWEEP_INTERVAL.as_secs(),
                self.sweep_interval
            )));
        }

        Ok(())
    }

    /// Defaults overridden by the process environment.
    ///
    /// # Environment Variables
    ///
    /// - `RPC_CALL_TIMEOUT_MS`: default call timeout (default: 30000)
    /// - `RPC_SWEEP_INTERVAL_MS`: sweeper pass spacing (default: 10)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_CALL_TIMEOUT_MS) {
            config.default_timeout = parse_millis(ENV_CALL_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_SWEEP_INTERVAL_MS) {
            config.sweep_interval = parse_millis(ENV_SWEEP_INTERVAL_MS, &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Builder-style method to set the default timeout
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Builder-style method to set the sweep interval
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}

/// Reject non-positive timeouts
pub fn validate_timeout(timeout: Duration) -> Result<(), ConfigError> {
    if timeout.is_zero() {
        return Err(ConfigError::InvalidTimeout("timeout must be greater than 0".into()));
    }
    Ok(())
}

/// Convert a signed millisecond count into a timeout.
///
/// Wire-facing configuration often carries timeouts as signed integers;
/// zero and negative values are rejected here.
pub fn timeout_from_millis(millis: i64) -> Result<Duration, ConfigError> {
    if millis <= 0 {
        return Err(ConfigError::InvalidTimeout(format!(
            "timeout must be greater than 0, got {}ms",
            millis
        )));
    }
    Ok(Duration::from_millis(millis as u64))
}

fn parse_millis(var: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    let millis: i64 = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var,
        value: raw.to_string(),
    })?;
    timeout_from_millis(millis).map_err(|_| ConfigError::InvalidEnv {
        var,
        value: raw.to_string(),
    })
}
