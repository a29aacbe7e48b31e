//! Tracker configuration.

use crate::error::{TrackerError, TrackerResult};
use serde::{Deserialize, Serialize};

/// How a tracker closes windows when an event skips past more than one
/// window boundary with nothing observed in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowGapPolicy {
    /// Close the open window once with its last price, then jump the window
    /// start forward by the number of skipped windows.
    #[default]
    CloseOnce,
    /// Close every skipped window, reusing the last known price for each.
    /// EMAs decay towards the stale price during sparse periods.
    ReplayStale,
}

/// Configuration shared by every tracker of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Tumbling window length in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: i64,
    /// Fast EMA period (N in alpha = 2 / (N + 1)).
    #[serde(default = "default_fast_period")]
    pub fast_period: u32,
    /// Slow EMA period.
    #[serde(default = "default_slow_period")]
    pub slow_period: u32,
    #[serde(default)]
    pub gap_policy: WindowGapPolicy,
}

fn default_window_secs() -> i64 {
    300 // 5 minutes
}

fn default_fast_period() -> u32 {
    38
}

fn default_slow_period() -> u32 {
    100
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            fast_period: default_fast_period(),
            slow_period: default_slow_period(),
            gap_policy: WindowGapPolicy::default(),
        }
    }
}

impl TrackerConfig {
    /// Validate configuration values.
    ///
    /// Returns Err if:
    /// - window_secs <= 0
    /// - either period is 0
    /// - fast_period >= slow_period
    pub fn validate(&self) -> TrackerResult<()> {
        if self.window_secs <= 0 {
            return Err(TrackerError::ConfigError(format!(
                "window_secs ({}) must be positive",
                self.window_secs
            )));
        }

        if self.fast_period == 0 || self.slow_period == 0 {
            return Err(TrackerError::ConfigError(
                "EMA periods must be at least 1".to_string(),
            ));
        }

        if self.fast_period >= self.slow_period {
            return Err(TrackerError::ConfigError(format!(
                "fast_period ({}) must be less than slow_period ({})",
                self.fast_period, self.slow_period
            )));
        }

        Ok(())
    }
}
