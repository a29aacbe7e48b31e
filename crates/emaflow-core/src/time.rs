//! Trade timestamps.
//!
//! The upstream feed stamps every trade with whole seconds plus a
//! nanosecond fraction. Ordering is lexicographic on `(seconds, nanos)`.

use crate::error::{CoreError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

const NANOS_PER_SEC: i32 = 1_000_000_000;

/// Trade time as seconds since the Unix epoch plus nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    #[serde(default)]
    pub nanos: i32,
}

impl Timestamp {
    /// Create a timestamp, rejecting a nanosecond field outside `[0, 1e9)`.
    pub fn new(seconds: i64, nanos: i32) -> Result<Self> {
        if !(0..NANOS_PER_SEC).contains(&nanos) {
            return Err(CoreError::InvalidTimestamp(format!(
                "nanos out of range: {nanos}"
            )));
        }
        Ok(Self { seconds, nanos })
    }

    /// Whole-second timestamp.
    #[inline]
    pub const fn from_secs(seconds: i64) -> Self {
        Self { seconds, nanos: 0 }
    }

    /// Convert to a UTC datetime (for logging).
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.seconds, self.nanos as u32)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.9fZ")),
            None => write!(f, "{}.{:09}", self.seconds, self.nanos),
        }
    }
}
