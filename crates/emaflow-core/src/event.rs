//! Input stream types: tick events and the batches that carry them.

use crate::error::{CoreError, Result};
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Instrument class tag carried through to crossover events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityType {
    #[default]
    Equity,
    Index,
}

impl fmt::Display for SecurityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equity => write!(f, "equity"),
            Self::Index => write!(f, "index"),
        }
    }
}

impl FromStr for SecurityType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "equity" | "e" => Ok(Self::Equity),
            "index" | "i" => Ok(Self::Index),
            other => Err(CoreError::InvalidSecurityType(other.to_string())),
        }
    }
}

/// A single trade tick. Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub symbol: String,
    pub security_type: SecurityType,
    pub last_trade_price: f64,
    pub last_trade: Timestamp,
}

impl Event {
    pub fn new(
        symbol: impl Into<String>,
        security_type: SecurityType,
        last_trade_price: f64,
        last_trade: Timestamp,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            security_type,
            last_trade_price,
            last_trade,
        }
    }
}

/// One unit of the ordered input stream.
///
/// `seq_id` values are contiguous across a run. `lookup_symbols` names the
/// symbols a result must be produced for, which may include symbols that
/// have no event in this batch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Batch {
    pub seq_id: u64,
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub lookup_symbols: Vec<String>,
    #[serde(default)]
    pub is_last: bool,
}

impl Batch {
    pub fn new(seq_id: u64, events: Vec<Event>, lookup_symbols: Vec<String>) -> Self {
        Self {
            seq_id,
            events,
            lookup_symbols,
            is_last: false,
        }
    }

    /// Mark this batch as the final one of the stream.
    #[must_use]
    pub fn last(mut self) -> Self {
        self.is_last = true;
        self
    }

    /// Timestamp of the first event, if any.
    pub fn first_trade(&self) -> Option<Timestamp> {
        self.events.first().map(|e| e.last_trade)
    }

    /// Reject structurally unusable batches (empty symbols, non-finite prices).
    pub fn validate(&self) -> Result<()> {
        for event in &self.events {
            if event.symbol.is_empty() {
                return Err(CoreError::InvalidBatch(format!(
                    "batch {} has an event with an empty symbol",
                    self.seq_id
                )));
            }
            if !event.last_trade_price.is_finite() {
                return Err(CoreError::InvalidBatch(format!(
                    "batch {} has a non-finite price for {}",
                    self.seq_id, event.symbol
                )));
            }
            let ts = event.last_trade;
            if Timestamp::new(ts.seconds, ts.nanos).is_err() {
                return Err(CoreError::InvalidBatch(format!(
                    "batch {} has out-of-range nanos {} for {}",
                    self.seq_id, ts.nanos, event.symbol
                )));
            }
        }
        Ok(())
    }

    /// Parse a batch from one JSON line.
    pub fn from_json(line: &str) -> Result<Self> {
        let batch: Self = serde_json::from_str(line)?;
        batch.validate()?;
        Ok(batch)
    }
}
