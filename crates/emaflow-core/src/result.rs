//! Output types: indicators, crossover signals and batch results.

use crate::event::SecurityType;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Snapshot of a symbol's fast/slow EMA as of its last closed window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    pub symbol: String,
    pub ema_fast: f64,
    pub ema_slow: f64,
}

/// Crossover direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    /// Fast EMA overtook the slow EMA.
    Buy,
    /// Fast EMA fell below the slow EMA.
    Sell,
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// A detected EMA crossover, stamped with the closing event of its window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossoverEvent {
    pub ts: Timestamp,
    pub symbol: String,
    pub security_type: SecurityType,
    pub signal_type: SignalType,
}

/// Result of one shard for one batch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PartialResult {
    pub batch_seq_id: u64,
    pub shard: usize,
    pub indicators: Vec<Indicator>,
    pub crossovers: Vec<CrossoverEvent>,
    pub is_last: bool,
}

/// Union of all shard results for one batch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CombinedResult {
    pub batch_seq_id: u64,
    pub indicators: Vec<Indicator>,
    pub crossovers: Vec<CrossoverEvent>,
}

impl CombinedResult {
    pub fn new(batch_seq_id: u64) -> Self {
        Self {
            batch_seq_id,
            ..Default::default()
        }
    }

    /// Append one shard's contribution.
    pub fn absorb(&mut self, partial: PartialResult) {
        self.indicators.extend(partial.indicators);
        self.crossovers.extend(partial.crossovers);
    }
}
