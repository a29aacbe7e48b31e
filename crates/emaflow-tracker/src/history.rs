//! Bounded crossover history.

use emaflow_core::CrossoverEvent;
use std::collections::VecDeque;

/// Number of most recent crossovers retained per symbol.
pub const MAX_CROSSOVERS: usize = 3;

/// FIFO of the most recent crossovers, oldest evicted first.
#[derive(Debug, Clone, Default)]
pub struct CrossoverHistory {
    events: VecDeque<CrossoverEvent>,
}

impl CrossoverHistory {
    pub fn new() -> Self {
        Self {
            events: VecDeque::with_capacity(MAX_CROSSOVERS + 1),
        }
    }

    /// Append a crossover, evicting the oldest when over capacity.
    pub fn push(&mut self, event: CrossoverEvent) {
        self.events.push_back(event);
        while self.events.len() > MAX_CROSSOVERS {
            self.events.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Oldest-first iterator.
    pub fn iter(&self) -> impl Iterator<Item = &CrossoverEvent> {
        self.events.iter()
    }

    /// Oldest-first copy of the history (not drained).
    pub fn to_vec(&self) -> Vec<CrossoverEvent> {
        self.events.iter().cloned().collect()
    }
}
