//! Per-symbol tumbling-window state machine.
//!
//! A tracker is always in exactly one open window anchored at
//! `window_start`. Events inside the open window only replace the
//! window's representative event; an event landing in a later window
//! closes the open one, advances both EMAs and checks for a crossover.

use crate::config::{TrackerConfig, WindowGapPolicy};
use crate::ema::{detect_crossover, ema};
use crate::history::CrossoverHistory;
use emaflow_core::{CrossoverEvent, Event, Indicator, SignalType};
use tracing::trace;

/// What a single `eval_event` call did to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalOutcome {
    /// Event belongs to the open window.
    Updated,
    /// Event predates the open window and was ignored.
    Late,
    /// Event opened a later window after closing `windows` windows.
    Closed { windows: u64, buys: u32, sells: u32 },
}

/// Windowed EMA and crossover state for one symbol.
#[derive(Debug, Clone)]
pub struct Tracker {
    symbol: String,
    config: TrackerConfig,
    /// Start (seconds) of the open window.
    window_start: i64,
    ema_fast: f64,
    ema_slow: f64,
    /// Most recent event of the open window.
    latest_event: Option<Event>,
    crossovers: CrossoverHistory,
    closed_windows: u64,
    /// Set once a window closes with a traded price behind it.
    has_priced_close: bool,
    late_events: u64,
}

impl Tracker {
    /// Create a tracker whose windows are anchored at `reference_secs`.
    pub fn new(symbol: impl Into<String>, reference_secs: i64, config: TrackerConfig) -> Self {
        Self {
            symbol: symbol.into(),
            config,
            window_start: reference_secs,
            ema_fast: 0.0,
            ema_slow: 0.0,
            latest_event: None,
            crossovers: CrossoverHistory::new(),
            closed_windows: 0,
            has_priced_close: false,
            late_events: 0,
        }
    }

    /// Feed the next event for this symbol.
    pub fn eval_event(&mut self, event: Event) -> EvalOutcome {
        let offset = event.last_trade.seconds - self.window_start;
        let index = offset.div_euclid(self.config.window_secs);

        if index < 0 {
            self.late_events += 1;
            trace!(
                symbol = %self.symbol,
                ts = %event.last_trade,
                window_start = self.window_start,
                "Late event ignored"
            );
            return EvalOutcome::Late;
        }

        if index == 0 {
            self.observe(event);
            return EvalOutcome::Updated;
        }

        let closes = match self.config.gap_policy {
            WindowGapPolicy::CloseOnce => 1,
            WindowGapPolicy::ReplayStale => index,
        };

        // Empty closes on a tracker that never saw a price keep both EMAs at
        // zero, so one pass stands in for the whole run.
        let passes = if self.latest_event.is_none() { 1 } else { closes };

        let (mut buys, mut sells) = (0u32, 0u32);
        for _ in 0..passes {
            match self.close_window() {
                Some(SignalType::Buy) => buys += 1,
                Some(SignalType::Sell) => sells += 1,
                None => {}
            }
        }
        self.closed_windows += (closes - passes) as u64;

        self.window_start += index * self.config.window_secs;
        self.latest_event = Some(event);

        EvalOutcome::Closed {
            windows: closes as u64,
            buys,
            sells,
        }
    }

    /// Last-write-wins by trade time inside the open window.
    fn observe(&mut self, event: Event) {
        match &self.latest_event {
            Some(held) if event.last_trade < held.last_trade => {}
            _ => self.latest_event = Some(event),
        }
    }

    /// Close the open window using its representative price (0 if none).
    fn close_window(&mut self) -> Option<SignalType> {
        let price = self
            .latest_event
            .as_ref()
            .map_or(0.0, |e| e.last_trade_price);

        let cur_fast = ema(price, self.ema_fast, self.config.fast_period);
        let cur_slow = ema(price, self.ema_slow, self.config.slow_period);

        // The first priced close has no prior relative order to compare against.
        let signal = if !self.has_priced_close {
            None
        } else {
            detect_crossover(self.ema_fast, self.ema_slow, cur_fast, cur_slow)
        };

        let emitted = match (signal, &self.latest_event) {
            (Some(signal_type), Some(latest)) => {
                self.crossovers.push(CrossoverEvent {
                    ts: latest.last_trade,
                    symbol: latest.symbol.clone(),
                    security_type: latest.security_type,
                    signal_type,
                });
                Some(signal_type)
            }
            _ => None,
        };

        trace!(
            symbol = %self.symbol,
            price,
            cur_fast,
            cur_slow,
            signal = ?emitted,
            "Window closed"
        );

        self.ema_fast = cur_fast;
        self.ema_slow = cur_slow;
        self.closed_windows += 1;
        self.has_priced_close |= self.latest_event.is_some();

        emitted
    }

    /// Current indicator snapshot.
    pub fn indicator(&self) -> Indicator {
        Indicator {
            symbol: self.symbol.clone(),
            ema_fast: self.ema_fast,
            ema_slow: self.ema_slow,
        }
    }

    /// Indicator plus the retained crossovers. The history is not cleared,
    /// so crossovers repeat across batches until evicted.
    pub fn results(&self) -> (Indicator, Vec<CrossoverEvent>) {
        (self.indicator(), self.crossovers.to_vec())
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn window_start(&self) -> i64 {
        self.window_start
    }

    pub fn latest_event(&self) -> Option<&Event> {
        self.latest_event.as_ref()
    }

    pub fn crossovers(&self) -> &CrossoverHistory {
        &self.crossovers
    }

    pub fn closed_windows(&self) -> u64 {
        self.closed_windows
    }

    pub fn late_events(&self) -> u64 {
        self.late_events
    }
}
