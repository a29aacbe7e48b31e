//! EMA recurrence and crossover rule.

use emaflow_core::SignalType;

/// Smoothing factor `2 / (N + 1)`.
#[inline]
pub fn smoothing(period: u32) -> f64 {
    2.0 / (f64::from(period) + 1.0)
}

/// One EMA step: `price * a + prev * (1 - a)` with `a = 2 / (N + 1)`.
#[inline]
pub fn ema(price: f64, prev_ema: f64, period: u32) -> f64 {
    let alpha = smoothing(period);
    price * alpha + prev_ema * (1.0 - alpha)
}

/// Compare the fast/slow order before and after a window close.
///
/// - Buy: `prev_fast <= prev_slow` and `cur_fast > cur_slow`
/// - Sell: `prev_fast >= prev_slow` and `cur_fast < cur_slow`
pub fn detect_crossover(
    prev_fast: f64,
    prev_slow: f64,
    cur_fast: f64,
    cur_slow: f64,
) -> Option<SignalType> {
    if prev_fast <= prev_slow && cur_fast > cur_slow {
        Some(SignalType::Buy)
    } else if prev_fast >= prev_slow && cur_fast < cur_slow {
        Some(SignalType::Sell)
    } else {
        None
    }
}
