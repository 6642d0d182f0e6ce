//! Column helpers behind the breakout signals.
//!
//! # Conventions
//!
//! - Output `Vec<Option<f64>>` has the same length as the input; positions
//!   inside the lookback period are `None`.
//! - A `None` input inside a window makes that window's output `None`
//!   (pandas `rolling(...).mean()` semantics with `min_periods == window`).

use crate::types::DailyBar;

/// Simple moving average over the trailing `period` values, current one included.
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = values.len();
    let mut out = vec![None; n];
    if n < period || period == 0 {
        return out;
    }

    let mut window_sum: f64 = values[..period].iter().sum();
    out[period - 1] = Some(window_sum / period as f64);

    for i in period..n {
        window_sum += values[i] - values[i - period];
        out[i] = Some(window_sum / period as f64);
    }
    out
}

/// Shift a column forward by `by` positions, filling the head with `None`.
///
/// `lag(x, 1)[t] == x[t - 1]`.
pub fn lag<T: Copy>(values: &[Option<T>], by: usize) -> Vec<Option<T>> {
    let n = values.len();
    let mut out = vec![None; n];
    for i in by..n {
        out[i] = values[i - by];
    }
    out
}

/// Same-day noise ratio: `1 - |open - close| / (high - low)`.
///
/// `None` for a zero-range bar.
pub fn noise_ratio(bar: &DailyBar) -> Option<f64> {
    let spread = bar.spread();
    if spread == 0.0 {
        return None;
    }
    let v = 1.0 - (bar.open - bar.close).abs() / spread;
    v.is_finite().then_some(v)
}

/// Half of the bar's high-low range.
#[inline]
pub fn half_range(bar: &DailyBar) -> f64 {
    bar.spread() * 0.5
}

/// Mean of the `period` values ending at index `end` (inclusive).
///
/// `None` when the window runs off the front of the column, when `end` is out
/// of bounds, or when any value in the window is undefined.
pub fn window_mean(values: &[Option<f64>], end: usize, period: usize) -> Option<f64> {
    if period == 0 || end >= values.len() || end + 1 < period {
        return None;
    }
    let window = &values[end + 1 - period..=end];
    let mut sum = 0.0;
    for v in window {
        sum += (*v)?;
    }
    Some(sum / period as f64)
}
