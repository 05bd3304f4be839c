//! Common helper functions for screening detectors
//!
//! Thresholds and window arithmetic shared across detector modules.

use crate::{OHLCVExt, OHLCV};

// ============================================================
// THRESHOLDS
// ============================================================

/// Number of bars preceding the current bar in the breakout lookback
pub const BREAKOUT_LOOKBACK: usize = 20;
/// Body/range ratio at or above which a candle counts as "large"
pub const LARGE_BODY_RATIO: f64 = 0.6;
/// Body ratio (vs. the first candle's body) at or below which a candle counts as "small"
pub const SMALL_BODY_RATIO: f64 = 0.5;

// ============================================================
// HELPER FUNCTIONS
// ============================================================

/// Highest close in `bars`. `None` for an empty slice.
#[inline]
pub fn highest_close<T: OHLCV>(bars: &[T]) -> Option<f64> {
    bars.iter().map(|b| b.close()).reduce(f64::max)
}

/// Arithmetic mean of volume over `bars`. `None` for an empty slice.
#[inline]
pub fn mean_volume<T: OHLCV>(bars: &[T]) -> Option<f64> {
    if bars.is_empty() {
        return None;
    }
    let sum: f64 = bars.iter().map(|b| b.volume()).sum();
    Some(sum / bars.len() as f64)
}

/// `low < value < high`
#[inline]
pub fn strictly_between(value: f64, low: f64, high: f64) -> bool {
    value > low && value < high
}

/// Both open and close of `bar` lie strictly inside `(low, high)`
#[inline]
pub fn body_inside<T: OHLCV>(bar: &T, low: f64, high: f64) -> bool {
    strictly_between(bar.close(), low, high) && strictly_between(bar.open(), low, high)
}

/// Body-to-range ratio meets `min_ratio`. A zero range never qualifies.
#[inline]
pub fn is_large_body<T: OHLCV>(bar: &T, min_ratio: f64) -> bool {
    let range = bar.range();
    range != 0.0 && bar.body() / range >= min_ratio
}

/// Round to `decimals` places, ties to even (`1.125` -> `1.12`)
#[inline]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}
