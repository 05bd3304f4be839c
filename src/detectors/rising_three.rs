//! Rising Three Methods detector (bullish continuation, 5 bars)
//!
//! 1. First candle: large bullish candle.
//! 2. Candles 2-4: small candles whose open and close stay inside the first candle's body.
//! 3. Fifth candle: large bullish candle closing above the first candle's close.

use std::collections::HashMap;

use super::helpers::{body_inside, is_large_body, LARGE_BODY_RATIO, SMALL_BODY_RATIO};
use crate::{
    params::{check_param_names, get_ratio, ParamMeta, ParameterizedDetector},
    OHLCVExt, PatternDetector, PatternMatch, Ratio, Result, SignalExtra, SignalKind, OHLCV,
};

impl_with_defaults!(RisingThreeMethodsDetector);

// ============================================================
// RISING THREE METHODS
// ============================================================

#[derive(Debug, Clone)]
pub struct RisingThreeMethodsDetector {
    /// Minimum body/range ratio for the first and fifth candles
    pub large_body_ratio: Ratio,
    /// Maximum body ratio of candles 2-4 relative to the first candle's body
    pub small_body_ratio: Ratio,
}

impl Default for RisingThreeMethodsDetector {
    fn default() -> Self {
        Self {
            large_body_ratio: Ratio::new_const(LARGE_BODY_RATIO),
            small_body_ratio: Ratio::new_const(SMALL_BODY_RATIO),
        }
    }
}

impl PatternDetector for RisingThreeMethodsDetector {
    fn id(&self) -> SignalKind {
        SignalKind::RisingThreeMethods
    }

    fn min_bars(&self) -> usize {
        5
    }

    fn detect<T: OHLCV>(&self, bars: &[T]) -> Option<PatternMatch> {
        if bars.len() < self.min_bars() {
            return None;
        }
        let [c1, c2, c3, c4, c5] = &bars[bars.len() - 5..] else {
            return None;
        };

        // First candle: large bullish
        if !c1.is_bullish() {
            return None;
        }
        let c1_body = c1.body();
        let c1_range = c1.range();
        if c1_range == 0.0 {
            return None;
        }
        if c1_body / c1_range < self.large_body_ratio.get() {
            return None;
        }

        // Candles 2-4: small, contained in the first candle's body
        let (c1_open, c1_close) = (c1.open(), c1.close());
        for cx in [c2, c3, c4] {
            if !body_inside(cx, c1_open, c1_close) {
                return None;
            }
            if c1_body > 0.0 && cx.body() / c1_body > self.small_body_ratio.get() {
                return None;
            }
        }

        // Fifth candle: bullish; the size check is skipped for a zero-range bar, unlike c1
        if !c5.is_bullish() {
            return None;
        }
        if c5.range() > 0.0 && !is_large_body(c5, self.large_body_ratio.get()) {
            return None;
        }
        if c5.close() <= c1_close {
            return None;
        }

        Some(PatternMatch {
            kind: PatternDetector::id(self),
            close: c5.close(),
            volume: c5.volume(),
            extra: SignalExtra::RisingThree {
                c1_close,
                c5_close: c5.close(),
            },
        })
    }
}

static RISING_THREE_METHODS_PARAMS: &[ParamMeta] = &[
    ParamMeta::ratio(
        "large_body_ratio",
        LARGE_BODY_RATIO,
        (0.3, 0.9),
        "Minimum body/range ratio of the first and fifth candles",
    ),
    ParamMeta::ratio(
        "small_body_ratio",
        SMALL_BODY_RATIO,
        (0.1, 0.9),
        "Maximum body of candles 2-4 relative to the first candle's body",
    ),
];

impl ParameterizedDetector for RisingThreeMethodsDetector {
    fn param_meta() -> &'static [ParamMeta] {
        RISING_THREE_METHODS_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        check_param_names(params, RISING_THREE_METHODS_PARAMS)?;
        Ok(Self {
            large_body_ratio: get_ratio(params, "large_body_ratio", LARGE_BODY_RATIO)?,
            small_body_ratio: get_ratio(params, "small_body_ratio", SMALL_BODY_RATIO)?,
        })
    }

    fn pattern_id_str() -> &'static str {
        SignalKind::RisingThreeMethods.label()
    }
}
