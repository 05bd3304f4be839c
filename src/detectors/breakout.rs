//! Breakout detector
//!
//! The last close breaks above the highest close of the preceding lookback window while its
//! volume exceeds the window's average volume.

use std::collections::HashMap;

use super::helpers::{highest_close, mean_volume, round_to, BREAKOUT_LOOKBACK};
use crate::{
    params::{check_param_names, get_period, ParamMeta, ParameterizedDetector},
    PatternDetector, PatternMatch, Period, Result, SignalExtra, SignalKind, OHLCV,
};

impl_with_defaults!(BreakoutDetector);

// ============================================================
// BREAKOUT
// ============================================================

/// Buy on breakout above the prior `lookback`-bar closing high with volume confirmation
#[derive(Debug, Clone)]
pub struct BreakoutDetector {
    /// Bars preceding the current bar that form the reference window
    pub lookback: Period,
}

impl Default for BreakoutDetector {
    fn default() -> Self {
        Self {
            lookback: Period::new_const(BREAKOUT_LOOKBACK),
        }
    }
}

impl PatternDetector for BreakoutDetector {
    fn id(&self) -> SignalKind {
        SignalKind::BreakoutBuy
    }

    /// One bar more than the window itself is required before a series is considered.
    fn min_bars(&self) -> usize {
        self.lookback.get() + 2
    }

    fn window(&self) -> usize {
        self.lookback.get() + 1
    }

    fn detect<T: OHLCV>(&self, bars: &[T]) -> Option<PatternMatch> {
        if bars.len() < self.min_bars() {
            return None;
        }
        let (current, lookback) = bars[bars.len() - self.window()..].split_last()?;

        let prev_high = highest_close(lookback)?;
        let avg_volume = mean_volume(lookback)?;

        let current_close = current.close();
        let current_volume = current.volume();

        // Written positively so a NaN close or volume never matches
        if !(current_close > prev_high && current_volume > avg_volume) {
            return None;
        }

        // avg_volume can only be zero here when the whole lookback traded nothing
        let vol_ratio = if avg_volume > 0.0 {
            round_to(current_volume / avg_volume, 2)
        } else {
            f64::INFINITY
        };

        Some(PatternMatch {
            kind: PatternDetector::id(self),
            close: current_close,
            volume: current_volume,
            extra: SignalExtra::Breakout {
                prev_high,
                avg_volume,
                vol_ratio,
            },
        })
    }
}

static BREAKOUT_PARAMS: &[ParamMeta] = &[ParamMeta::period(
    "lookback",
    BREAKOUT_LOOKBACK as f64,
    (2.0, 200.0),
    "Bars before the current bar used for the closing high and average volume",
)];

impl ParameterizedDetector for BreakoutDetector {
    fn param_meta() -> &'static [ParamMeta] {
        BREAKOUT_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        check_param_names(params, BREAKOUT_PARAMS)?;
        Ok(Self {
            lookback: get_period(params, "lookback", BREAKOUT_LOOKBACK)?,
        })
    }

    fn pattern_id_str() -> &'static str {
        SignalKind::BreakoutBuy.label()
    }
}
