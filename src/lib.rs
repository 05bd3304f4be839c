//! # spot-screener
//!
//! Screens crypto spot markets for breakout and candlestick continuation patterns.
//!
//! ## Quick Start
//!
//! ```rust
//! use spot_screener::prelude::*;
//!
//! // Twenty quiet candles followed by a close above the range on heavy volume
//! let mut bars: Vec<Candle> = (0..21)
//!     .map(|i| Candle::new(i, 10.0, 10.5, 9.5, 10.0, 5.0))
//!     .collect();
//! bars.push(Candle::new(21, 10.0, 11.2, 9.9, 11.0, 6.0));
//!
//! let detector = BuiltinDetector::from_kind(SignalKind::BreakoutBuy);
//! let found = detector.detect(&bars).expect("breakout");
//! assert_eq!(found.into_signal("BTC/USDT").symbol, "BTC/USDT");
//! ```

pub mod detectors;
pub mod logging;
pub mod market;
pub mod notify;
pub mod params;
pub mod report;
pub mod scanner;

pub mod prelude {
    pub use crate::{
        // Detectors
        detectors::*,
        // Market data
        market::{FetchError, MarketData, Timeframe},
        // Parameters
        params::{get_period, get_ratio, ParamMeta, ParamType, ParameterizedDetector},
        // Reporting
        report::{render, RenderedOutput},
        // Scanning
        scanner::{run_screener, scan, ScanReport, ScanRequest, SymbolFailure},
        // Dispatch
        BuiltinDetector,
        // Types
        Candle,
        OHLCVExt,
        PatternDetector,
        PatternMatch,
        Period,
        Ratio,
        Result,
        // Errors
        ScreenerError,
        Signal,
        SignalExtra,
        SignalKind,
        OHLCV,
    };
}

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, ScreenerError>;

/// Errors raised by the screener before or outside of a per-symbol fetch
#[derive(Debug, Clone, thiserror::Error)]
pub enum ScreenerError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("Invalid OHLCV at index {index}: {reason}")]
    InvalidOHLCV { index: usize, reason: &'static str },

    #[error("Failed to list {quote} spot symbols: {source}")]
    SymbolListing {
        quote: String,
        source: market::FetchError,
    },
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Normalized value in range 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    /// Create a new Ratio, validating the value is in [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(ScreenerError::InvalidValue(
                "Ratio cannot be NaN or infinite",
            ));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(ScreenerError::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

/// Period (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(ScreenerError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core OHLCV data trait
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;
}

/// Extension trait with computed properties for OHLCV data
pub trait OHLCVExt: OHLCV {
    /// `|close - open|`
    #[inline]
    fn body(&self) -> f64 {
        (self.close() - self.open()).abs()
    }

    /// `high - low`
    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    #[inline]
    fn is_bullish(&self) -> bool {
        self.close() > self.open()
    }

    /// Validate OHLCV data consistency
    fn validate(&self) -> Result<()> {
        let values = [
            self.open(),
            self.high(),
            self.low(),
            self.close(),
            self.volume(),
        ];
        if values.iter().any(|v| v.is_nan()) {
            return Err(ScreenerError::InvalidOHLCV {
                index: 0,
                reason: "NaN in OHLCV",
            });
        }
        if values.iter().any(|v| v.is_infinite()) {
            return Err(ScreenerError::InvalidOHLCV {
                index: 0,
                reason: "Infinite value in OHLCV",
            });
        }
        if self.high() < self.low() {
            return Err(ScreenerError::InvalidOHLCV {
                index: 0,
                reason: "high < low",
            });
        }
        if self.volume() < 0.0 {
            return Err(ScreenerError::InvalidOHLCV {
                index: 0,
                reason: "negative volume",
            });
        }
        Ok(())
    }
}

impl<T: OHLCV> OHLCVExt for T {}

/// Validate every bar in a window, reporting the offending index relative to the window
pub fn validate_bars<T: OHLCV>(bars: &[T]) -> Result<()> {
    for (i, bar) in bars.iter().enumerate() {
        bar.validate().map_err(|e| match e {
            ScreenerError::InvalidOHLCV { reason, .. } => {
                ScreenerError::InvalidOHLCV { index: i, reason }
            }
            other => other,
        })?;
    }
    Ok(())
}

// ============================================================
// CANDLE
// ============================================================

/// One OHLCV sample for a fixed time bucket, as delivered by a market-data client
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bucket open time, epoch milliseconds
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub const fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

impl OHLCV for Candle {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume
    }
}

// ============================================================
// SIGNALS
// ============================================================

/// Closed set of screening strategies, doubling as the kind of signal each one emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalKind {
    #[serde(rename = "BUY_ON_BREAKOUT")]
    BreakoutBuy,
    #[serde(rename = "RISING_3_METHODS")]
    RisingThreeMethods,
}

impl SignalKind {
    pub const ALL: [SignalKind; 2] = [SignalKind::BreakoutBuy, SignalKind::RisingThreeMethods];

    /// Strategy name accepted on the command line
    pub fn name(self) -> &'static str {
        match self {
            SignalKind::BreakoutBuy => "buyonbreakout",
            SignalKind::RisingThreeMethods => "rising3methods",
        }
    }

    /// Signal label printed next to each match
    pub fn label(self) -> &'static str {
        match self {
            SignalKind::BreakoutBuy => "BUY_ON_BREAKOUT",
            SignalKind::RisingThreeMethods => "RISING_3_METHODS",
        }
    }

    /// Human-readable strategy title
    pub fn title(self) -> &'static str {
        match self {
            SignalKind::BreakoutBuy => "Buy on Breakout 📈",
            SignalKind::RisingThreeMethods => "Rising Three Methods 🕯️",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            SignalKind::BreakoutBuy => "Breakout above 20-day high with volume confirmation",
            SignalKind::RisingThreeMethods => "Classic bullish continuation candlestick pattern",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            SignalKind::BreakoutBuy => "🚀",
            SignalKind::RisingThreeMethods => "📊",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SignalKind {
    type Err = ScreenerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buyonbreakout" | "breakout_20day" | "breakoutbuy" | "buy_on_breakout" => {
                Ok(SignalKind::BreakoutBuy)
            }
            "rising3methods" | "risingthreemethods" | "rising_3_methods" => {
                Ok(SignalKind::RisingThreeMethods)
            }
            _ => Err(ScreenerError::UnknownStrategy(s.to_string())),
        }
    }
}

/// Detector-specific figures attached to a match
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SignalExtra {
    Breakout {
        prev_high: f64,
        avg_volume: f64,
        vol_ratio: f64,
    },
    RisingThree {
        c1_close: f64,
        c5_close: f64,
    },
}

impl SignalExtra {
    /// Named numeric fields, in a stable order
    pub fn fields(&self) -> Vec<(&'static str, f64)> {
        match *self {
            SignalExtra::Breakout {
                prev_high,
                avg_volume,
                vol_ratio,
            } => vec![
                ("prev_high", prev_high),
                ("avg_volume", avg_volume),
                ("vol_ratio", vol_ratio),
            ],
            SignalExtra::RisingThree { c1_close, c5_close } => {
                vec![("c1_close", c1_close), ("c5_close", c5_close)]
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.fields()
            .into_iter()
            .find_map(|(key, value)| (key == name).then_some(value))
    }
}

/// Result of a successful detection over one candle series (Copy, no allocations).
///
/// Carries no symbol: the scanner attaches one with [`PatternMatch::into_signal`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternMatch {
    pub kind: SignalKind,
    /// Close of the last candle in the window
    pub close: f64,
    /// Volume of the last candle in the window
    pub volume: f64,
    pub extra: SignalExtra,
}

impl PatternMatch {
    pub fn into_signal(self, symbol: impl Into<String>) -> Signal {
        Signal {
            symbol: symbol.into(),
            kind: self.kind,
            close: self.close,
            volume: self.volume,
            extra: self.extra,
        }
    }
}

/// A detection attached to the symbol it was found on
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    pub symbol: String,
    #[serde(rename = "signal")]
    pub kind: SignalKind,
    pub close: f64,
    pub volume: f64,
    #[serde(flatten)]
    pub extra: SignalExtra,
}

// ============================================================
// PATTERN DETECTOR TRAIT
// ============================================================

/// Pure detector over the tail of a candle series
pub trait PatternDetector: Send + Sync {
    fn id(&self) -> SignalKind;

    /// Shortest series the detector will consider; anything shorter yields `None`
    fn min_bars(&self) -> usize;

    /// Number of trailing bars that influence the result
    fn window(&self) -> usize {
        self.min_bars()
    }

    fn detect<T: OHLCV>(&self, bars: &[T]) -> Option<PatternMatch>;

    fn validate_config(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================
// BUILTIN DETECTORS - generated via macro
// ============================================================

use detectors::*;

/// Macro to generate BuiltinDetector enum without boilerplate
macro_rules! define_builtin_detectors {
    (
        $(
            $variant:ident($detector:ty)
        ),* $(,)?
    ) => {
        /// All builtin detectors - one per [`SignalKind`], dispatched statically
        #[derive(Debug, Clone)]
        pub enum BuiltinDetector {
            $($variant($detector)),*
        }

        impl BuiltinDetector {
            /// Detector with default thresholds for the given strategy
            pub fn from_kind(kind: SignalKind) -> Self {
                match kind {
                    $(SignalKind::$variant => Self::$variant(<$detector>::default())),*
                }
            }

            #[inline]
            pub fn detect<T: OHLCV>(&self, bars: &[T]) -> Option<PatternMatch> {
                match self {
                    $(Self::$variant(d) => PatternDetector::detect(d, bars)),*
                }
            }

            #[inline]
            pub fn id(&self) -> SignalKind {
                match self {
                    $(Self::$variant(d) => PatternDetector::id(d)),*
                }
            }

            #[inline]
            pub fn min_bars(&self) -> usize {
                match self {
                    $(Self::$variant(d) => PatternDetector::min_bars(d)),*
                }
            }

            #[inline]
            pub fn window(&self) -> usize {
                match self {
                    $(Self::$variant(d) => PatternDetector::window(d)),*
                }
            }

            pub fn validate_config(&self) -> Result<()> {
                match self {
                    $(Self::$variant(d) => PatternDetector::validate_config(d)),*
                }
            }

            /// Build a detector for `kind` with named parameter overrides
            pub fn with_params(
                kind: SignalKind,
                params: &std::collections::HashMap<&str, f64>,
            ) -> Result<Self> {
                use crate::params::ParameterizedDetector;
                let detector = match kind {
                    $(SignalKind::$variant => Self::$variant(<$detector>::with_params(params)?)),*
                };
                detector.validate_config()?;
                Ok(detector)
            }

            /// Parameter metadata of the detector behind `kind`
            pub fn param_meta(kind: SignalKind) -> &'static [crate::params::ParamMeta] {
                use crate::params::ParameterizedDetector;
                match kind {
                    $(SignalKind::$variant => <$detector>::param_meta()),*
                }
            }
        }
    };
}

define_builtin_detectors! {
    BreakoutBuy(BreakoutDetector),
    RisingThreeMethods(RisingThreeMethodsDetector),
}

impl BuiltinDetector {
    /// Validate the bars that fall inside the detection window, then detect.
    ///
    /// A malformed candle inside the window is reported as an error instead of being
    /// fed to the detector.
    pub fn detect_checked<T: OHLCV>(&self, bars: &[T]) -> Result<Option<PatternMatch>> {
        if bars.len() < self.min_bars() {
            return Ok(None);
        }
        let start = bars.len() - self.window().min(bars.len());
        validate_bars(&bars[start..]).map_err(|e| match e {
            ScreenerError::InvalidOHLCV { index, reason } => ScreenerError::InvalidOHLCV {
                index: start + index,
                reason,
            },
            other => other,
        })?;
        Ok(self.detect(bars))
    }
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| Candle::new(i as i64, 10.0, 10.5, 9.5, 10.0, 5.0))
            .collect()
    }

    #[test]
    fn test_ratio_validation() {
        assert!(Ratio::new(0.0).is_ok());
        assert!(Ratio::new(1.0).is_ok());
        assert!(Ratio::new(0.6).is_ok());
        assert!(Ratio::new(-0.1).is_err());
        assert!(Ratio::new(1.1).is_err());
        assert!(Ratio::new(f64::NAN).is_err());
        assert!(Ratio::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_period_validation() {
        assert!(Period::new(1).is_ok());
        assert!(Period::new(20).is_ok());
        assert!(Period::new(0).is_err());
    }

    #[test]
    fn test_ohlcv_ext() {
        let bar = Candle::new(0, 100.0, 110.0, 90.0, 105.0, 1.0);
        assert_eq!(bar.body(), 5.0);
        assert_eq!(bar.range(), 20.0);
        assert!(bar.is_bullish());
        assert!(bar.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let bar = Candle::new(0, 100.0, 90.0, 110.0, 105.0, 1.0);
        assert!(matches!(
            bar.validate(),
            Err(ScreenerError::InvalidOHLCV {
                reason: "high < low",
                ..
            })
        ));
    }

    #[test]
    fn test_signal_kind_from_str() {
        assert_eq!(
            "buyonbreakout".parse::<SignalKind>().unwrap(),
            SignalKind::BreakoutBuy
        );
        assert_eq!(
            "breakout_20day".parse::<SignalKind>().unwrap(),
            SignalKind::BreakoutBuy
        );
        assert_eq!(
            "Rising3Methods".parse::<SignalKind>().unwrap(),
            SignalKind::RisingThreeMethods
        );
        assert!(matches!(
            "doji".parse::<SignalKind>(),
            Err(ScreenerError::UnknownStrategy(_))
        ));
    }

    #[test]
    fn test_signal_kind_name_round_trip() {
        for kind in SignalKind::ALL {
            assert_eq!(kind.name().parse::<SignalKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_from_kind_dispatch() {
        for kind in SignalKind::ALL {
            assert_eq!(BuiltinDetector::from_kind(kind).id(), kind);
        }
        assert_eq!(
            BuiltinDetector::from_kind(SignalKind::BreakoutBuy).min_bars(),
            22
        );
        assert_eq!(
            BuiltinDetector::from_kind(SignalKind::RisingThreeMethods).min_bars(),
            5
        );
    }

    #[test]
    fn test_detect_checked_reports_absolute_index() {
        let mut bars = flat(30);
        bars[28].close = f64::NAN;
        let detector = BuiltinDetector::from_kind(SignalKind::BreakoutBuy);
        match detector.detect_checked(&bars) {
            Err(ScreenerError::InvalidOHLCV { index, .. }) => assert_eq!(index, 28),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_detect_checked_ignores_bars_outside_window() {
        let mut bars = flat(30);
        bars[0].high = f64::NAN;
        let detector = BuiltinDetector::from_kind(SignalKind::BreakoutBuy);
        assert!(matches!(detector.detect_checked(&bars), Ok(None)));
    }

    #[test]
    fn test_signal_serializes_flat() {
        let signal = PatternMatch {
            kind: SignalKind::RisingThreeMethods,
            close: 115.0,
            volume: 42.0,
            extra: SignalExtra::RisingThree {
                c1_close: 110.0,
                c5_close: 115.0,
            },
        }
        .into_signal("ETH/USDT");

        let json = serde_json::to_value(&signal).unwrap();
        assert_eq!(json["symbol"], "ETH/USDT");
        assert_eq!(json["signal"], "RISING_3_METHODS");
        assert_eq!(json["c1_close"], 110.0);
        assert_eq!(json["c5_close"], 115.0);
    }

    #[test]
    fn test_extra_field_lookup() {
        let extra = SignalExtra::Breakout {
            prev_high: 10.0,
            avg_volume: 5.0,
            vol_ratio: 1.2,
        };
        assert_eq!(extra.get("vol_ratio"), Some(1.2));
        assert_eq!(extra.get("c1_close"), None);
    }
}
