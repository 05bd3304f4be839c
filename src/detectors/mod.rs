//! Screening pattern detectors
//!
//! Each detector is a pure function of the trailing window of a candle series.
//!
//! # Detectors
//!
//! - **Breakout** (22 bars): close above the prior 20-bar closing high on above-average volume.
//! - **Rising Three Methods** (5 bars): bullish continuation candlestick pattern.

pub mod helpers;

/// Generate `with_defaults()` -> `Self::default()` for multiple detector types.
macro_rules! impl_with_defaults {
  ($($detector:ty),* $(,)?) => {
    $(impl $detector {
      pub fn with_defaults() -> Self { Self::default() }
    })*
  };
}

pub mod breakout;
pub mod rising_three;

// Re-export all detectors for convenience
pub use breakout::*;
pub use helpers::*;
pub use rising_three::*;
