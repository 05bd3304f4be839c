//! Parameter metadata for screening detectors
//!
//! Detector thresholds can be overridden by name, e.g. from `--param lookback=30` on the
//! command line. This module describes the available parameters and validates overrides.
//!
//! # Example
//!
//! ```rust
//! use spot_screener::params::{ParamMeta, ParamType, ParameterizedDetector};
//! use spot_screener::prelude::*;
//!
//! for param in RisingThreeMethodsDetector::param_meta() {
//!     println!("{}: {:?} (default: {})", param.name, param.param_type, param.default);
//! }
//! ```

use std::collections::HashMap;

use crate::{Period, Ratio, Result, ScreenerError};

// ============================================================
// PARAMETER TYPES
// ============================================================

/// Type of parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
  /// Ratio value (0.0..=1.0)
  Ratio,
  /// Period value (positive integer)
  Period,
}

/// Metadata for a single detector parameter
#[derive(Debug, Clone)]
pub struct ParamMeta {
  /// Parameter name (e.g., "lookback")
  pub name: &'static str,
  /// Parameter type (Ratio or Period)
  pub param_type: ParamType,
  /// Default value
  pub default: f64,
  /// Accepted range: (min, max), inclusive
  pub range: (f64, f64),
  /// Human-readable description
  pub description: &'static str,
}

impl ParamMeta {
  /// Create a new ParamMeta for a Ratio parameter
  pub const fn ratio(
    name: &'static str,
    default: f64,
    range: (f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Ratio, default, range, description }
  }

  /// Create a new ParamMeta for a Period parameter
  pub const fn period(
    name: &'static str,
    default: f64,
    range: (f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Period, default, range, description }
  }

  /// Validate a value for this parameter
  pub fn validate(&self, value: f64) -> Result<()> {
    let (min, max) = self.range;
    if value.is_nan() || value < min || value > max {
      return Err(ScreenerError::OutOfRange { field: self.name, value, min, max });
    }
    match self.param_type {
      ParamType::Ratio => Ok(()),
      ParamType::Period => {
        if value < 1.0 || value.fract() != 0.0 {
          return Err(ScreenerError::InvalidValue("Period must be a positive integer"));
        }
        Ok(())
      },
    }
  }
}

// ============================================================
// PARAMETERIZED DETECTOR TRAIT
// ============================================================

/// Trait for detectors whose thresholds can be overridden by name
pub trait ParameterizedDetector: Sized {
  /// Returns metadata for all configurable parameters
  fn param_meta() -> &'static [ParamMeta];

  /// Creates a detector with parameters from a HashMap
  ///
  /// Missing parameters use their default values; unknown names are rejected.
  fn with_params(params: &HashMap<&str, f64>) -> Result<Self>;

  /// Returns the signal label of the detector
  fn pattern_id_str() -> &'static str;
}

// ============================================================
// PARAMETER VALUE HELPERS
// ============================================================

/// Helper to get a Ratio from params with default fallback
pub fn get_ratio(params: &HashMap<&str, f64>, key: &str, default: f64) -> Result<Ratio> {
  let value = params.get(key).copied().unwrap_or(default);
  Ratio::new(value)
}

/// Helper to get a Period from params with default fallback
pub fn get_period(params: &HashMap<&str, f64>, key: &str, default: usize) -> Result<Period> {
  let value = params.get(key).copied().unwrap_or(default as f64);
  if value < 0.0 || value.fract() != 0.0 {
    return Err(ScreenerError::InvalidValue("Period must be a positive integer"));
  }
  Period::new(value as usize)
}

/// Reject parameter names a detector does not know, and values outside their declared range
pub fn check_param_names(params: &HashMap<&str, f64>, meta: &[ParamMeta]) -> Result<()> {
  for (name, value) in params {
    let param = meta.iter().find(|m| m.name == *name).ok_or_else(|| {
      let known: Vec<&str> = meta.iter().map(|m| m.name).collect();
      ScreenerError::InvalidConfig(format!(
        "unknown parameter '{name}' (expected one of: {})",
        known.join(", ")
      ))
    })?;
    param.validate(*value)?;
  }
  Ok(())
}

/// Parse a `name=value` override as given on the command line
pub fn parse_param(raw: &str) -> Result<(String, f64)> {
  let (name, value) = raw
    .split_once('=')
    .ok_or_else(|| ScreenerError::InvalidConfig(format!("expected name=value, got '{raw}'")))?;
  let value = value
    .trim()
    .parse::<f64>()
    .map_err(|e| ScreenerError::InvalidConfig(format!("invalid value for '{name}': {e}")))?;
  Ok((name.trim().to_string(), value))
}

// ============================================================
// TESTS
// ============================================================
