//! Market-data capability consumed by the scanner
//!
//! The scanner never talks to an exchange directly; it is handed something implementing
//! [`MarketData`]. [`okx::OkxClient`] is the production implementation.

use std::{collections::HashMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Candle, ScreenerError};

pub mod okx;

// ============================================================
// ERRORS
// ============================================================

/// Classified failure of a single market-data request
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    /// Transport failure, timeout, rate limiting or exchange unavailability
    #[error("network error: {0}")]
    Network(String),

    /// The exchange understood the request and refused it
    #[error("exchange rejected request (code={code}): {msg}")]
    ExchangeRejected { code: String, msg: String },

    #[error("unexpected error: {0}")]
    Unknown(String),
}

impl FetchError {
    /// Short classification used in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Network(_) => "network",
            FetchError::ExchangeRejected { .. } => "exchange",
            FetchError::Unknown(_) => "unknown",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) if status.as_u16() == 429 || status.is_server_error() => {
                FetchError::Network(error.to_string())
            }
            Some(status) => FetchError::ExchangeRejected {
                code: status.as_u16().to_string(),
                msg: error.to_string(),
            },
            None if error.is_decode() || error.is_builder() => {
                FetchError::Unknown(error.to_string())
            }
            None => FetchError::Network(error.to_string()),
        }
    }
}

// ============================================================
// TIMEFRAME
// ============================================================

/// Candle granularity, spelled the way the exchange spells it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "3m")]
    M3,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1H")]
    H1,
    #[serde(rename = "2H")]
    H2,
    #[serde(rename = "4H")]
    H4,
    #[serde(rename = "6H")]
    H6,
    #[serde(rename = "12H")]
    H12,
    #[serde(rename = "1D")]
    D1,
    #[serde(rename = "3D")]
    D3,
    #[serde(rename = "1W")]
    W1,
    #[serde(rename = "1M")]
    Mo1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 14] = [
        Timeframe::M1,
        Timeframe::M3,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H2,
        Timeframe::H4,
        Timeframe::H6,
        Timeframe::H12,
        Timeframe::D1,
        Timeframe::D3,
        Timeframe::W1,
        Timeframe::Mo1,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M3 => "3m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1H",
            Timeframe::H2 => "2H",
            Timeframe::H4 => "4H",
            Timeframe::H6 => "6H",
            Timeframe::H12 => "12H",
            Timeframe::D1 => "1D",
            Timeframe::D3 => "3D",
            Timeframe::W1 => "1W",
            Timeframe::Mo1 => "1M",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = ScreenerError;

    /// Case matters: `1m` is one minute, `1M` one month.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timeframe::ALL
            .into_iter()
            .find(|tf| tf.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = Timeframe::ALL.iter().map(|tf| tf.as_str()).collect();
                ScreenerError::InvalidConfig(format!(
                    "unsupported timeframe '{s}' (expected one of: {})",
                    valid.join(", ")
                ))
            })
    }
}

// ============================================================
// MARKET DATA CAPABILITY
// ============================================================

/// Source of symbols and candle series
pub trait MarketData {
    /// Distinct, active spot symbols (`BASE/QUOTE`) quoted in `quote`, sorted lexicographically
    fn list_spot_symbols(&self, quote: &str) -> Result<Vec<String>, FetchError>;

    /// Up to `limit` most recent candles for `symbol`, oldest first
    fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, FetchError>;

    /// 24h traded volume per symbol, denominated in `quote`.
    ///
    /// `None` when the source cannot rank symbols by volume.
    fn quote_volumes(&self, _quote: &str) -> Result<Option<HashMap<String, f64>>, FetchError> {
        Ok(None)
    }
}

impl<M: MarketData + ?Sized> MarketData for &M {
    fn list_spot_symbols(&self, quote: &str) -> Result<Vec<String>, FetchError> {
        (**self).list_spot_symbols(quote)
    }

    fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, FetchError> {
        (**self).fetch_candles(symbol, timeframe, limit)
    }

    fn quote_volumes(&self, quote: &str) -> Result<Option<HashMap<String, f64>>, FetchError> {
        (**self).quote_volumes(quote)
    }
}
