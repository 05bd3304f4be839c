//! Sequential symbol scanning
//!
//! Symbols are fetched and analysed one at a time. Each iteration yields an explicit
//! `Result`; failures are collected next to the signals instead of aborting the scan.

use tracing::{debug, info, warn};

use crate::{
    market::{FetchError, MarketData, Timeframe},
    BuiltinDetector, Result, ScreenerError, Signal, SignalExtra, SignalKind,
};

pub const DEFAULT_CANDLE_LIMIT: usize = 100;
pub const DEFAULT_QUOTE: &str = "USDT";

// ============================================================
// REQUEST
// ============================================================

/// One screening run, built from user input and read-only while scanning
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub strategy: BuiltinDetector,
    pub timeframe: Timeframe,
    /// Candles requested per symbol
    pub candle_limit: usize,
    /// Quote currency filter, e.g. `USDT`
    pub quote: String,
    /// Screen only the N most traded symbols
    pub top_n: Option<usize>,
}

impl ScanRequest {
    pub fn new(strategy: SignalKind, timeframe: Timeframe) -> Self {
        Self {
            strategy: BuiltinDetector::from_kind(strategy),
            timeframe,
            candle_limit: DEFAULT_CANDLE_LIMIT,
            quote: DEFAULT_QUOTE.to_string(),
            top_n: None,
        }
    }

    pub fn with_detector(mut self, detector: BuiltinDetector) -> Self {
        self.strategy = detector;
        self
    }

    pub fn candle_limit(mut self, limit: usize) -> Self {
        self.candle_limit = limit;
        self
    }

    pub fn quote(mut self, quote: impl Into<String>) -> Self {
        self.quote = quote.into().trim().to_ascii_uppercase();
        self
    }

    pub fn top_n(mut self, top_n: Option<usize>) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn kind(&self) -> SignalKind {
        self.strategy.id()
    }

    /// Reject requests that cannot produce a meaningful scan
    pub fn validate(&self) -> Result<()> {
        if self.candle_limit == 0 {
            return Err(ScreenerError::InvalidConfig(
                "candle limit must be > 0".to_string(),
            ));
        }
        if self.quote.is_empty() {
            return Err(ScreenerError::InvalidConfig(
                "quote currency must not be empty".to_string(),
            ));
        }
        if self.top_n == Some(0) {
            return Err(ScreenerError::InvalidConfig("top N must be > 0".to_string()));
        }
        self.strategy.validate_config()
    }
}

// ============================================================
// OUTCOMES
// ============================================================

/// What happened to a symbol that did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolOutcome {
    Matched(Signal),
    NoMatch,
    /// The market-data client returned no candles
    Empty,
}

/// Why a symbol was dropped from the scan
#[derive(Debug, Clone, thiserror::Error)]
pub enum SymbolError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("detection failed: {0}")]
    Detection(#[from] ScreenerError),
}

/// A symbol the scan skipped because of an error
#[derive(Debug, Clone)]
pub struct SymbolFailure {
    pub symbol: String,
    pub error: SymbolError,
}

/// Result of a whole scan: signals in discovery order plus every per-symbol failure
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub signals: Vec<Signal>,
    pub failures: Vec<SymbolFailure>,
    /// Symbols attempted
    pub scanned: usize,
    /// Symbols whose candle series came back empty
    pub empty: usize,
}

impl ScanReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

// ============================================================
// SCANNING
// ============================================================

/// Fetch one symbol's candles and run the detector over them
pub fn scan_symbol<M: MarketData>(
    market: &M,
    detector: &BuiltinDetector,
    symbol: &str,
    timeframe: Timeframe,
    candle_limit: usize,
) -> std::result::Result<SymbolOutcome, SymbolError> {
    let candles = market.fetch_candles(symbol, timeframe, candle_limit)?;
    if candles.is_empty() {
        return Ok(SymbolOutcome::Empty);
    }

    Ok(match detector.detect_checked(&candles)? {
        Some(found) => SymbolOutcome::Matched(found.into_signal(symbol)),
        None => SymbolOutcome::NoMatch,
    })
}

/// Scan `symbols` in order, isolating per-symbol failures
pub fn scan<M, S>(
    market: &M,
    detector: &BuiltinDetector,
    symbols: &[S],
    timeframe: Timeframe,
    candle_limit: usize,
) -> ScanReport
where
    M: MarketData,
    S: AsRef<str>,
{
    let total = symbols.len();
    let mut report = ScanReport::default();

    for (i, symbol) in symbols.iter().enumerate() {
        let symbol = symbol.as_ref();
        debug!(index = i + 1, total, %symbol, "checking symbol");
        report.scanned += 1;

        match scan_symbol(market, detector, symbol, timeframe, candle_limit) {
            Ok(SymbolOutcome::Matched(signal)) => {
                log_match(&signal);
                report.signals.push(signal);
            }
            Ok(SymbolOutcome::NoMatch) => {}
            Ok(SymbolOutcome::Empty) => report.empty += 1,
            Err(error) => {
                match &error {
                    SymbolError::Fetch(e) => {
                        warn!(%symbol, kind = e.kind(), "{} error for {symbol}: {e}", e.kind())
                    }
                    SymbolError::Detection(e) => warn!(%symbol, "skipping {symbol}: {e}"),
                }
                report.failures.push(SymbolFailure {
                    symbol: symbol.to_string(),
                    error,
                });
            }
        }
    }

    report
}

fn log_match(signal: &Signal) {
    match signal.extra {
        SignalExtra::Breakout { vol_ratio, .. } => info!(
            symbol = %signal.symbol,
            close = signal.close,
            vol_ratio,
            "MATCH: {} | Close: {:.4} | Vol Ratio: {vol_ratio}x",
            signal.symbol,
            signal.close
        ),
        SignalExtra::RisingThree { .. } => info!(
            symbol = %signal.symbol,
            close = signal.close,
            "MATCH: {} | Close: {:.4} | Signal: {}",
            signal.symbol,
            signal.close,
            signal.kind.label()
        ),
    }
}

/// Symbols to screen: the full sorted listing, or the `top_n` most traded.
///
/// Ranking uses 24h quote volume when the market-data source provides it and falls back
/// to the first `top_n` symbols of the listing otherwise.
pub fn select_symbols<M: MarketData>(
    market: &M,
    quote: &str,
    top_n: Option<usize>,
) -> Result<Vec<String>> {
    let listing_error = |source| ScreenerError::SymbolListing {
        quote: quote.to_string(),
        source,
    };

    let mut symbols = market.list_spot_symbols(quote).map_err(listing_error)?;
    info!("Found {} active {quote} spot pairs", symbols.len());

    let Some(top_n) = top_n else {
        return Ok(symbols);
    };

    match market.quote_volumes(quote) {
        Ok(Some(volumes)) => {
            // Stable sort keeps lexicographic order among equal volumes
            symbols.sort_by(|a, b| {
                let va = volumes.get(a).copied().unwrap_or(0.0);
                let vb = volumes.get(b).copied().unwrap_or(0.0);
                vb.total_cmp(&va)
            });
        }
        Ok(None) => debug!("volume ranking unavailable, keeping listing order"),
        Err(e) => warn!("volume ranking failed ({e}), keeping listing order"),
    }

    symbols.truncate(top_n);
    info!("Screening top {top_n} symbols");
    Ok(symbols)
}

/// Select symbols, scan them with the requested strategy and return the report
pub fn run_screener<M: MarketData>(market: &M, request: &ScanRequest) -> Result<ScanReport> {
    request.validate()?;

    if request.candle_limit < request.strategy.min_bars() {
        warn!(
            limit = request.candle_limit,
            required = request.strategy.min_bars(),
            "candle limit is below the strategy minimum; no symbol can match"
        );
    }

    let symbols = select_symbols(market, &request.quote, request.top_n)?;
    info!(
        "Running strategy: {} on {} symbols",
        request.kind(),
        symbols.len()
    );

    let report = scan(
        market,
        &request.strategy,
        symbols.as_slice(),
        request.timeframe,
        request.candle_limit,
    );

    info!(
        scanned = report.scanned,
        matches = report.signals.len(),
        failures = report.failures.len(),
        empty = report.empty,
        "scan complete"
    );
    Ok(report)
}
