//! Integration tests for symbol selection and sequential scanning against an in-memory market.

use std::{cell::RefCell, collections::HashMap};

use spot_screener::{
    market::{FetchError, MarketData, Timeframe},
    report::{render, NotificationBatch},
    scanner::{run_screener, scan, select_symbols, ScanRequest, SymbolError},
    BuiltinDetector, Candle, ScreenerError, Signal, SignalKind,
};

/// In-memory market: per-symbol candle series or a canned fetch error
#[derive(Default)]
struct MockMarket {
    symbols: Vec<String>,
    candles: HashMap<String, Result<Vec<Candle>, FetchError>>,
    volumes: Option<HashMap<String, f64>>,
    listing_error: Option<FetchError>,
    requested: RefCell<Vec<(String, Timeframe, usize)>>,
}

impl MockMarket {
    fn with(mut self, symbol: &str, candles: Result<Vec<Candle>, FetchError>) -> Self {
        self.symbols.push(symbol.to_string());
        self.candles.insert(symbol.to_string(), candles);
        self
    }
}

impl MarketData for MockMarket {
    fn list_spot_symbols(&self, _quote: &str) -> Result<Vec<String>, FetchError> {
        match &self.listing_error {
            Some(e) => Err(e.clone()),
            None => {
                let mut symbols = self.symbols.clone();
                symbols.sort();
                Ok(symbols)
            }
        }
    }

    fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, FetchError> {
        self.requested
            .borrow_mut()
            .push((symbol.to_string(), timeframe, limit));
        self.candles
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    fn quote_volumes(&self, _quote: &str) -> Result<Option<HashMap<String, f64>>, FetchError> {
        Ok(self.volumes.clone())
    }
}

fn breakout_bars() -> Vec<Candle> {
    let mut bars: Vec<Candle> = (0..21)
        .map(|i| Candle::new(i, 10.0, 10.2, 9.8, 10.0, 5.0))
        .collect();
    bars.push(Candle::new(21, 10.0, 11.0, 9.9, 11.0, 6.0));
    bars
}

fn quiet_bars() -> Vec<Candle> {
    (0..30)
        .map(|i| Candle::new(i, 10.0, 10.2, 9.8, 10.0, 5.0))
        .collect()
}

fn network_error() -> FetchError {
    FetchError::Network("connection reset".to_string())
}

fn symbols_of(signals: &[Signal]) -> Vec<&str> {
    signals.iter().map(|s| s.symbol.as_str()).collect()
}

#[test]
fn test_failed_symbol_does_not_abort_scan() {
    let market = MockMarket::default()
        .with("AAA/USDT", Ok(breakout_bars()))
        .with("BBB/USDT", Ok(quiet_bars()))
        .with("KKK/USDT", Err(network_error()))
        .with("MMM/USDT", Ok(breakout_bars()))
        .with("ZZZ/USDT", Ok(breakout_bars()));
    let request = ScanRequest::new(SignalKind::BreakoutBuy, Timeframe::H4);

    let report = run_screener(&market, &request).unwrap();

    assert_eq!(symbols_of(&report.signals), vec!["AAA/USDT", "MMM/USDT", "ZZZ/USDT"]);
    assert_eq!(report.scanned, 5);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].symbol, "KKK/USDT");
    assert!(matches!(
        report.failures[0].error,
        SymbolError::Fetch(FetchError::Network(_))
    ));
}

#[test]
fn test_scan_preserves_caller_order() {
    let market = MockMarket::default()
        .with("AAA/USDT", Ok(breakout_bars()))
        .with("BBB/USDT", Ok(breakout_bars()))
        .with("CCC/USDT", Ok(breakout_bars()));
    let detector = BuiltinDetector::from_kind(SignalKind::BreakoutBuy);
    let order = ["CCC/USDT", "AAA/USDT", "BBB/USDT"];

    let report = scan(&market, &detector, &order[..], Timeframe::D1, 50);

    assert_eq!(symbols_of(&report.signals), order.to_vec());
    let requested = market.requested.borrow();
    assert!(requested
        .iter()
        .all(|(_, tf, limit)| *tf == Timeframe::D1 && *limit == 50));
}

#[test]
fn test_every_error_class_is_isolated() {
    let market = MockMarket::default()
        .with("AAA/USDT", Err(network_error()))
        .with(
            "BBB/USDT",
            Err(FetchError::ExchangeRejected {
                code: "51001".to_string(),
                msg: "Instrument ID does not exist".to_string(),
            }),
        )
        .with("CCC/USDT", Err(FetchError::Unknown("bad payload".to_string())))
        .with("DDD/USDT", Ok(breakout_bars()));
    let request = ScanRequest::new(SignalKind::BreakoutBuy, Timeframe::H1);

    let report = run_screener(&market, &request).unwrap();

    assert_eq!(symbols_of(&report.signals), vec!["DDD/USDT"]);
    let failed: Vec<&str> = report.failures.iter().map(|f| f.symbol.as_str()).collect();
    assert_eq!(failed, vec!["AAA/USDT", "BBB/USDT", "CCC/USDT"]);
    assert!(!report.is_clean());
}

#[test]
fn test_empty_series_is_skipped_silently() {
    let market = MockMarket::default()
        .with("AAA/USDT", Ok(Vec::new()))
        .with("BBB/USDT", Ok(breakout_bars()));
    let request = ScanRequest::new(SignalKind::BreakoutBuy, Timeframe::D1);

    let report = run_screener(&market, &request).unwrap();

    assert_eq!(symbols_of(&report.signals), vec!["BBB/USDT"]);
    assert_eq!(report.empty, 1);
    assert!(report.is_clean());
}

#[test]
fn test_malformed_candle_fails_only_that_symbol() {
    let mut bad = breakout_bars();
    bad[21].volume = -1.0;
    let market = MockMarket::default()
        .with("AAA/USDT", Ok(bad))
        .with("BBB/USDT", Ok(breakout_bars()));
    let request = ScanRequest::new(SignalKind::BreakoutBuy, Timeframe::D1);

    let report = run_screener(&market, &request).unwrap();

    assert_eq!(symbols_of(&report.signals), vec!["BBB/USDT"]);
    assert!(matches!(
        report.failures[0].error,
        SymbolError::Detection(ScreenerError::InvalidOHLCV { index: 21, .. })
    ));
}

#[test]
fn test_listing_failure_is_fatal() {
    let market = MockMarket {
        listing_error: Some(network_error()),
        ..MockMarket::default()
    };
    let request = ScanRequest::new(SignalKind::RisingThreeMethods, Timeframe::D1);

    assert!(matches!(
        run_screener(&market, &request),
        Err(ScreenerError::SymbolListing { .. })
    ));
}

#[test]
fn test_top_n_ranks_by_volume() {
    let mut market = MockMarket::default()
        .with("AAA/USDT", Ok(breakout_bars()))
        .with("BBB/USDT", Ok(breakout_bars()))
        .with("CCC/USDT", Ok(breakout_bars()))
        .with("DDD/USDT", Ok(breakout_bars()));
    market.volumes = Some(HashMap::from([
        ("AAA/USDT".to_string(), 10.0),
        ("BBB/USDT".to_string(), 300.0),
        ("CCC/USDT".to_string(), 50.0),
    ]));

    let symbols = select_symbols(&market, "USDT", Some(3)).unwrap();
    assert_eq!(symbols, vec!["BBB/USDT", "CCC/USDT", "AAA/USDT"]);

    let request = ScanRequest::new(SignalKind::BreakoutBuy, Timeframe::D1).top_n(Some(2));
    let report = run_screener(&market, &request).unwrap();
    assert_eq!(symbols_of(&report.signals), vec!["BBB/USDT", "CCC/USDT"]);
}

#[test]
fn test_rising_three_through_scanner() {
    let pattern = vec![
        Candle::new(0, 100.0, 110.0, 100.0, 110.0, 50.0),
        Candle::new(1, 105.0, 106.5, 104.5, 106.0, 20.0),
        Candle::new(2, 105.0, 106.5, 104.5, 106.0, 20.0),
        Candle::new(3, 105.0, 106.5, 104.5, 106.0, 20.0),
        Candle::new(4, 108.0, 115.0, 108.0, 115.0, 60.0),
    ];
    let market = MockMarket::default()
        .with("AAA/USDT", Ok(quiet_bars()))
        .with("BBB/USDT", Ok(pattern));
    let request = ScanRequest::new(SignalKind::RisingThreeMethods, Timeframe::D1);

    let report = run_screener(&market, &request).unwrap();

    assert_eq!(report.signals.len(), 1);
    let signal = &report.signals[0];
    assert_eq!(signal.symbol, "BBB/USDT");
    assert_eq!(signal.extra.get("c1_close"), Some(110.0));
    assert_eq!(signal.extra.get("c5_close"), Some(115.0));
}

#[test]
fn test_signals_render_and_batch_in_scan_order() {
    let mut market = MockMarket::default();
    for i in 0..25 {
        market = market.with(&format!("S{i:02}/USDT"), Ok(breakout_bars()));
    }
    let request = ScanRequest::new(SignalKind::BreakoutBuy, Timeframe::H4);
    let report = run_screener(&market, &request).unwrap();

    let rendered = render(&report.signals, request.kind(), request.timeframe);
    assert_eq!(rendered.count, 25);
    assert!(rendered.text.contains("Results: BUYONBREAKOUT | TF: 4H"));

    let batch = NotificationBatch::new(
        &report.signals,
        request.kind(),
        request.timeframe,
        request.quote.as_str(),
        chrono::Utc::now(),
    );
    let flattened: Vec<&str> = batch
        .chunks
        .iter()
        .flat_map(|chunk| symbols_of(chunk.signals))
        .collect();
    assert_eq!(flattened, symbols_of(&report.signals));
    assert_eq!(batch.chunks.len(), 2);
}
