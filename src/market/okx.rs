//! OKX public REST market data
//!
//! See docs: <https://www.okx.com/docs-v5/en/#public-data-rest-api>

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use reqwest::{blocking::Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::{debug, warn};

use super::{FetchError, MarketData, Timeframe};
use crate::Candle;

pub const OKX_BASE_URL: &str = "https://www.okx.com";

/// Maximum `limit` accepted by `/api/v5/market/candles`
pub const CANDLES_MAX_LIMIT: usize = 300;

const INSTRUMENTS_PATH: &str = "/api/v5/public/instruments";
const CANDLES_PATH: &str = "/api/v5/market/candles";
const TICKERS_PATH: &str = "/api/v5/market/tickers";

/// Longest payload excerpt carried inside an error message
const PAYLOAD_EXCERPT: usize = 200;

#[derive(Debug, Clone)]
pub struct OkxConfig {
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Minimum spacing between consecutive requests
    pub min_request_interval: Duration,
}

impl Default for OkxConfig {
    fn default() -> Self {
        Self {
            base_url: OKX_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
            min_request_interval: Duration::from_millis(100),
        }
    }
}

/// Blocking OKX REST client for spot symbols, candles and tickers
#[derive(Debug)]
pub struct OkxClient {
    http: Client,
    base_url: String,
    min_request_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl OkxClient {
    pub fn new(config: OkxConfig) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("spot-screener/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            min_request_interval: config.min_request_interval,
            last_request: Mutex::new(None),
        })
    }

    /// Sleep until at least `min_request_interval` has passed since the previous request
    fn throttle(&self) {
        let mut last = self.last_request.lock();
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_request_interval {
                std::thread::sleep(self.min_request_interval - elapsed);
            }
        }
        *last = Some(Instant::now());
    }

    fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, FetchError> {
        self.throttle();

        let url = format!("{}{}", self.base_url, path);
        debug!(%url, ?query, "OKX request");

        let response = self.http.get(&url).query(query).send()?;
        let status = response.status();
        let payload = response.text()?;

        parse_response(status, &payload)
    }
}

impl MarketData for OkxClient {
    fn list_spot_symbols(&self, quote: &str) -> Result<Vec<String>, FetchError> {
        let instruments: Vec<OkxInstrument> =
            self.get(INSTRUMENTS_PATH, &[("instType", "SPOT")])?;
        Ok(spot_symbols(&instruments, quote))
    }

    fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, FetchError> {
        if limit > CANDLES_MAX_LIMIT {
            warn!(
                %symbol,
                requested = limit,
                max = CANDLES_MAX_LIMIT,
                "candle limit exceeds OKX maximum, capping"
            );
        }
        let limit = limit.min(CANDLES_MAX_LIMIT).to_string();
        let inst_id = inst_id(symbol);

        let candles: Vec<OkxCandle> = self.get(
            CANDLES_PATH,
            &[
                ("instId", inst_id.as_str()),
                ("bar", timeframe.as_str()),
                ("limit", limit.as_str()),
            ],
        )?;
        Ok(oldest_first(candles))
    }

    fn quote_volumes(&self, quote: &str) -> Result<Option<HashMap<String, f64>>, FetchError> {
        let tickers: Vec<OkxTicker> = self.get(TICKERS_PATH, &[("instType", "SPOT")])?;
        Ok(Some(volumes_by_symbol(&tickers, quote)))
    }
}

// ============================================================
// WIRE MODELS
// ============================================================

/// Envelope shared by every OKX REST response
#[derive(Debug, Deserialize)]
struct OkxEnvelope {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OkxInstrument {
    pub inst_id: String,
    pub base_ccy: String,
    pub quote_ccy: String,
    /// `live`, `suspend`, `preopen`, `test`
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OkxTicker {
    pub inst_id: String,
    /// 24h volume in quote currency for spot pairs; may be empty
    #[serde(rename = "volCcy24h", default)]
    pub vol_ccy_24h: String,
}

/// Candle as returned by `/market/candles`.
///
/// Sequence format: `[ts, o, h, l, c, vol, volCcy, volCcyQuote, confirm]`, all strings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OkxCandle(pub Candle);

impl<'de> Deserialize<'de> for OkxCandle {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct SeqVisitor;

        impl<'de> serde::de::Visitor<'de> for SeqVisitor {
            type Value = OkxCandle;

            fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                formatter.write_str("OkxCandle sequence from the OKX REST API")
            }

            fn visit_seq<SeqAccessor>(
                self,
                mut seq: SeqAccessor,
            ) -> Result<Self::Value, SeqAccessor::Error>
            where
                SeqAccessor: serde::de::SeqAccess<'de>,
            {
                let timestamp = extract_next_str(&mut seq, "ts")?;
                let open = extract_next_str(&mut seq, "o")?;
                let high = extract_next_str(&mut seq, "h")?;
                let low = extract_next_str(&mut seq, "l")?;
                let close = extract_next_str(&mut seq, "c")?;
                // Base currency volume
                let volume = extract_next_str(&mut seq, "vol")?;

                // Ignore volCcy, volCcyQuote, confirm and anything added later
                while seq.next_element::<serde::de::IgnoredAny>()?.is_some() {}

                Ok(OkxCandle(Candle::new(timestamp, open, high, low, close, volume)))
            }
        }

        deserializer.deserialize_seq(SeqVisitor)
    }
}

/// Extract the next sequence element as a string and parse it into `Target`
fn extract_next_str<'de, SeqAccessor, Target>(
    sequence: &mut SeqAccessor,
    name: &'static str,
) -> Result<Target, SeqAccessor::Error>
where
    SeqAccessor: serde::de::SeqAccess<'de>,
    Target: std::str::FromStr,
    Target::Err: std::fmt::Display,
{
    let raw: String = sequence
        .next_element()?
        .ok_or_else(|| serde::de::Error::missing_field(name))?;
    raw.parse::<Target>()
        .map_err(|e| serde::de::Error::custom(format!("{name}: {e}")))
}

// ============================================================
// RESPONSE HANDLING
// ============================================================

/// Classify an OKX REST response into data or a [`FetchError`].
///
/// - HTTP 429 and 5xx: [`FetchError::Network`]
/// - non-zero OKX `code`, or any other non-success status: [`FetchError::ExchangeRejected`]
/// - an undecodable success payload: [`FetchError::Unknown`]
pub fn parse_response<T: DeserializeOwned>(
    status: StatusCode,
    payload: &str,
) -> Result<Vec<T>, FetchError> {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return Err(FetchError::Network(format!(
            "HTTP {status}: {}",
            excerpt(payload)
        )));
    }

    let envelope = match serde_json::from_str::<OkxEnvelope>(payload) {
        Ok(envelope) => envelope,
        Err(_) if !status.is_success() => {
            return Err(FetchError::ExchangeRejected {
                code: status.as_u16().to_string(),
                msg: excerpt(payload).to_string(),
            })
        }
        Err(error) => {
            return Err(FetchError::Unknown(format!(
                "{error} for payload: {}",
                excerpt(payload)
            )))
        }
    };

    if envelope.code != "0" {
        return Err(FetchError::ExchangeRejected {
            code: envelope.code,
            msg: envelope.msg,
        });
    }

    if envelope.data.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value(envelope.data)
        .map_err(|error| FetchError::Unknown(format!("malformed data: {error}")))
}

fn excerpt(payload: &str) -> &str {
    match payload.char_indices().nth(PAYLOAD_EXCERPT) {
        Some((end, _)) => &payload[..end],
        None => payload,
    }
}

/// `BTC/USDT` -> `BTC-USDT`
pub fn inst_id(symbol: &str) -> String {
    symbol.replace('/', "-")
}

/// Live spot instruments quoted in `quote`, as sorted, distinct `BASE/QUOTE` symbols
pub fn spot_symbols(instruments: &[OkxInstrument], quote: &str) -> Vec<String> {
    let mut symbols: Vec<String> = instruments
        .iter()
        .filter(|i| i.state == "live" && i.quote_ccy.eq_ignore_ascii_case(quote))
        .map(|i| format!("{}/{}", i.base_ccy, i.quote_ccy))
        .collect();
    symbols.sort();
    symbols.dedup();
    symbols
}

/// OKX returns candles newest first
pub fn oldest_first(candles: Vec<OkxCandle>) -> Vec<Candle> {
    candles.into_iter().rev().map(|OkxCandle(c)| c).collect()
}

/// 24h quote volume keyed by `BASE/QUOTE` symbol, for tickers quoted in `quote`
pub fn volumes_by_symbol(tickers: &[OkxTicker], quote: &str) -> HashMap<String, f64> {
    let suffix = format!("-{}", quote.to_ascii_uppercase());
    tickers
        .iter()
        .filter_map(|t| {
            let base = t.inst_id.strip_suffix(&suffix)?;
            let volume = t.vol_ccy_24h.parse::<f64>().unwrap_or(0.0);
            Some((format!("{base}/{}", quote.to_ascii_uppercase()), volume))
        })
        .collect()
}
