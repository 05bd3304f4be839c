//! Rendering of scan results
//!
//! Two independent paths: a console table ([`render`]) and a batch of messages for a
//! size-limited notification channel ([`NotificationBatch`]).

use std::fmt;

use chrono::{DateTime, Utc};

use crate::{market::Timeframe, Signal, SignalKind};

/// Maximum number of signals in one notification message
pub const NOTIFICATION_CHUNK_SIZE: usize = 20;

const RULE_WIDTH: usize = 60;

// ============================================================
// CONSOLE
// ============================================================

/// Console summary of a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedOutput {
    pub text: String,
    pub count: usize,
}

/// Tabular summary: symbol, signal, close, volume, followed by the match count
pub fn render(signals: &[Signal], strategy: SignalKind, timeframe: Timeframe) -> RenderedOutput {
    let mut text = String::new();
    // Writing into a String cannot fail
    let _ = write_table(&mut text, signals, strategy, timeframe);

    RenderedOutput {
        text,
        count: signals.len(),
    }
}

/// Write the results table to any formatter sink, stopping at the first write error
pub fn write_table<W: fmt::Write>(
    out: &mut W,
    signals: &[Signal],
    strategy: SignalKind,
    timeframe: Timeframe,
) -> fmt::Result {
    let rule = "=".repeat(RULE_WIDTH);

    writeln!(out, "{rule}")?;
    writeln!(
        out,
        "  Results: {} | TF: {timeframe}",
        strategy.name().to_uppercase()
    )?;
    writeln!(out, "{rule}")?;

    if signals.is_empty() {
        writeln!(out, "  No symbols matched the criteria.")?;
    } else {
        writeln!(
            out,
            "  {:<20} {:<20} {:>10} {:>15}",
            "Symbol", "Signal", "Close", "Volume"
        )?;
        writeln!(
            out,
            "  {} {} {} {}",
            "-".repeat(20),
            "-".repeat(20),
            "-".repeat(10),
            "-".repeat(15)
        )?;
        for signal in signals {
            writeln!(
                out,
                "  {:<20} {:<20} {:>10.4} {:>15.2}",
                signal.symbol,
                signal.kind.label(),
                signal.close,
                signal.volume
            )?;
        }
    }

    writeln!(out, "{rule}")?;
    writeln!(out, "  Total matches: {}", signals.len())?;
    writeln!(out, "{rule}")
}

// ============================================================
// NOTIFICATION BATCHING
// ============================================================

/// Leading summary message of a notification batch
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationHeader {
    pub strategy: SignalKind,
    pub timeframe: Timeframe,
    pub quote: String,
    pub scanned_at: DateTime<Utc>,
    pub match_count: usize,
}

impl NotificationHeader {
    /// Scan time as shown to readers, e.g. `2024-05-01 08:00 UTC`
    pub fn scan_time(&self) -> String {
        self.scanned_at.format("%Y-%m-%d %H:%M UTC").to_string()
    }
}

/// One message worth of signals
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationChunk<'a> {
    /// Zero-based position of this chunk
    pub index: usize,
    pub total: usize,
    pub signals: &'a [Signal],
}

impl NotificationChunk<'_> {
    /// `" (Part 2/3)"` when the results span several messages, empty otherwise
    pub fn part_suffix(&self) -> String {
        if self.total > 1 {
            format!(" (Part {}/{})", self.index + 1, self.total)
        } else {
            String::new()
        }
    }
}

/// Header plus ordered chunks of at most [`NOTIFICATION_CHUNK_SIZE`] signals
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationBatch<'a> {
    pub header: NotificationHeader,
    pub chunks: Vec<NotificationChunk<'a>>,
}

impl<'a> NotificationBatch<'a> {
    pub fn new(
        signals: &'a [Signal],
        strategy: SignalKind,
        timeframe: Timeframe,
        quote: impl Into<String>,
        scanned_at: DateTime<Utc>,
    ) -> Self {
        let total = signals.len().div_ceil(NOTIFICATION_CHUNK_SIZE);
        let chunks = signals
            .chunks(NOTIFICATION_CHUNK_SIZE)
            .enumerate()
            .map(|(index, signals)| NotificationChunk {
                index,
                total,
                signals,
            })
            .collect();

        Self {
            header: NotificationHeader {
                strategy,
                timeframe,
                quote: quote.into(),
                scanned_at,
                match_count: signals.len(),
            },
            chunks,
        }
    }
}

/// Base asset of a `BASE/QUOTE` symbol
pub fn ticker(symbol: &str) -> &str {
    symbol.split_once('/').map_or(symbol, |(base, _)| base)
}

/// Fixed two-decimal formatting with `,` thousands separators
pub fn format_thousands(value: f64) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (int_part, frac_part) = formatted.split_once('.').unwrap_or((&formatted, "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && formatted.bytes().any(|b| b.is_ascii_digit() && b != b'0') {
        "-"
    } else {
        ""
    };
    format!("{sign}{grouped}.{frac_part}")
}
