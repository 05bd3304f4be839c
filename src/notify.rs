//! Discord webhook delivery of scan results
//!
//! Embeds are built by pure functions from a [`NotificationBatch`]; [`DiscordNotifier`] only
//! serializes and posts them.

use std::{thread, time::Duration};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    market::Timeframe,
    report::{format_thousands, ticker, NotificationBatch, NotificationChunk, NotificationHeader},
    SignalKind,
};

pub const DEFAULT_USERNAME: &str = "Crypto Screener 🤖";
/// Pause between consecutive result messages
pub const CHUNK_DELAY: Duration = Duration::from_millis(500);

pub const GREEN: u32 = 0x2ECC71;
pub const RED: u32 = 0xE74C3C;
pub const GREY: u32 = 0x95A5A6;

const HEADER_FOOTER: &str = "Crypto Screener | OKX Spot  •  Do Your Own Research! ⚠️";
const ERROR_FOOTER: &str = "Crypto Screener | Error Report";

// ============================================================
// ERRORS
// ============================================================

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("no webhook URL configured")]
    MissingWebhook,

    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("{failed} of {total} notification messages failed to send")]
    Partial { failed: usize, total: usize },
}

// ============================================================
// EMBEDS
// ============================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Embed {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub color: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    pub timestamp: String,
    pub footer: EmbedFooter,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

impl EmbedFooter {
    fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    username: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    avatar_url: Option<&'a str>,
    embeds: [&'a Embed; 1],
}

/// Summary embed sent before any results
pub fn header_embed(header: &NotificationHeader) -> Embed {
    let kind = header.strategy;
    let mut description = [
        format!("> {}", kind.description()),
        String::new(),
        format!("**📅 Scan Time:** `{}`", header.scan_time()),
        format!("**⏱️ Timeframe:** `{}`", header.timeframe),
        format!("**💱 Quote Currency:** `{}`", header.quote),
        format!("**📌 Matches Found:** `{}`", header.match_count),
    ]
    .join("\n");

    if header.match_count == 0 {
        description.push_str("\n\n*No symbols matched the criteria this scan.*");
    }

    Embed {
        title: format!("{} {}", kind.emoji(), kind.title()),
        description: Some(description),
        color: if header.match_count > 0 { GREEN } else { GREY },
        fields: Vec::new(),
        timestamp: header.scanned_at.to_rfc3339(),
        footer: EmbedFooter::new(HEADER_FOOTER),
    }
}

/// One embed listing a chunk of matched symbols
pub fn results_embed(chunk: &NotificationChunk<'_>, header: &NotificationHeader) -> Embed {
    let fields = chunk
        .signals
        .iter()
        .map(|signal| EmbedField {
            name: format!("🪙 {}", ticker(&signal.symbol)),
            value: format!(
                "Signal: `{}`\nClose:  `{:.4}`\nVol:    `{}`",
                signal.kind.label(),
                signal.close,
                format_thousands(signal.volume)
            ),
            inline: true,
        })
        .collect();

    Embed {
        title: format!("📋 Matched Symbols{}", chunk.part_suffix()),
        description: None,
        color: GREEN,
        fields,
        timestamp: header.scanned_at.to_rfc3339(),
        footer: EmbedFooter::new(format!(
            "{} | {}  •  DYOR ⚠️",
            header.strategy.title(),
            header.timeframe
        )),
    }
}

/// Red embed describing a failed run
pub fn error_embed(
    message: &str,
    strategy: Option<SignalKind>,
    timeframe: Option<Timeframe>,
    at: DateTime<Utc>,
) -> Embed {
    let fields = match strategy {
        Some(kind) => vec![
            EmbedField {
                name: "Strategy".to_string(),
                value: kind.name().to_string(),
                inline: true,
            },
            EmbedField {
                name: "Timeframe".to_string(),
                value: timeframe.map_or_else(|| "-".to_string(), |tf| tf.to_string()),
                inline: true,
            },
        ],
        None => Vec::new(),
    };

    Embed {
        title: "⚠️ Screener Error".to_string(),
        description: Some(format!("```{message}```")),
        color: RED,
        fields,
        timestamp: at.to_rfc3339(),
        footer: EmbedFooter::new(ERROR_FOOTER),
    }
}

// ============================================================
// NOTIFIER
// ============================================================

#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub webhook_url: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub timeout: Duration,
    pub chunk_delay: Duration,
}

impl NotifierConfig {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            username: DEFAULT_USERNAME.to_string(),
            avatar_url: None,
            timeout: Duration::from_secs(10),
            chunk_delay: CHUNK_DELAY,
        }
    }
}

/// Posts embeds to a Discord webhook
#[derive(Debug)]
pub struct DiscordNotifier {
    http: reqwest::blocking::Client,
    config: NotifierConfig,
}

impl DiscordNotifier {
    pub fn new(config: NotifierConfig) -> Result<Self, NotifyError> {
        if config.webhook_url.trim().is_empty() {
            return Err(NotifyError::MissingWebhook);
        }
        let http = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { http, config })
    }

    /// Header first, then every chunk in order. A failed message does not stop the rest.
    pub fn send_results(&self, batch: &NotificationBatch<'_>) -> Result<(), NotifyError> {
        let total = 1 + batch.chunks.len();
        let mut failed = 0;

        if let Err(e) = self.post(&header_embed(&batch.header)) {
            warn!("discord header message failed: {e}");
            failed += 1;
        }

        for (i, chunk) in batch.chunks.iter().enumerate() {
            if let Err(e) = self.post(&results_embed(chunk, &batch.header)) {
                warn!(part = i + 1, "discord results message failed: {e}");
                failed += 1;
            }
            if i + 1 < batch.chunks.len() {
                thread::sleep(self.config.chunk_delay);
            }
        }

        match failed {
            0 => Ok(()),
            failed => Err(NotifyError::Partial { failed, total }),
        }
    }

    pub fn send_error(
        &self,
        message: &str,
        strategy: Option<SignalKind>,
        timeframe: Option<Timeframe>,
    ) -> Result<(), NotifyError> {
        self.post(&error_embed(message, strategy, timeframe, Utc::now()))
    }

    fn post(&self, embed: &Embed) -> Result<(), NotifyError> {
        let payload = WebhookPayload {
            username: &self.config.username,
            avatar_url: self.config.avatar_url.as_deref(),
            embeds: [embed],
        };

        let response = self
            .http
            .post(&self.config.webhook_url)
            .json(&payload)
            .send()?;

        let status = response.status().as_u16();
        if matches!(status, 200 | 204) {
            info!("Discord notification sent (HTTP {status})");
            Ok(())
        } else {
            let body = response.text().unwrap_or_default();
            debug!(status, %body, "discord rejected message");
            Err(NotifyError::Status { status, body })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Signal, SignalExtra};
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
    }

    fn signal(symbol: &str) -> Signal {
        Signal {
            symbol: symbol.to_string(),
            kind: SignalKind::RisingThreeMethods,
            close: 1.23456,
            volume: 1234567.0,
            extra: SignalExtra::RisingThree {
                c1_close: 1.1,
                c5_close: 1.23456,
            },
        }
    }

    #[test]
    fn test_header_embed_with_matches() {
        let signals = vec![signal("BTC/USDT")];
        let batch = NotificationBatch::new(&signals, SignalKind::RisingThreeMethods, Timeframe::D1, "USDT", at());
        let embed = header_embed(&batch.header);

        assert_eq!(embed.title, "📊 Rising Three Methods 🕯️");
        assert_eq!(embed.color, GREEN);
        let description = embed.description.unwrap();
        assert!(description.contains("`2024-05-01 08:00 UTC`"));
        assert!(description.contains("**⏱️ Timeframe:** `1D`"));
        assert!(description.contains("**📌 Matches Found:** `1`"));
        assert!(!description.contains("No symbols matched"));
    }

    #[test]
    fn test_header_embed_empty() {
        let batch = NotificationBatch::new(&[], SignalKind::BreakoutBuy, Timeframe::H4, "USDT", at());
        let embed = header_embed(&batch.header);
        assert_eq!(embed.color, GREY);
        assert!(embed
            .description
            .unwrap()
            .ends_with("*No symbols matched the criteria this scan.*"));
    }

    #[test]
    fn test_results_embed_fields() {
        let signals: Vec<Signal> = (0..21).map(|i| signal(&format!("T{i}/USDT"))).collect();
        let batch = NotificationBatch::new(&signals, SignalKind::RisingThreeMethods, Timeframe::H4, "USDT", at());

        let first = results_embed(&batch.chunks[0], &batch.header);
        assert_eq!(first.title, "📋 Matched Symbols (Part 1/2)");
        assert_eq!(first.fields.len(), 20);
        assert_eq!(first.fields[0].name, "🪙 T0");
        assert_eq!(
            first.fields[0].value,
            "Signal: `RISING_3_METHODS`\nClose:  `1.2346`\nVol:    `1,234,567.00`"
        );
        assert_eq!(first.footer.text, "Rising Three Methods 🕯️ | 4H  •  DYOR ⚠️");

        let second = results_embed(&batch.chunks[1], &batch.header);
        assert_eq!(second.fields.len(), 1);
        assert_eq!(second.fields[0].name, "🪙 T20");
    }

    #[test]
    fn test_error_embed() {
        let embed = error_embed("boom", Some(SignalKind::BreakoutBuy), Some(Timeframe::D1), at());
        assert_eq!(embed.color, RED);
        assert_eq!(embed.description.as_deref(), Some("```boom```"));
        assert_eq!(embed.fields.len(), 2);
        assert_eq!(embed.fields[0].value, "buyonbreakout");
        assert_eq!(embed.fields[1].value, "1D");

        let bare = error_embed("boom", None, None, at());
        assert!(bare.fields.is_empty());
    }

    #[test]
    fn test_payload_serialization() {
        let embed = error_embed("boom", None, None, at());
        let payload = WebhookPayload {
            username: DEFAULT_USERNAME,
            avatar_url: None,
            embeds: [&embed],
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["username"], DEFAULT_USERNAME);
        assert!(json.get("avatar_url").is_none());
        assert!(json["embeds"][0].get("fields").is_none());
        assert_eq!(json["embeds"][0]["footer"]["text"], ERROR_FOOTER);
        assert_eq!(json["embeds"][0]["color"], RED);
    }

    #[test]
    fn test_missing_webhook_rejected() {
        assert!(matches!(
            DiscordNotifier::new(NotifierConfig::new("  ")),
            Err(NotifyError::MissingWebhook)
        ));
    }
}
