use std::{collections::HashMap, time::Duration};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use spot_screener::{
    logging::{init_json_logging, init_logging},
    market::{
        okx::{OkxClient, OkxConfig, OKX_BASE_URL},
        Timeframe,
    },
    notify::{DiscordNotifier, NotifierConfig, NotifyError},
    params::parse_param,
    report::{render, NotificationBatch},
    scanner::{run_screener, ScanRequest, DEFAULT_CANDLE_LIMIT, DEFAULT_QUOTE},
    BuiltinDetector, SignalKind,
};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "spot-screener")]
#[command(about = "Crypto spot screener for OKX", long_about = None)]
struct Cli {
    /// Strategy to run: buyonbreakout (alias breakout_20day) or rising3methods
    #[arg(short, long)]
    strategy: SignalKind,

    /// Candle timeframe: 1m 3m 5m 15m 30m 1H 2H 4H 6H 12H 1D 3D 1W 1M
    #[arg(long)]
    tf: Timeframe,

    /// Number of candles to fetch per symbol
    #[arg(short, long, default_value_t = DEFAULT_CANDLE_LIMIT)]
    limit: usize,

    /// Quote currency to filter pairs
    #[arg(short, long, default_value = DEFAULT_QUOTE)]
    quote: String,

    /// Only screen the top N symbols by 24h volume
    #[arg(long)]
    top: Option<usize>,

    /// Detector parameter override, e.g. `lookback=30` (repeatable)
    #[arg(short, long = "param", value_name = "KEY=VALUE")]
    params: Vec<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Send results to a Discord webhook
    #[arg(long)]
    discord: bool,

    #[arg(long, env = "DISCORD_WEBHOOK_URL", hide_env_values = true)]
    webhook_url: Option<String>,

    #[arg(long, env = "OKX_REST_URL", default_value = OKX_BASE_URL)]
    okx_url: String,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    timeout_secs: u64,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if cli.log_json {
        init_json_logging();
    } else {
        init_logging();
    }

    let notifier = if cli.discord {
        build_notifier(&cli)
    } else {
        None
    };

    let outcome = run(&cli, notifier.as_ref());

    if let (Err(error), Some(notifier)) = (&outcome, &notifier) {
        if let Err(e) = notifier.send_error(&format!("{error:#}"), Some(cli.strategy), Some(cli.tf)) {
            warn!("failed to report error to Discord: {e}");
        }
    }

    outcome
}

fn build_notifier(cli: &Cli) -> Option<DiscordNotifier> {
    let mut config = NotifierConfig::new(cli.webhook_url.clone().unwrap_or_default());
    config.timeout = Duration::from_secs(cli.timeout_secs);

    match DiscordNotifier::new(config) {
        Ok(notifier) => Some(notifier),
        Err(NotifyError::MissingWebhook) => {
            warn!("Discord webhook URL not set; pass --webhook-url or set DISCORD_WEBHOOK_URL");
            None
        }
        Err(e) => {
            warn!("Discord notifier unavailable: {e}");
            None
        }
    }
}

fn run(cli: &Cli, notifier: Option<&DiscordNotifier>) -> Result<()> {
    let overrides = cli
        .params
        .iter()
        .map(|raw| parse_param(raw))
        .collect::<Result<Vec<_>, _>>()?;
    let overrides: HashMap<&str, f64> = overrides
        .iter()
        .map(|(name, value)| (name.as_str(), *value))
        .collect();
    let detector = BuiltinDetector::with_params(cli.strategy, &overrides).with_context(|| {
        let known: Vec<String> = BuiltinDetector::param_meta(cli.strategy)
            .iter()
            .map(|meta| format!("{} (default {})", meta.name, meta.default))
            .collect();
        format!(
            "invalid parameters for {} (available: {})",
            cli.strategy,
            known.join(", ")
        )
    })?;

    let request = ScanRequest::new(cli.strategy, cli.tf)
        .with_detector(detector)
        .candle_limit(cli.limit)
        .quote(cli.quote.as_str())
        .top_n(cli.top);

    if cli.format == OutputFormat::Table {
        print_banner(&request);
    } else {
        info!(
            strategy = %request.kind(),
            timeframe = %request.timeframe,
            quote = %request.quote,
            limit = request.candle_limit,
            top = ?request.top_n,
            "OKX Crypto Spot Screener"
        );
    }

    let client = OkxClient::new(OkxConfig {
        base_url: cli.okx_url.clone(),
        timeout: Duration::from_secs(cli.timeout_secs),
        ..OkxConfig::default()
    })
    .context("failed to build OKX client")?;

    let scanned_at = Utc::now();
    let report = run_screener(&client, &request)?;

    match cli.format {
        OutputFormat::Table => {
            print!("{}", render(&report.signals, request.kind(), request.timeframe).text)
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report.signals)?),
    }

    if !report.is_clean() {
        warn!("{} symbols skipped due to errors", report.failures.len());
    }

    if let Some(notifier) = notifier {
        let batch = NotificationBatch::new(
            &report.signals,
            request.kind(),
            request.timeframe,
            request.quote.as_str(),
            scanned_at,
        );
        if let Err(e) = notifier.send_results(&batch) {
            warn!("Discord notification incomplete: {e}");
        }
    }

    Ok(())
}

fn print_banner(request: &ScanRequest) {
    let rule = "=".repeat(60);
    println!("{rule}");
    println!("  OKX Crypto Spot Screener");
    println!("{rule}");
    println!("  Strategy  : {}", request.kind());
    println!("  Timeframe : {}", request.timeframe);
    println!("  Quote     : {}", request.quote);
    println!("  Limit     : {} candles", request.candle_limit);
    if let Some(top) = request.top_n {
        println!("  Top N     : {top} symbols");
    }
    println!("{rule}");
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(timeout: &str) -> Result<Cli, clap::Error> {
        Cli::try_parse_from([
            "spot-screener",
            "--strategy",
            "buyonbreakout",
            "--tf",
            "1D",
            "--timeout-secs",
            timeout,
        ])
    }

    #[test]
    fn test_timeout_must_be_positive() {
        assert!(parse("0").is_err());
        assert_eq!(parse("5").unwrap().timeout_secs, 5);
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["spot-screener", "-s", "rising3methods", "--tf", "4H"]).unwrap();
        assert_eq!(cli.timeout_secs, 10);
        assert_eq!(cli.strategy, SignalKind::RisingThreeMethods);
        assert_eq!(cli.tf, Timeframe::H4);
        assert_eq!(cli.format, OutputFormat::Table);
    }
}
