use anyhow::{Context, Result};
use bolig_scout::config::{self, Config, RunMode, DEFAULT_CONFIG_PATH};
use bolig_scout::notify::{LogNotifier, Notifier, TelegramNotifier};
use bolig_scout::scrapers::{HttpFetcher, ListingExtractor, SelectorSet};
use bolig_scout::{ChangeDetector, Pipeline, SeenStore, TickReport};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Watch a boligportal search and alert on new listings
#[derive(Debug, Parser)]
#[command(name = "bolig-scout", version)]
struct Cli {
    /// Path to the JSON config file
    #[arg(long, env = "CONFIG_PATH", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// continuous, batch or once
    #[arg(long)]
    mode: Option<String>,

    /// Number of checks in batch mode
    #[arg(long)]
    checks: Option<u32>,

    /// Seconds between checks, overriding the config file
    #[arg(long)]
    interval: Option<u64>,
}

enum Outcome {
    Completed { failed_ticks: u32 },
    Interrupted,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (Telegram credentials, overrides)
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut cfg = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = cfg.override_interval(cli.interval) {
        eprintln!("Config error: {e}");
        return ExitCode::FAILURE;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mode = match config::resolve_run_mode(cli.mode.as_deref(), cli.checks) {
        Ok(mode) => mode,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match run(cfg, mode).await {
        Ok(Outcome::Completed { failed_ticks: 0 }) | Ok(Outcome::Interrupted) => ExitCode::SUCCESS,
        Ok(Outcome::Completed { failed_ticks }) => {
            error!("{failed_ticks} checks did not complete cleanly");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("Fatal error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cfg: Config, mode: RunMode) -> Result<Outcome> {
    let mut pipeline = build_pipeline(&cfg).await?;

    info!("🏠 Bolig Scout");
    info!("Starting monitoring of {}", cfg.search_url);
    info!("Will check every {} seconds ({:?})", cfg.check_interval, mode);

    let limit = match mode {
        RunMode::Continuous => None,
        RunMode::Batch(n) => Some(n),
        RunMode::Once => Some(1),
    };

    let mut failed_ticks = 0;
    let mut tick = 0u32;
    loop {
        tick += 1;
        info!("{}", "=".repeat(50));
        info!("Check #{} at {}", tick, chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));

        let report = tokio::select! {
            report = pipeline.tick() => report,
            _ = tokio::signal::ctrl_c() => return Ok(stopping()),
        };
        log_report(&report);
        if !report.is_clean() {
            failed_ticks += 1;
        }

        if limit.is_some_and(|n| tick >= n) {
            info!("Completed {} checks", tick);
            return Ok(Outcome::Completed { failed_ticks });
        }

        info!("Waiting {} seconds before next check...", cfg.check_interval);
        tokio::select! {
            _ = tokio::time::sleep(cfg.interval()) => {}
            _ = tokio::signal::ctrl_c() => return Ok(stopping()),
        }
    }
}

fn stopping() -> Outcome {
    info!("Stopping the monitor...");
    Outcome::Interrupted
}

async fn build_pipeline(cfg: &Config) -> Result<Pipeline> {
    let fetcher = HttpFetcher::new(cfg.request_timeout())?;
    let extractor = ListingExtractor::new(&SelectorSet::boligportal(), cfg.origin()?)
        .context("Failed to compile listing selectors")?;
    let detector = ChangeDetector::open(SeenStore::new(&cfg.listings_cache_file)).await;

    Ok(Pipeline::new(
        cfg.search_url.clone(),
        Box::new(fetcher),
        extractor,
        detector,
        build_notifier(cfg.request_timeout()),
    ))
}

fn build_notifier(timeout: Duration) -> Box<dyn Notifier> {
    match TelegramNotifier::from_env(timeout) {
        Ok(telegram) => Box::new(telegram),
        Err(e) => {
            warn!("Telegram disabled ({e}); new listings will only be logged");
            Box::new(LogNotifier)
        }
    }
}

fn log_report(report: &TickReport) {
    if let Some(e) = &report.fetch_error {
        warn!("Check finished without a page: {e}");
        return;
    }
    info!(
        "Check finished: {} listings on page, {} skipped cards, {} new, {} delivered, {} failed",
        report.extracted,
        report.skipped_cards,
        report.new_listings.len(),
        report.delivered,
        report.failed_deliveries
    );
    if let Some(e) = &report.persist_error {
        error!("Seen-set not persisted this check: {e}");
    }
}
