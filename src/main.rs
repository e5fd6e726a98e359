use anyhow::{Context, Result};
use censustrade::{
    config::{Config, DestinationConfig},
    fetch::{Fetcher, HttpTransport},
    load::{FileSink, PostgresSink, Sink},
    logging,
    period::Period,
    pipeline::{self, RunOutcome},
};
use clap::Parser;
use std::{path::PathBuf, process::ExitCode};
use tracing::{error, info, warn};

/// Pull Census international trade statistics into PostgreSQL or a file.
#[derive(Parser, Debug)]
#[command(name = "censustrade", version, about, long_about = None)]
struct Args {
    /// Path to the configuration YAML file
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// First period to fetch (YYYY-MM), overrides the file
    #[arg(long, value_name = "YYYY-MM")]
    start: Option<Period>,

    /// Last period to fetch (YYYY-MM), overrides the file
    #[arg(long, value_name = "YYYY-MM")]
    end: Option<Period>,

    /// Census API key
    #[arg(long, env = "CENSUS_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// PostgreSQL connection string, replaces the destination URL in the file
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // ─── 1) init logging ─────────────────────────────────────────────
    logging::init();

    match try_main(Args::parse()).await {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn try_main(args: Args) -> Result<RunOutcome> {
    // ─── 2) load + validate config ───────────────────────────────────
    let mut config = Config::from_file(&args.config)?;
    if let Some(start) = args.start {
        config.start = start;
    }
    if let Some(end) = args.end {
        config.end = end;
    }
    if args.api_key.is_some() {
        config.api_key = args.api_key;
    }
    if let (Some(db_url), DestinationConfig::Postgres { url, .. }) =
        (args.database_url, &mut config.destination)
    {
        *url = db_url;
    }
    let plan = config.validate().context("invalid configuration")?;
    info!(
        periods = plan.periods.len(),
        codes = config.commodity_codes.len(),
        requests = plan.request_count(config.commodity_codes.len()),
        mode = ?config.mode,
        "starting run"
    );
    if config.api_key.is_none() {
        warn!("no API key configured; unauthenticated requests have a low daily limit");
    }

    // ─── 3) wire fetcher + destination ───────────────────────────────
    let transport = HttpTransport::new(config.fetch.timeout())?;
    let fetcher = Fetcher::new(
        transport,
        plan.base_url.clone(),
        config.api_key.clone(),
        config.fetch.clone(),
    );
    let mut sink: Box<dyn Sink> = match &config.destination {
        DestinationConfig::Postgres { url, table } => {
            Box::new(PostgresSink::new(url.clone(), table.clone()))
        }
        DestinationConfig::File { path, format, .. } => {
            let delimiter = config.destination.delimiter_byte()?.unwrap_or(b',');
            Box::new(FileSink::new(path.clone(), delimiter, *format))
        }
    };

    // ─── 4) run ──────────────────────────────────────────────────────
    let report = pipeline::run(&config, &plan, &fetcher, sink.as_mut()).await?;

    for skipped in &report.skipped {
        warn!(query = %skipped.key, reason = %skipped.reason, "skipped");
    }
    for failed in &report.failed_loads {
        error!(tag = %failed.tag, error = %failed.error, "not loaded");
    }
    let outcome = report.outcome();
    info!(
        periods = report.periods,
        rows = report.rows_loaded,
        skipped = report.skipped.len(),
        empty_directions = report.empty_directions.len(),
        failed_loads = report.failed_loads.len(),
        outcome = ?outcome,
        "all done"
    );
    Ok(outcome)
}
