use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::Parser;

use gait_monitor::cli::init_logging;
use gait_monitor::interval::Span;
use gait_monitor::store::{JsonStore, SampleLog};
use gait_monitor::timeutils::{parse_timestamp, LocalZone};
use gait_monitor::{find_activity, Config};

#[derive(Parser, Debug)]
#[command(about = "Build activity segments and bilateral windows from raw telemetry", long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(long)]
    config: PathBuf,

    /// Start of the range (default: yesterday 00:00 UTC)
    #[arg(long)]
    from: Option<String>,

    /// End of the range (default: now)
    #[arg(long)]
    until: Option<String>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn start_of_yesterday(now: DateTime<Utc>) -> DateTime<Utc> {
    let midnight = now.date_naive().and_time(chrono::NaiveTime::MIN).and_utc();
    midnight - Duration::days(1)
}

fn resolve_range(args: &Args, zone: LocalZone, now: DateTime<Utc>) -> Result<Span> {
    let start = match args.from.as_deref() {
        Some(text) => parse_timestamp(text, zone).with_context(|| format!("Invalid --from {:?}", text))?,
        None => start_of_yesterday(now),
    };
    let end = match args.until.as_deref() {
        Some(text) => parse_timestamp(text, zone).with_context(|| format!("Invalid --until {:?}", text))?,
        None => now,
    };
    if end < start {
        anyhow::bail!("--until {} is before --from {}", end, start);
    }
    Ok(Span::new(start, end))
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = Config::load(&args.config).context("Loading configuration")?;
    let range = resolve_range(&args, config.time.local_zone(), Utc::now())?;

    let telemetry = SampleLog::load(&config.telemetry.path).context("Loading telemetry")?;
    let mut store = JsonStore::open(&config.store.dir).context("Opening record store")?;
    log::info!("Record store at {}", store.dir().display());

    let report = find_activity(&telemetry, &mut store, range, &config)?;
    for failure in &report.failures {
        eprintln!("Skipped {}: {}", failure.wearer, failure.reason);
    }
    println!(
        "{} wearers, {} segments, {} bilateral windows stored",
        report.wearers, report.segments_stored, report.windows_stored
    );
    Ok(())
}
