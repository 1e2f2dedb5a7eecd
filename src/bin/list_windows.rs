use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::SecondsFormat;
use clap::Parser;
use regex::Regex;

use gait_monitor::cli::init_logging;
use gait_monitor::store::JsonStore;
use gait_monitor::timeutils::parse_timestamp;
use gait_monitor::{list_windows, Config};

#[derive(Parser, Debug)]
#[command(about = "List stored bilateral windows intersecting a time range", long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(long)]
    config: PathBuf,

    #[arg(long)]
    from: String,

    #[arg(long)]
    until: String,

    /// Only windows whose left or right wearer matches this regex
    #[arg(long)]
    pattern: Option<String>,

    /// Print window ids only, as a JSON list
    #[arg(long, short, default_value_t = false)]
    quiet: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let pattern = match args.pattern.as_deref() {
        Some(text) => Some(Regex::new(text).with_context(|| format!("Invalid --pattern {:?}", text))?),
        None => None,
    };

    let config = Config::load(&args.config).context("Loading configuration")?;
    let zone = config.time.local_zone();
    let start = parse_timestamp(&args.from, zone).with_context(|| format!("Invalid --from {:?}", args.from))?;
    let end = parse_timestamp(&args.until, zone).with_context(|| format!("Invalid --until {:?}", args.until))?;
    if end < start {
        anyhow::bail!("--until {} is before --from {}", end, start);
    }

    let store = JsonStore::open(&config.store.dir).context("Opening record store")?;
    let windows = list_windows(&store, start, end, pattern.as_ref())?;

    if args.quiet {
        let ids: Vec<i64> = windows.iter().filter_map(|w| w.id).collect();
        println!("{}", serde_json::to_string(&ids)?);
        return Ok(());
    }

    println!("{:>6}  {:<24}  {:<27}  {:<27}  {:>9}  effective", "id", "wearer", "start", "end", "seconds");
    for w in &windows {
        println!(
            "{:>6}  {:<24}  {:<27}  {:<27}  {:>9.1}  {}",
            w.id.unwrap_or_default(),
            w.wearers.left,
            w.start_time.to_rfc3339_opts(SecondsFormat::Millis, true),
            w.end_time.to_rfc3339_opts(SecondsFormat::Millis, true),
            w.duration,
            w.is_effective
        );
    }
    println!("{} windows", windows.len());
    Ok(())
}
