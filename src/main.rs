use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;

use gait_monitor::cli::init_logging;
use gait_monitor::store::{JsonStore, SampleLog, SheetExporter, WindowSink};
use gait_monitor::timeutils::{parse_timestamp, LocalZone};
use gait_monitor::{find_gait, Config, Selection};

#[derive(Parser, Debug)]
#[command(name = "gait_monitor")]
#[command(about = "Detect effective movement and gait inside stored bilateral windows", long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(long)]
    config: PathBuf,

    /// JSON list of bilateral window ids, e.g. "[3, 7]"
    #[arg(long, conflicts_with_all = ["from", "until"], required_unless_present = "from")]
    ids: Option<String>,

    /// Start of the window range
    #[arg(long, requires = "until")]
    from: Option<String>,

    /// End of the window range
    #[arg(long, requires = "from")]
    until: Option<String>,

    /// Directory for gzip sheets of the raw samples behind each window
    #[arg(long)]
    output: Option<PathBuf>,

    /// Store intervals and flag windows containing gait
    #[arg(long, default_value_t = false)]
    save: bool,

    /// Rows of each result table to print
    #[arg(long, default_value = "10")]
    head_rows: usize,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_time(text: &str, zone: LocalZone) -> Result<DateTime<Utc>> {
    parse_timestamp(text, zone).with_context(|| format!("Invalid time {:?}", text))
}

fn selection(args: &Args, zone: LocalZone) -> Result<Selection> {
    if let Some(ids) = args.ids.as_deref() {
        let ids: Vec<i64> = serde_json::from_str(ids).context("--ids must be a JSON list of integers")?;
        return Ok(Selection::Ids(ids));
    }
    match (args.from.as_deref(), args.until.as_deref()) {
        (Some(from), Some(until)) => {
            let start = parse_time(from, zone)?;
            let end = parse_time(until, zone)?;
            if end < start {
                anyhow::bail!("--until {} is before --from {}", end, start);
            }
            Ok(Selection::Range { start, end })
        }
        _ => anyhow::bail!("Provide --ids or both --from and --until"),
    }
}

fn head<T: serde::Serialize>(title: &str, rows: &[T], n: usize) -> Result<()> {
    println!("{} ({} rows)", title, rows.len());
    for row in rows.iter().take(n) {
        println!("  {}", serde_json::to_string(row)?);
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = Config::load(&args.config).context("Loading configuration")?;
    let selection = selection(&args, config.time.local_zone())?;

    let telemetry = SampleLog::load(&config.telemetry.path).context("Loading telemetry")?;
    let mut store = JsonStore::open(&config.store.dir).context("Opening record store")?;
    let mut exporter = match args.output.as_ref() {
        Some(dir) => Some(SheetExporter::new(dir).context("Creating output directory")?),
        None => None,
    };
    let sink = exporter.as_mut().map(|e| e as &mut dyn WindowSink);

    let report = find_gait(&telemetry, &mut store, &selection, &config, args.save, sink)?;

    head("Bilateral windows", &report.windows, args.head_rows)?;
    head("Effective movement", &report.movement.intervals, args.head_rows)?;
    head("Effective gait", &report.gait, args.head_rows)?;
    for diagnostic in &report.movement.diagnostics {
        eprintln!("{}", diagnostic);
    }
    println!(
        "{} of {} slices effective",
        report.movement.windows_passed, report.movement.windows_evaluated
    );
    if let Some(exporter) = exporter.as_ref() {
        println!("Sheets written to {}", exporter.dir().display());
    }
    if args.save {
        println!("{} windows flagged effective", report.marked);
        for err in &report.store_errors {
            eprintln!("Store error: {}", err);
        }
    }
    Ok(())
}
