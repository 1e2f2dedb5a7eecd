//! Batch drivers behind the command-line tools.
//!
//! `find_activity` turns raw telemetry into stored segments and bilateral
//! windows. `find_gait` runs the detectors over stored windows.
//! `list_windows` is a read-only query.

use chrono::{DateTime, Utc};
use crossbeam::channel;
use regex::Regex;

use crate::config::Config;
use crate::error::{FetchError, StoreError};
use crate::gait::detect_effective_gait;
use crate::interval::Span;
use crate::intersect::intersect;
use crate::movement::{detect_effective_movement, MovementReport};
use crate::segmentation::build_segments;
use crate::store::{Records, RecordStore, TelemetrySource, WindowSink};
use crate::types::{ActivitySegment, BilateralWindow, GaitInterval, Limb, LimbWindow};

/// A wearer whose batch was abandoned.
#[derive(Clone, Debug, PartialEq)]
pub struct WearerFailure {
    pub wearer: String,
    pub reason: String,
}

#[derive(Clone, Debug, Default)]
pub struct ActivityReport {
    pub wearers: usize,
    pub segments_stored: usize,
    pub windows_stored: usize,
    pub failures: Vec<WearerFailure>,
}

/// Segments and windows of one wearer, not yet stored.
struct WearerActivity {
    left: Vec<ActivitySegment>,
    right: Vec<ActivitySegment>,
    windows: Vec<BilateralWindow>,
}

fn compute_wearer(
    telemetry: &(dyn TelemetrySource + Sync),
    wearer: &str,
    range: Span,
    gap_threshold_secs: f64,
) -> Result<WearerActivity, FetchError> {
    let samples = telemetry.fetch_wearer_samples(wearer, range.start, range.end)?;
    let left = build_segments(&samples, gap_threshold_secs, Limb::Left);
    let right = build_segments(&samples, gap_threshold_secs, Limb::Right);
    let windows = intersect(&left, &right);
    log::info!(
        "{}: {} samples, {} left / {} right segments, {} bilateral windows",
        wearer,
        samples.len(),
        left.len(),
        right.len(),
        windows.len()
    );
    Ok(WearerActivity { left, right, windows })
}

/// Fan wearers out to `workers` threads. Results come back in wearer order;
/// a wearer whose worker died is reported as a fetch failure.
fn compute_parallel(
    telemetry: &(dyn TelemetrySource + Sync),
    wearers: &[String],
    range: Span,
    gap_threshold_secs: f64,
    workers: usize,
) -> Vec<Result<WearerActivity, FetchError>> {
    let (task_tx, task_rx) = channel::bounded::<usize>(wearers.len());
    let (result_tx, result_rx) = channel::unbounded();
    for i in 0..wearers.len() {
        if task_tx.send(i).is_err() {
            break;
        }
    }
    drop(task_tx);

    let scoped = crossbeam::scope(|scope| {
        for _ in 0..workers.min(wearers.len()) {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move |_| {
                for i in task_rx.iter() {
                    let outcome = compute_wearer(telemetry, &wearers[i], range, gap_threshold_secs);
                    if result_tx.send((i, outcome)).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(result_tx);
    if scoped.is_err() {
        log::error!("A segmentation worker panicked");
    }

    let mut slots: Vec<Option<Result<WearerActivity, FetchError>>> = wearers.iter().map(|_| None).collect();
    for (i, outcome) in result_rx.iter() {
        slots[i] = Some(outcome);
    }
    slots
        .into_iter()
        .map(|slot| slot.unwrap_or_else(|| Err(FetchError::Unavailable("worker terminated".to_string()))))
        .collect()
}

fn store_wearer(store: &mut dyn RecordStore, activity: WearerActivity) -> Result<(usize, usize), StoreError> {
    let ids = store.persist_activity(&activity.left, &activity.right, &activity.windows)?;
    Ok((ids.segments.left.len() + ids.segments.right.len(), ids.windows.len()))
}

/// Segment and intersect the activity of every wearer reporting in `range`.
///
/// Only listing the wearers is fatal; fetch or store failures are recorded
/// per wearer and the batch moves on.
pub fn find_activity(
    telemetry: &(dyn TelemetrySource + Sync),
    store: &mut dyn RecordStore,
    range: Span,
    config: &Config,
) -> Result<ActivityReport, FetchError> {
    let wearers = telemetry.wearers_in_range(range.start, range.end)?;
    let gap = config.activity.gap_threshold_secs;
    log::info!(
        "{} wearers active between {} and {}",
        wearers.len(),
        range.start,
        range.end
    );

    let computed = if config.activity.workers > 1 && wearers.len() > 1 {
        compute_parallel(telemetry, &wearers, range, gap, config.activity.workers)
    } else {
        wearers
            .iter()
            .map(|wearer| compute_wearer(telemetry, wearer, range, gap))
            .collect()
    };

    let mut report = ActivityReport {
        wearers: wearers.len(),
        ..ActivityReport::default()
    };
    for (wearer, outcome) in wearers.iter().zip(computed) {
        let stored = match outcome {
            Ok(activity) => store_wearer(store, activity).map_err(|e| e.to_string()),
            Err(err) => Err(err.to_string()),
        };
        match stored {
            Ok((segments, windows)) => {
                report.segments_stored += segments;
                report.windows_stored += windows;
            }
            Err(reason) => {
                log::warn!("{}: skipped: {}", wearer, reason);
                report.failures.push(WearerFailure {
                    wearer: wearer.clone(),
                    reason,
                });
            }
        }
    }
    Ok(report)
}

/// Which stored bilateral windows to analyse.
#[derive(Clone, Debug, PartialEq)]
pub enum Selection {
    Ids(Vec<i64>),
    Range { start: DateTime<Utc>, end: DateTime<Utc> },
}

#[derive(Clone, Debug, Default)]
pub struct GaitReport {
    pub windows: Vec<BilateralWindow>,
    pub movement: MovementReport,
    pub gait: Vec<GaitInterval>,
    /// Windows newly flagged effective; zero unless saving.
    pub marked: usize,
    /// Persistence failures while saving; detection results are unaffected.
    pub store_errors: Vec<StoreError>,
}

pub fn load_windows(store: &dyn RecordStore, selection: &Selection) -> Result<Vec<BilateralWindow>, StoreError> {
    match selection {
        Selection::Ids(ids) => store.bilateral_windows_by_ids(ids),
        Selection::Range { start, end } => store.bilateral_windows_in_range(*start, *end),
    }
}

/// Windows of `windows` that contain some gait interval of their wearer.
fn windows_with_gait(windows: &[BilateralWindow], gait: &[GaitInterval]) -> Vec<i64> {
    windows
        .iter()
        .filter(|w| {
            let span = Span::new(w.start_time, w.end_time);
            gait.iter().any(|g| {
                w.wearers.left == g.wearer && span.overlap(&Span::new(g.start_time, g.end_time)).is_some()
            })
        })
        .filter_map(|w| w.id)
        .collect()
}

/// Detect effective movement and gait inside the selected windows.
///
/// With `save`, intervals are stored and windows containing gait are
/// flagged effective.
pub fn find_gait(
    telemetry: &dyn TelemetrySource,
    store: &mut dyn RecordStore,
    selection: &Selection,
    config: &Config,
    save: bool,
    sink: Option<&mut dyn WindowSink>,
) -> Result<GaitReport, StoreError> {
    let windows = load_windows(&*store, selection)?;
    log::info!("Analysing {} bilateral windows", windows.len());

    let rows: Vec<LimbWindow> = windows.iter().flat_map(|w| w.limb_windows()).collect();
    let movement = detect_effective_movement(
        &rows,
        telemetry,
        &config.movement,
        config.time.local_zone(),
        sink,
    );
    let gait = detect_effective_gait(&movement.intervals);

    let mut report = GaitReport {
        windows,
        movement,
        gait,
        ..GaitReport::default()
    };
    if !save {
        return Ok(report);
    }

    if let Err(err) = store.persist(Records::Movements(&report.movement.intervals)) {
        log::warn!("Effective movement not stored: {}", err);
        report.store_errors.push(err);
    }
    if let Err(err) = store.persist(Records::Gait(&report.gait)) {
        log::warn!("Effective gait not stored: {}", err);
        report.store_errors.push(err);
    }
    let effective = windows_with_gait(&report.windows, &report.gait);
    match store.mark_effective(&effective) {
        Ok(marked) => report.marked = marked,
        Err(err) => {
            log::warn!("Windows not flagged effective: {}", err);
            report.store_errors.push(err);
        }
    }
    Ok(report)
}

/// Stored windows intersecting `[start, end]`, optionally only those whose
/// left or right wearer identity matches `pattern`.
pub fn list_windows(
    store: &dyn RecordStore,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    pattern: Option<&Regex>,
) -> Result<Vec<BilateralWindow>, StoreError> {
    let windows = store.bilateral_windows_in_range(start, end)?;
    Ok(match pattern {
        Some(p) => windows.into_iter().filter(|w| w.wearer_matches(p)).collect(),
        None => windows,
    })
}
