//! Boundaries to the outside world: where samples come from, where
//! derived records go, and where diagnostic slices are dumped.

pub mod export;
pub mod json_store;
pub mod telemetry_log;

pub use export::{export_slice, sheet_name, SheetExporter, WindowSink, MAX_SHEET_ROWS};
pub use json_store::JsonStore;
pub use telemetry_log::SampleLog;

use chrono::{DateTime, Utc};

use crate::error::{FetchError, StoreError};
use crate::interval::Span;
use crate::types::{
    ActivitySegment, BilateralWindow, EffectiveMovementInterval, GaitInterval, Limb, LimbPair, Sample,
};
use crate::validation::Validate;

/// Time-series telemetry store.
pub trait TelemetrySource {
    /// Samples of one wearer and limb with `start <= t <= end`, time-ordered.
    fn fetch_samples(
        &self,
        wearer: &str,
        limb: Limb,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Sample>, FetchError>;

    /// Samples of both limbs of one wearer, time-ordered.
    fn fetch_wearer_samples(
        &self,
        wearer: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Sample>, FetchError>;

    /// Distinct wearer identities reporting inside the range.
    fn wearers_in_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<String>, FetchError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TableKind {
    ActivitySegment,
    BilateralWindow,
    EffectiveMovement,
    EffectiveGait,
}

impl TableKind {
    pub fn table_name(&self) -> &'static str {
        match self {
            TableKind::ActivitySegment => "activity_segment",
            TableKind::BilateralWindow => "bilateral_window",
            TableKind::EffectiveMovement => "effective_movement",
            TableKind::EffectiveGait => "effective_gait",
        }
    }
}

/// A batch of records bound for one table.
#[derive(Clone, Copy, Debug)]
pub enum Records<'a> {
    Segments(&'a [ActivitySegment]),
    Windows(&'a [BilateralWindow]),
    Movements(&'a [EffectiveMovementInterval]),
    Gait(&'a [GaitInterval]),
}

impl Records<'_> {
    pub fn kind(&self) -> TableKind {
        match self {
            Records::Segments(_) => TableKind::ActivitySegment,
            Records::Windows(_) => TableKind::BilateralWindow,
            Records::Movements(_) => TableKind::EffectiveMovement,
            Records::Gait(_) => TableKind::EffectiveGait,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Records::Segments(r) => r.len(),
            Records::Windows(r) => r.len(),
            Records::Movements(r) => r.len(),
            Records::Gait(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ids assigned by [`RecordStore::persist_activity`], in input order.
#[derive(Clone, Debug, PartialEq)]
pub struct ActivityIds {
    pub segments: LimbPair<Vec<i64>>,
    pub windows: Vec<i64>,
}

/// Reject the batch on the first record failing its shape check.
pub fn check_batch<T: Validate>(kind: TableKind, records: &[T]) -> Result<(), StoreError> {
    for record in records {
        record.validate().map_err(|e| StoreError::Rejected {
            table: kind.table_name(),
            reason: e.to_string(),
        })?;
    }
    Ok(())
}

/// Point each window at the stored ids of its source segments.
pub fn link_segment_ids(windows: &mut [BilateralWindow], left: &[i64], right: &[i64]) {
    for window in windows {
        window.segment_ids = LimbPair::new(
            left.get(window.segment_indices.left).copied(),
            right.get(window.segment_indices.right).copied(),
        );
    }
}

/// Relational store for derived records.
pub trait RecordStore {
    /// Store a batch and return the identifiers assigned, in input order.
    /// The batch is rejected as a whole when any record fails validation.
    fn persist(&mut self, records: Records<'_>) -> Result<Vec<i64>, StoreError>;

    /// Store one wearer's segments and the windows built from them, linking
    /// each window to its segment ids.
    ///
    /// All three batches are validated before anything is written. This
    /// default then persists them one after another, so a later I/O failure
    /// can still leave segments behind; stores able to commit both tables
    /// together should override it.
    fn persist_activity(
        &mut self,
        left: &[ActivitySegment],
        right: &[ActivitySegment],
        windows: &[BilateralWindow],
    ) -> Result<ActivityIds, StoreError> {
        check_batch(TableKind::ActivitySegment, left)?;
        check_batch(TableKind::ActivitySegment, right)?;
        check_batch(TableKind::BilateralWindow, windows)?;

        let left_ids = self.persist(Records::Segments(left))?;
        let right_ids = self.persist(Records::Segments(right))?;
        let mut linked = windows.to_vec();
        link_segment_ids(&mut linked, &left_ids, &right_ids);
        let window_ids = self.persist(Records::Windows(&linked))?;
        Ok(ActivityIds {
            segments: LimbPair::new(left_ids, right_ids),
            windows: window_ids,
        })
    }

    /// Windows with the given ids; unknown ids are skipped.
    fn bilateral_windows_by_ids(&self, ids: &[i64]) -> Result<Vec<BilateralWindow>, StoreError>;

    /// Windows intersecting `[start, end]`, ordered by id.
    fn bilateral_windows_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BilateralWindow>, StoreError>;

    fn activity_segments(
        &self,
        wearer: Option<&str>,
        range: Option<Span>,
    ) -> Result<Vec<ActivitySegment>, StoreError>;

    /// Flag windows as containing effective gait. Returns how many changed.
    fn mark_effective(&mut self, ids: &[i64]) -> Result<usize, StoreError>;
}
