use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{check_batch, link_segment_ids, ActivityIds, Records, RecordStore, TableKind};
use crate::error::StoreError;
use crate::interval::Span;
use crate::types::{ActivitySegment, BilateralWindow, LimbPair};
use crate::validation::Validate;

#[derive(Serialize, Deserialize)]
struct Table<T> {
    next_id: i64,
    rows: Vec<(i64, T)>,
}

impl<T: Clone> Table<T> {
    fn push_rows(&mut self, records: &[T]) -> Vec<i64> {
        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            let id = self.next_id;
            self.next_id += 1;
            self.rows.push((id, record.clone()));
            ids.push(id);
        }
        ids
    }
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Table {
            next_id: 1,
            rows: Vec::new(),
        }
    }
}

/// Record store backed by a directory with one `{table}.json` per table.
///
/// Ids are sequential per table and never reused. Every write replaces the
/// table file through a temporary sibling and a rename. One wearer's
/// segments and windows are staged together and only then renamed in.
#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(JsonStore { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn table_path(&self, kind: TableKind) -> PathBuf {
        self.dir.join(format!("{}.json", kind.table_name()))
    }

    fn read_table<T: DeserializeOwned>(&self, kind: TableKind) -> Result<Table<T>, StoreError> {
        let path = self.table_path(kind);
        if !path.exists() {
            return Ok(Table::default());
        }
        let reader = BufReader::new(File::open(&path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Write `table` next to its file without replacing it.
    fn stage_table<T: Serialize>(&self, kind: TableKind, table: &Table<T>) -> Result<PathBuf, StoreError> {
        let tmp = self.table_path(kind).with_extension("json.tmp");
        let written = File::create(&tmp).map_err(StoreError::from).and_then(|file| {
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, table)?;
            writer.flush()?;
            Ok(())
        });
        if let Err(err) = written {
            fs::remove_file(&tmp).ok();
            return Err(err);
        }
        Ok(tmp)
    }

    fn write_table<T: Serialize>(&self, kind: TableKind, table: &Table<T>) -> Result<(), StoreError> {
        let tmp = self.stage_table(kind, table)?;
        fs::rename(&tmp, self.table_path(kind))?;
        Ok(())
    }

    fn append<T>(&self, kind: TableKind, records: &[T]) -> Result<Vec<i64>, StoreError>
    where
        T: Serialize + DeserializeOwned + Validate + Clone,
    {
        check_batch(kind, records)?;
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let mut table: Table<T> = self.read_table(kind)?;
        let ids = table.push_rows(records);
        self.write_table(kind, &table)?;

        log::debug!("Persisted {} rows to {}", ids.len(), kind.table_name());
        Ok(ids)
    }

    fn windows(&self) -> Result<Vec<BilateralWindow>, StoreError> {
        let table: Table<BilateralWindow> = self.read_table(TableKind::BilateralWindow)?;
        Ok(table
            .rows
            .into_iter()
            .map(|(id, mut window)| {
                window.id = Some(id);
                window
            })
            .collect())
    }
}

impl RecordStore for JsonStore {
    fn persist(&mut self, records: Records<'_>) -> Result<Vec<i64>, StoreError> {
        let kind = records.kind();
        match records {
            Records::Segments(rows) => self.append(kind, rows),
            Records::Windows(rows) => self.append(kind, rows),
            Records::Movements(rows) => self.append(kind, rows),
            Records::Gait(rows) => self.append(kind, rows),
        }
    }

    fn persist_activity(
        &mut self,
        left: &[ActivitySegment],
        right: &[ActivitySegment],
        windows: &[BilateralWindow],
    ) -> Result<ActivityIds, StoreError> {
        check_batch(TableKind::ActivitySegment, left)?;
        check_batch(TableKind::ActivitySegment, right)?;
        check_batch(TableKind::BilateralWindow, windows)?;

        let mut ids = ActivityIds {
            segments: LimbPair::new(Vec::new(), Vec::new()),
            windows: Vec::new(),
        };
        if left.is_empty() && right.is_empty() && windows.is_empty() {
            return Ok(ids);
        }

        let mut segments: Table<ActivitySegment> = self.read_table(TableKind::ActivitySegment)?;
        ids.segments = LimbPair::new(segments.push_rows(left), segments.push_rows(right));

        // the window table is only touched when there is something to add
        let staged_windows = if windows.is_empty() {
            None
        } else {
            let mut table: Table<BilateralWindow> = self.read_table(TableKind::BilateralWindow)?;
            let mut linked = windows.to_vec();
            link_segment_ids(&mut linked, &ids.segments.left, &ids.segments.right);
            ids.windows = table.push_rows(&linked);
            Some(self.stage_table(TableKind::BilateralWindow, &table)?)
        };
        let staged_segments = match self.stage_table(TableKind::ActivitySegment, &segments) {
            Ok(path) => path,
            Err(err) => {
                if let Some(tmp) = staged_windows {
                    fs::remove_file(tmp).ok();
                }
                return Err(err);
            }
        };

        fs::rename(&staged_segments, self.table_path(TableKind::ActivitySegment))?;
        if let Some(tmp) = staged_windows {
            fs::rename(&tmp, self.table_path(TableKind::BilateralWindow))?;
        }
        log::debug!(
            "Persisted {} segments and {} windows",
            ids.segments.left.len() + ids.segments.right.len(),
            ids.windows.len()
        );
        Ok(ids)
    }

    fn bilateral_windows_by_ids(&self, ids: &[i64]) -> Result<Vec<BilateralWindow>, StoreError> {
        let wanted: HashSet<i64> = ids.iter().copied().collect();
        let windows: Vec<BilateralWindow> = self
            .windows()?
            .into_iter()
            .filter(|w| w.id.map_or(false, |id| wanted.contains(&id)))
            .collect();
        if windows.len() < wanted.len() {
            log::warn!(
                "{} of {} requested bilateral windows not found",
                wanted.len() - windows.len(),
                wanted.len()
            );
        }
        Ok(windows)
    }

    fn bilateral_windows_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BilateralWindow>, StoreError> {
        Ok(self
            .windows()?
            .into_iter()
            .filter(|w| w.intersects(start, end))
            .collect())
    }

    fn activity_segments(
        &self,
        wearer: Option<&str>,
        range: Option<Span>,
    ) -> Result<Vec<ActivitySegment>, StoreError> {
        let table: Table<ActivitySegment> = self.read_table(TableKind::ActivitySegment)?;
        Ok(table
            .rows
            .into_iter()
            .map(|(id, mut segment)| {
                segment.id = Some(id);
                segment
            })
            .filter(|s| wearer.map_or(true, |w| s.wearer == w))
            .filter(|s| range.map_or(true, |r| r.touches(&Span::new(s.start_time, s.end_time))))
            .collect())
    }

    fn mark_effective(&mut self, ids: &[i64]) -> Result<usize, StoreError> {
        let kind = TableKind::BilateralWindow;
        let mut table: Table<BilateralWindow> = self.read_table(kind)?;
        let known: HashSet<i64> = table.rows.iter().map(|(id, _)| *id).collect();
        if let Some(&missing) = ids.iter().find(|id| !known.contains(id)) {
            return Err(StoreError::NotFound {
                table: kind.table_name(),
                id: missing,
            });
        }

        let wanted: HashSet<i64> = ids.iter().copied().collect();
        let mut changed = 0;
        for (id, window) in table.rows.iter_mut() {
            if wanted.contains(id) && !window.is_effective {
                window.is_effective = true;
                changed += 1;
            }
        }
        if changed > 0 {
            self.write_table(kind, &table)?;
        }
        Ok(changed)
    }
}
