//! Diagnostic dumps of the raw samples behind an evaluated window.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::ExportError;
use crate::types::{Limb, Sample};

/// Row limit of one sheet; longer slices are split into numbered parts.
pub const MAX_SHEET_ROWS: usize = 1_000_000;

const MAX_SHEET_NAME: usize = 25;

pub trait WindowSink {
    fn export(&mut self, sheet: &str, samples: &[Sample]) -> Result<(), ExportError>;
}

/// `{wearer}_{limb}_{HHMMSS}` cut to 25 characters.
pub fn sheet_name(wearer: &str, limb: Limb, start: DateTime<Utc>) -> String {
    format!("{}_{}_{}", wearer, limb, start.format("%H%M%S"))
        .chars()
        .take(MAX_SHEET_NAME)
        .collect()
}

/// Write one window's samples as `{sheet}_{n}` parts, `n` counting from 1.
/// Returns the number of parts written.
pub fn export_slice(
    sink: &mut dyn WindowSink,
    wearer: &str,
    limb: Limb,
    start: DateTime<Utc>,
    samples: &[Sample],
) -> Result<usize, ExportError> {
    let base = sheet_name(wearer, limb, start);
    let mut parts = 0;
    for (n, chunk) in samples.chunks(MAX_SHEET_ROWS).enumerate() {
        sink.export(&format!("{}_{}", base, n + 1), chunk)?;
        parts += 1;
    }
    Ok(parts)
}

/// Writes each sheet to `{dir}/{sheet}.json.gz`.
#[derive(Debug, Clone)]
pub struct SheetExporter {
    dir: PathBuf,
}

impl SheetExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ExportError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(SheetExporter { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn sheet_path(&self, sheet: &str) -> PathBuf {
        self.dir.join(format!("{}.json.gz", sheet))
    }
}

impl WindowSink for SheetExporter {
    fn export(&mut self, sheet: &str, samples: &[Sample]) -> Result<(), ExportError> {
        let file = File::create(self.sheet_path(sheet))?;
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        serde_json::to_writer(&mut encoder, samples)?;
        encoder.finish()?;
        log::debug!("Exported {} rows to sheet {}", samples.len(), sheet);
        Ok(())
    }
}
