// Report output - CSV files for highlight and size passes
use log::info;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::{ReportSettings, NO_OVERSIZED_SENTINEL};
use crate::pdf_engine::write_atomically;
use crate::types::{HighlightRecord, MultiToolError, OversizedFileRecord, Result};
use crate::walker::{WalkMode, WalkSummary};

/// Writes pass results into an output directory.
pub struct ReportAggregator {
    output_dir: PathBuf,
    names: ReportSettings,
}

impl ReportAggregator {
    pub fn new(output_dir: impl Into<PathBuf>, names: ReportSettings) -> Self {
        Self {
            output_dir: output_dir.into(),
            names,
        }
    }

    pub fn highlight_report_path(&self) -> PathBuf {
        self.output_dir.join(&self.names.highlight_file)
    }

    pub fn oversized_report_path(&self) -> PathBuf {
        self.output_dir.join(&self.names.oversized_file)
    }

    /// Writes whatever report belongs to the summary's pass. Returns the
    /// files written; none is a valid outcome.
    pub fn finalize(&self, summary: &WalkSummary) -> Result<Vec<PathBuf>> {
        let written = match summary.mode {
            WalkMode::ExtractHighlights => self.write_highlights(&summary.highlights)?.into_iter().collect(),
            WalkMode::EnforceSizeLimits => vec![self.write_oversized(&summary.oversized)?],
            WalkMode::CopyPages(_) => Vec::new(),
        };
        Ok(written)
    }

    /// Columns Year, Make, Model, System, Text, Color. Nothing is written
    /// when there are no records.
    pub fn write_highlights(&self, records: &[HighlightRecord]) -> Result<Option<PathBuf>> {
        if records.is_empty() {
            info!("No highlights found, no report written");
            return Ok(None);
        }
        let path = self.highlight_report_path();
        write_rows(&path, records)?;
        info!("Wrote {} highlight(s) to {}", records.len(), path.display());
        Ok(Some(path))
    }

    /// Columns Year, Make, Model, System, FileSizeKB, or a single sentinel
    /// line when nothing is oversized. The file always exists afterwards.
    pub fn write_oversized(&self, records: &[OversizedFileRecord]) -> Result<PathBuf> {
        let path = self.oversized_report_path();
        if records.is_empty() {
            let mut writer = csv::Writer::from_writer(Vec::new());
            writer.write_record([NO_OVERSIZED_SENTINEL])?;
            write_atomically(&path, &into_bytes(writer)?)?;
            info!("No oversized files, wrote sentinel to {}", path.display());
        } else {
            write_rows(&path, records)?;
            info!("Wrote {} oversized file(s) to {}", records.len(), path.display());
        }
        Ok(path)
    }
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    write_atomically(path, &into_bytes(writer)?)
}

fn into_bytes(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|e| MultiToolError::Io(e.into_error()))
}
