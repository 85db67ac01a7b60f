// Core types for the S.I. Multi-Tool pipeline
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::config::NOT_AVAILABLE;

/// Highlight color label. Yellow and Blue come from the classifier;
/// Unknown marks placeholders and strokes with no readable RGB color.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorClass {
    Yellow,
    Blue,
    Unknown,
}

impl ColorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorClass::Yellow => "Yellow",
            ColorClass::Blue => "Blue",
            ColorClass::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ColorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stroke color with channels in [0, 1].
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RgbColor {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl RgbColor {
    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    pub fn distance(&self, other: &RgbColor) -> f64 {
        let dr = self.r - other.r;
        let dg = self.g - other.g;
        let db = self.b - other.b;
        (dr * dr + dg * dg + db * db).sqrt()
    }
}

impl From<(f64, f64, f64)> for RgbColor {
    fn from((r, g, b): (f64, f64, f64)) -> Self {
        Self { r, g, b }
    }
}

/// Axis-aligned rectangle in PDF user space (origin bottom-left).
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    /// Builds a rectangle from two corners in any order.
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// Identity fields derived from a document's path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PathMetadata {
    pub year: String,
    pub make: String,
    pub model: String,
    pub system: String,
}

impl Default for PathMetadata {
    fn default() -> Self {
        Self {
            year: NOT_AVAILABLE.to_string(),
            make: NOT_AVAILABLE.to_string(),
            model: NOT_AVAILABLE.to_string(),
            system: NOT_AVAILABLE.to_string(),
        }
    }
}

impl PathMetadata {
    pub fn has_system(&self) -> bool {
        self.system != NOT_AVAILABLE
    }
}

/// One row of the highlight report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HighlightRecord {
    pub year: String,
    pub make: String,
    pub model: String,
    pub system: String,
    pub text: String,
    pub color: ColorClass,
}

impl HighlightRecord {
    pub fn new(metadata: &PathMetadata, text: impl Into<String>, color: ColorClass) -> Self {
        Self {
            year: metadata.year.clone(),
            make: metadata.make.clone(),
            model: metadata.model.clone(),
            system: metadata.system.clone(),
            text: text.into(),
            color,
        }
    }
}

/// One row of the oversized-files report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OversizedFileRecord {
    #[serde(rename = "Year")]
    pub year: String,
    #[serde(rename = "Make")]
    pub make: String,
    #[serde(rename = "Model")]
    pub model: String,
    #[serde(rename = "System")]
    pub system: String,
    #[serde(rename = "FileSizeKB")]
    pub file_size_kb: String,
}

impl OversizedFileRecord {
    pub fn new(metadata: &PathMetadata, size_kb: f64) -> Self {
        Self {
            year: metadata.year.clone(),
            make: metadata.make.clone(),
            model: metadata.model.clone(),
            system: metadata.system.clone(),
            file_size_kb: format!("{:.2} KB", size_kb),
        }
    }
}

/// Result of enforcing the size policy on one document.
#[derive(Debug, Clone, PartialEq)]
pub enum SizeOutcome {
    Unchanged,
    RecompressedInPlace,
    SplitIntoParts(usize),
    StillOversized(f64),
}

impl fmt::Display for SizeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeOutcome::Unchanged => write!(f, "unchanged"),
            SizeOutcome::RecompressedInPlace => write!(f, "recompressed"),
            SizeOutcome::SplitIntoParts(n) => write!(f, "split into {} parts", n),
            SizeOutcome::StillOversized(kb) => write!(f, "still oversized ({:.2} KB)", kb),
        }
    }
}

// Error types
#[derive(Debug, thiserror::Error)]
pub enum MultiToolError {
    #[error("could not open {}: {}", .path.display(), .reason)]
    DocumentOpen { path: PathBuf, reason: String },

    #[error("PDF engine error: {0}")]
    Engine(String),

    #[error("I/O failure on {}: {}", .path.display(), .source)]
    TransientIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot process {}: {}", .path.display(), .reason)]
    FatalTraversal { path: PathBuf, reason: String },

    #[error("report error: {0}")]
    Report(#[from] csv::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MultiToolError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MultiToolError::TransientIo {
            path: path.into(),
            source,
        }
    }

    pub fn fatal(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        MultiToolError::FatalTraversal {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Only fatal failures abort a whole pass.
    pub fn is_fatal(&self) -> bool {
        matches!(self, MultiToolError::FatalTraversal { .. })
    }
}

impl From<lopdf::Error> for MultiToolError {
    fn from(err: lopdf::Error) -> Self {
        MultiToolError::Engine(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MultiToolError>;
