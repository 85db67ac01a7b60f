// S.I. Multi-Tool - highlight extraction and size management for service-information PDFs
pub mod color;
pub mod config;
pub mod highlights;
pub mod page_copier;
pub mod path_metadata;
pub mod pdf_engine;
pub mod report;
pub mod size_manager;
pub mod types;
pub mod walker;

pub use config::Settings;
pub use highlights::HighlightExtractor;
pub use page_copier::CopySelection;
pub use path_metadata::PathMetadataResolver;
pub use pdf_engine::{LopdfEngine, PdfDocument, PdfEngine};
pub use report::ReportAggregator;
pub use size_manager::{RetryPolicy, SizeManager};
pub use types::{
    ColorClass, HighlightRecord, MultiToolError, OversizedFileRecord, PathMetadata, Result,
    RgbColor, SizeOutcome,
};
pub use walker::{CorpusWalker, LogReporter, ProgressReporter, ProgressUpdate, WalkMode, WalkSummary};
