// Corpus traversal - make/year/model/files with exact progress accounting
use chrono::{DateTime, Local};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use walkdir::WalkDir;

use crate::config::{Settings, DOCUMENT_EXTENSION};
use crate::highlights::{is_open_failure, HighlightExtractor};
use crate::page_copier::{copy_highlighted_pages, CopySelection};
use crate::path_metadata::PathMetadataResolver;
use crate::pdf_engine::PdfEngine;
use crate::size_manager::SizeManager;
use crate::types::{HighlightRecord, MultiToolError, OversizedFileRecord, Result, SizeOutcome};

/// What a pass does to each document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkMode {
    ExtractHighlights,
    EnforceSizeLimits,
    CopyPages(CopySelection),
}

impl WalkMode {
    pub fn label(&self) -> &'static str {
        match self {
            WalkMode::ExtractHighlights => "Extracting highlights",
            WalkMode::EnforceSizeLimits => "Enforcing size limits",
            WalkMode::CopyPages(_) => "Copying pages",
        }
    }
}

/// Counters for one traversal. A fresh state is made for every pass.
#[derive(Debug, Clone)]
pub struct ProgressState {
    pub processed: usize,
    pub total: usize,
    pub branch_processed: usize,
    pub branch_total: usize,
    started_at: Instant,
}

impl ProgressState {
    pub fn new(total: usize) -> Self {
        Self {
            processed: 0,
            total,
            branch_processed: 0,
            branch_total: 0,
            started_at: Instant::now(),
        }
    }

    pub fn start_branch(&mut self, branch_total: usize) {
        self.branch_processed = 0;
        self.branch_total = branch_total;
    }

    pub fn record_document(&mut self) {
        self.processed += 1;
        self.branch_processed += 1;
    }

    /// 100 when there is nothing to process.
    pub fn overall_percent(&self) -> f64 {
        percent(self.processed, self.total)
    }

    pub fn branch_percent(&self) -> f64 {
        percent(self.branch_processed, self.branch_total)
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Linear extrapolation from the time spent so far.
    pub fn eta(&self) -> Option<Duration> {
        if self.processed == 0 {
            return None;
        }
        estimate_remaining(self.elapsed(), self.overall_percent())
    }
}

fn percent(done: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        done as f64 / total as f64 * 100.0
    }
}

fn estimate_remaining(elapsed: Duration, overall_percent: f64) -> Option<Duration> {
    if overall_percent <= 0.0 {
        return None;
    }
    let remaining = elapsed.as_secs_f64() / overall_percent * (100.0 - overall_percent);
    Some(Duration::from_secs_f64(remaining.max(0.0)))
}

/// Snapshot sent to the front end after each document.
#[derive(Debug, Clone)]
pub struct ProgressUpdate<'a> {
    pub document: &'a Path,
    pub branch: &'a str,
    pub branch_percent: f64,
    pub overall_percent: f64,
    pub processed: usize,
    pub total: usize,
    pub eta: Option<Duration>,
}

/// Receives progress callbacks. Only `document_done` is required.
pub trait ProgressReporter {
    fn pass_started(&mut self, _mode: WalkMode, _total: usize) {}
    fn branch_skipped(&mut self, _branch: &str) {}
    fn document_done(&mut self, update: &ProgressUpdate<'_>);
    fn pass_finished(&mut self, _summary: &WalkSummary) {}
}

/// Reports progress through the `log` facade.
#[derive(Debug, Default)]
pub struct LogReporter;

impl ProgressReporter for LogReporter {
    fn pass_started(&mut self, mode: WalkMode, total: usize) {
        info!("{}: {} document(s)", mode.label(), total);
    }

    fn branch_skipped(&mut self, branch: &str) {
        info!("Skipping {}: no documents", branch);
    }

    fn document_done(&mut self, update: &ProgressUpdate<'_>) {
        info!(
            "{} done. {}: {:.2}%, total: {:.2}%",
            update.document.display(),
            update.branch,
            update.branch_percent,
            update.overall_percent
        );
    }

    fn pass_finished(&mut self, summary: &WalkSummary) {
        info!("{}", summary.headline());
    }
}

/// One make-level directory with every document below it.
#[derive(Debug, Clone)]
pub struct Branch {
    pub name: String,
    pub path: PathBuf,
    pub documents: Vec<PathBuf>,
}

/// Everything a pass produced.
#[derive(Debug, Clone)]
pub struct WalkSummary {
    pub mode: WalkMode,
    pub started_at: DateTime<Local>,
    pub documents_total: usize,
    pub documents_processed: usize,
    pub failures: usize,
    pub skipped_branches: Vec<String>,
    pub highlights: Vec<HighlightRecord>,
    pub outcomes: Vec<(PathBuf, SizeOutcome)>,
    pub oversized: Vec<OversizedFileRecord>,
    pub copies: Vec<PathBuf>,
}

impl WalkSummary {
    fn new(mode: WalkMode, documents_total: usize) -> Self {
        Self {
            mode,
            started_at: Local::now(),
            documents_total,
            documents_processed: 0,
            failures: 0,
            skipped_branches: Vec::new(),
            highlights: Vec::new(),
            outcomes: Vec::new(),
            oversized: Vec::new(),
            copies: Vec::new(),
        }
    }

    /// One-line account of the pass, stamped with its local start time.
    pub fn headline(&self) -> String {
        format!(
            "{} started {}: {} of {} document(s) processed, {} failure(s)",
            self.mode.label(),
            self.started_at.format("%Y-%m-%d %H:%M:%S"),
            self.documents_processed,
            self.documents_total,
            self.failures
        )
    }

    pub fn parts_written(&self) -> usize {
        self.outcomes
            .iter()
            .map(|(_, outcome)| match outcome {
                SizeOutcome::SplitIntoParts(n) => *n,
                _ => 0,
            })
            .sum()
    }
}

/// Drives the per-document operations over a corpus tree.
pub struct CorpusWalker<'a, E: PdfEngine> {
    engine: &'a E,
    settings: &'a Settings,
    output_dir: PathBuf,
}

impl<'a, E: PdfEngine> CorpusWalker<'a, E> {
    pub fn new(engine: &'a E, settings: &'a Settings, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            settings,
            output_dir: output_dir.into(),
        }
    }

    pub fn walk(
        &self,
        root: &Path,
        mode: WalkMode,
        reporter: &mut dyn ProgressReporter,
    ) -> Result<WalkSummary> {
        preflight(root, &self.output_dir)?;

        // Exact total before anything is touched
        let branches = enumerate_corpus(root)?;
        let total = branches.iter().map(|b| b.documents.len()).sum();

        let resolver = PathMetadataResolver::new(self.settings.metadata.policy).with_root(root);
        let extractor = HighlightExtractor::new(self.engine);
        let sizer = SizeManager::new(self.engine, self.settings);

        let mut summary = WalkSummary::new(mode, total);
        let mut progress = ProgressState::new(total);
        reporter.pass_started(mode, total);

        for branch in &branches {
            if branch.documents.is_empty() {
                summary.skipped_branches.push(branch.name.clone());
                reporter.branch_skipped(&branch.name);
                continue;
            }

            progress.start_branch(branch.documents.len());
            for document in &branch.documents {
                match mode {
                    WalkMode::ExtractHighlights => {
                        let metadata = resolver.resolve(document);
                        let records = extractor.extract_file(document, &metadata);
                        if is_open_failure(&records) {
                            summary.failures += 1;
                        }
                        summary.highlights.extend(records);
                    }
                    WalkMode::EnforceSizeLimits => match sizer.enforce_size_limit(document) {
                        Ok(outcome) => summary.outcomes.push((document.clone(), outcome)),
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => {
                            warn!("Giving up on {}: {}", document.display(), e);
                            summary.failures += 1;
                        }
                    },
                    WalkMode::CopyPages(selection) => {
                        match copy_highlighted_pages(self.engine, document, selection, &self.output_dir) {
                            Ok(Some(copy)) => summary.copies.push(copy),
                            Ok(None) => {}
                            Err(e) => {
                                warn!("Could not copy pages from {}, skipping: {}", document.display(), e);
                                summary.failures += 1;
                            }
                        }
                    }
                }

                progress.record_document();
                summary.documents_processed += 1;
                reporter.document_done(&ProgressUpdate {
                    document,
                    branch: &branch.name,
                    branch_percent: progress.branch_percent(),
                    overall_percent: progress.overall_percent(),
                    processed: progress.processed,
                    total: progress.total,
                    eta: progress.eta(),
                });
            }
            debug!("Finished {}", branch.name);
        }

        if mode == WalkMode::EnforceSizeLimits {
            summary.oversized = self.sweep_oversized(root, &resolver, &sizer)?;
        }

        info!(
            "{} finished in {:.1}s",
            mode.label(),
            progress.elapsed().as_secs_f64()
        );
        reporter.pass_finished(&summary);
        Ok(summary)
    }

    /// Every document still above the split threshold, split parts included.
    fn sweep_oversized(
        &self,
        root: &Path,
        resolver: &PathMetadataResolver,
        sizer: &SizeManager<'_, E>,
    ) -> Result<Vec<OversizedFileRecord>> {
        let mut oversized = Vec::new();
        for document in enumerate_corpus(root)?.iter().flat_map(|b| &b.documents) {
            match sizer.oversized_record(document, &resolver.resolve(document)) {
                Ok(Some(record)) => {
                    warn!("{} is still {}", document.display(), record.file_size_kb);
                    oversized.push(record);
                }
                Ok(None) => {}
                Err(e) => warn!("Could not size {}: {}", document.display(), e),
            }
        }
        Ok(oversized)
    }
}

/// Root must be a readable directory; the output directory must be
/// creatable and writable.
pub fn preflight(root: &Path, output_dir: &Path) -> Result<()> {
    let meta = fs::metadata(root).map_err(|e| MultiToolError::fatal(root, e.to_string()))?;
    if !meta.is_dir() {
        return Err(MultiToolError::fatal(root, "not a directory"));
    }
    fs::read_dir(root).map_err(|e| MultiToolError::fatal(root, e.to_string()))?;

    fs::create_dir_all(output_dir).map_err(|e| MultiToolError::fatal(output_dir, e.to_string()))?;
    tempfile::tempfile_in(output_dir)
        .map_err(|e| MultiToolError::fatal(output_dir, format!("not writable: {}", e)))?;
    Ok(())
}

/// Lists make branches in name order, each with its documents collected
/// from `make/year/model` and everything below the model directory.
pub fn enumerate_corpus(root: &Path) -> Result<Vec<Branch>> {
    let makes = subdirectories(root).map_err(|e| MultiToolError::fatal(root, e.to_string()))?;

    let mut branches = Vec::with_capacity(makes.len());
    for make in makes {
        let mut documents = Vec::new();
        for year in subdirectories_or_warn(&make) {
            for model in subdirectories_or_warn(&year) {
                documents.extend(documents_under(&model));
            }
        }
        branches.push(Branch {
            name: dir_name(&make),
            path: make,
            documents,
        });
    }
    Ok(branches)
}

fn subdirectories(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn subdirectories_or_warn(dir: &Path) -> Vec<PathBuf> {
    subdirectories(dir).unwrap_or_else(|e| {
        warn!("Cannot list {}: {}", dir.display(), e);
        Vec::new()
    })
}

fn documents_under(model: &Path) -> Vec<PathBuf> {
    WalkDir::new(model)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Cannot read entry under {}: {}", model.display(), e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_document(entry.path()))
        .map(|entry| entry.into_path())
        .collect()
}

pub fn is_document(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(DOCUMENT_EXTENSION))
        .unwrap_or(false)
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"%PDF-1.5\n").unwrap();
    }

    #[test]
    fn headline_carries_start_time_and_counts() {
        let mut summary = WalkSummary::new(WalkMode::EnforceSizeLimits, 5);
        summary.started_at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
        summary.documents_processed = 4;
        summary.failures = 1;
        assert_eq!(
            summary.headline(),
            "Enforcing size limits started 2024-03-09 14:05:00: 4 of 5 document(s) processed, 1 failure(s)"
        );
    }

    #[test]
    fn empty_corpus_is_complete() {
        let state = ProgressState::new(0);
        assert_eq!(state.overall_percent(), 100.0);
        assert_eq!(state.branch_percent(), 100.0);
        assert!(state.eta().is_none());
    }

    #[test]
    fn percentages_reach_exactly_one_hundred() {
        let mut state = ProgressState::new(7);
        state.start_branch(3);
        for _ in 0..3 {
            state.record_document();
        }
        assert_eq!(state.branch_percent(), 100.0);
        state.start_branch(4);
        for _ in 0..4 {
            state.record_document();
        }
        assert_eq!(state.overall_percent(), 100.0);
        assert_eq!(state.eta(), Some(Duration::ZERO));
    }

    #[test]
    fn eta_extrapolates_linearly() {
        let eta = estimate_remaining(Duration::from_secs(10), 25.0).unwrap();
        assert_eq!(eta, Duration::from_secs(30));
        assert!(estimate_remaining(Duration::from_secs(10), 0.0).is_none());
    }

    #[test]
    fn enumerates_make_year_model_tree() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("Ford/2019/F150/Pads (Brakes).pdf"));
        touch(&root.join("Ford/2019/F150/Pads (Brakes)/Pads (Brakes) part-1.pdf"));
        touch(&root.join("Ford/2019/F150/notes.txt"));
        touch(&root.join("Ford/2020/Ranger/Wiper (Body).PDF"));
        touch(&root.join("Ford/stray.pdf"));
        fs::create_dir_all(root.join("Tesla/2021")).unwrap();

        let branches = enumerate_corpus(root).unwrap();
        let names: Vec<&str> = branches.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["Ford", "Tesla"]);
        assert_eq!(branches[0].documents.len(), 3);
        assert!(branches[1].documents.is_empty());
        assert!(branches[0]
            .documents
            .iter()
            .all(|p| p.file_name().unwrap() != "stray.pdf"));
    }

    #[test]
    fn missing_root_is_fatal() {
        let out = tempfile::tempdir().unwrap();
        let err = preflight(Path::new("/no/such/corpus"), out.path()).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn preflight_creates_output_dir() {
        let root = tempfile::tempdir().unwrap();
        let out = root.path().join("reports/nested");
        preflight(root.path(), &out).unwrap();
        assert!(out.is_dir());
        assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
    }

    #[test]
    fn extension_match_ignores_case() {
        assert!(is_document(Path::new("a.pdf")));
        assert!(is_document(Path::new("a.PDF")));
        assert!(!is_document(Path::new("a.pdf.bak")));
        assert!(!is_document(Path::new("pdf")));
    }
}
