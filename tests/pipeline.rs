// Corpus pipeline integration tests
mod common;

use common::{page_count, pdfs_under, size_kb, PdfFixture, BLUE, YELLOW};
use rstest::rstest;
use si_multitool::config::NO_OVERSIZED_SENTINEL;
use si_multitool::{
    ColorClass, CopySelection, CorpusWalker, LogReporter, LopdfEngine, ProgressReporter,
    ProgressUpdate, ReportAggregator, Settings, SizeManager, SizeOutcome, WalkMode, WalkSummary,
};
use std::fs;
use std::path::{Path, PathBuf};

fn fast_settings() -> Settings {
    let mut settings = Settings::default();
    settings.retry.backoff_ms = 0;
    settings
}

fn run(root: &Path, out: &Path, settings: &Settings, mode: WalkMode) -> WalkSummary {
    let engine = LopdfEngine;
    let summary = CorpusWalker::new(&engine, settings, out)
        .walk(root, mode, &mut LogReporter)
        .unwrap();
    ReportAggregator::new(out, settings.reports.clone())
        .finalize(&summary)
        .unwrap();
    summary
}

#[derive(Default)]
struct Recorder {
    started: Option<usize>,
    skipped: Vec<String>,
    updates: Vec<(PathBuf, String, f64, f64)>,
    finished: bool,
}

impl ProgressReporter for Recorder {
    fn pass_started(&mut self, _mode: WalkMode, total: usize) {
        self.started = Some(total);
    }
    fn branch_skipped(&mut self, branch: &str) {
        self.skipped.push(branch.to_string());
    }
    fn document_done(&mut self, update: &ProgressUpdate<'_>) {
        self.updates.push((
            update.document.to_path_buf(),
            update.branch.to_string(),
            update.branch_percent,
            update.overall_percent,
        ));
    }
    fn pass_finished(&mut self, _summary: &WalkSummary) {
        self.finished = true;
    }
}

#[test]
fn end_to_end_split_then_extract() {
    let corpus = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let model_dir = corpus.path().join("Ford/2019/F150");

    let manual = PdfFixture::new(12)
        .padded_to_kb(2000)
        .write(&model_dir.join("Service Manual (Engine).pdf"));
    PdfFixture::new(2)
        .highlight(0, YELLOW)
        .highlight(1, BLUE)
        .padded_to_kb(500)
        .write(&model_dir.join("Pad Replacement (Brakes).pdf"));
    assert!(size_kb(&manual) > 1400.0);

    let settings = fast_settings();
    let sizing = run(corpus.path(), out.path(), &settings, WalkMode::EnforceSizeLimits);

    assert_eq!(sizing.failures, 0);
    assert!(sizing
        .outcomes
        .contains(&(manual.clone(), SizeOutcome::SplitIntoParts(3))));
    assert!(!manual.exists());

    let part_dir = model_dir.join("Service Manual (Engine)");
    let parts = pdfs_under(&part_dir);
    let names: Vec<String> = parts
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec![
            "Service Manual (Engine) part-1.pdf",
            "Service Manual (Engine) part-2.pdf",
            "Service Manual (Engine) part-3.pdf",
        ]
    );
    let counts: Vec<usize> = parts.iter().map(|p| page_count(p)).collect();
    assert_eq!(counts, vec![5, 5, 2]);
    assert!(parts.iter().all(|p| size_kb(p) < 1400.0));

    assert!(sizing.oversized.is_empty());
    let size_report = fs::read_to_string(out.path().join("oversized_files_report.csv")).unwrap();
    assert_eq!(size_report.trim(), NO_OVERSIZED_SENTINEL);

    let extraction = run(corpus.path(), out.path(), &settings, WalkMode::ExtractHighlights);
    assert_eq!(extraction.documents_total, 4);
    assert_eq!(extraction.highlights.len(), 2);
    let colors: Vec<ColorClass> = extraction.highlights.iter().map(|r| r.color).collect();
    assert_eq!(colors, vec![ColorClass::Yellow, ColorClass::Blue]);
    for record in &extraction.highlights {
        assert_eq!(
            (
                record.year.as_str(),
                record.make.as_str(),
                record.model.as_str(),
                record.system.as_str()
            ),
            ("2019", "Ford", "F150", "Brakes")
        );
    }
    assert_eq!(extraction.highlights[0].text, "Step 1 check pads");
    assert_eq!(extraction.highlights[1].text, "Step 2 check pads");

    let mut reader = csv::Reader::from_path(out.path().join("Extracted Highlights.csv")).unwrap();
    let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(headers, vec!["Year", "Make", "Model", "System", "Text", "Color"]);
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[0][5], "Yellow");
    assert_eq!(&rows[1][5], "Blue");
}

#[test]
fn progress_reaches_one_hundred_percent() {
    let corpus = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    for path in [
        "Ford/2019/F150/A (Brakes).pdf",
        "Ford/2020/Ranger/B (Body).pdf",
        "Honda/2018/Civic/C (HVAC).pdf",
    ] {
        PdfFixture::new(1).write(&corpus.path().join(path));
    }
    fs::create_dir_all(corpus.path().join("Kia/2021/Soul")).unwrap();

    let settings = fast_settings();
    let engine = LopdfEngine;
    let mut recorder = Recorder::default();
    let summary = CorpusWalker::new(&engine, &settings, out.path())
        .walk(corpus.path(), WalkMode::ExtractHighlights, &mut recorder)
        .unwrap();

    assert_eq!(recorder.started, Some(3));
    assert_eq!(recorder.skipped, vec!["Kia"]);
    assert!(recorder.finished);
    let branch_pcts: Vec<f64> = recorder.updates.iter().map(|u| u.2).collect();
    assert_eq!(branch_pcts, vec![50.0, 100.0, 100.0]);
    assert_eq!(recorder.updates.last().unwrap().3, 100.0);
    assert_eq!(summary.documents_processed, 3);
    // Tagged documents without highlights produce nothing
    assert!(summary.highlights.is_empty());
    assert!(!out.path().join("Extracted Highlights.csv").exists());
}

#[test]
fn empty_corpus_finishes_cleanly() {
    let corpus = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    fs::create_dir_all(corpus.path().join("Ford/2019")).unwrap();

    let settings = fast_settings();
    let engine = LopdfEngine;
    let mut recorder = Recorder::default();
    let summary = CorpusWalker::new(&engine, &settings, out.path())
        .walk(corpus.path(), WalkMode::EnforceSizeLimits, &mut recorder)
        .unwrap();
    ReportAggregator::new(out.path(), settings.reports.clone())
        .finalize(&summary)
        .unwrap();

    assert_eq!(recorder.started, Some(0));
    assert!(recorder.updates.is_empty());
    assert_eq!(summary.documents_total, 0);
    let report = fs::read_to_string(out.path().join("oversized_files_report.csv")).unwrap();
    assert_eq!(report.trim(), NO_OVERSIZED_SENTINEL);
}

#[rstest]
#[case(6, 2)]
#[case(10, 2)]
#[case(11, 3)]
#[case(13, 3)]
fn split_preserves_every_page(#[case] pages: usize, #[case] parts: usize) {
    let dir = tempfile::tempdir().unwrap();
    let original = PdfFixture::new(pages)
        .padded_to_kb(120)
        .write(&dir.path().join("Manual (Engine).pdf"));

    let mut settings = fast_settings();
    settings.size.split_threshold_kb = 100.0;
    let engine = LopdfEngine;
    let outcome = SizeManager::new(&engine, &settings)
        .enforce_size_limit(&original)
        .unwrap();

    assert_eq!(outcome, SizeOutcome::SplitIntoParts(parts));
    assert!(!original.exists());
    let written = pdfs_under(&dir.path().join("Manual (Engine)"));
    assert_eq!(written.len(), parts);
    let counts: Vec<usize> = written.iter().map(|p| page_count(p)).collect();
    assert!(counts.iter().all(|&c| c <= 5));
    assert_eq!(counts.iter().sum::<usize>(), pages);
}

#[test]
fn failed_split_restores_the_original() {
    let dir = tempfile::tempdir().unwrap();
    let original = PdfFixture::new(6)
        .padded_to_kb(120)
        .write(&dir.path().join("Manual (Engine).pdf"));
    let before = fs::read(&original).unwrap();
    // A directory where part 2 should go makes its save fail after part 1 landed
    let folder = dir.path().join("Manual (Engine)");
    fs::create_dir_all(folder.join("Manual (Engine) part-2.pdf")).unwrap();

    let mut settings = fast_settings();
    settings.size.split_threshold_kb = 100.0;
    let engine = LopdfEngine;
    let result = SizeManager::new(&engine, &settings).enforce_size_limit(&original);

    assert!(result.is_err());
    assert_eq!(fs::read(&original).unwrap(), before);
    let leftover_files: Vec<PathBuf> = fs::read_dir(&folder)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.is_file())
        .collect();
    assert!(leftover_files.is_empty(), "partial output left: {:?}", leftover_files);
}

#[test]
fn recompression_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = PdfFixture::new(3)
        .with_garbage_kb(64)
        .write(&dir.path().join("Wiring (Electrical).pdf"));
    let before = size_kb(&path);

    let settings = fast_settings();
    let engine = LopdfEngine;
    let manager = SizeManager::new(&engine, &settings);

    assert_eq!(manager.enforce_size_limit(&path).unwrap(), SizeOutcome::RecompressedInPlace);
    let after_first = size_kb(&path);
    assert!(after_first < before);
    assert_eq!(page_count(&path), 3);

    assert_eq!(manager.enforce_size_limit(&path).unwrap(), SizeOutcome::Unchanged);
    assert_eq!(size_kb(&path), after_first);
}

#[test]
fn single_page_document_over_threshold_stays_oversized() {
    let corpus = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let path = PdfFixture::new(1)
        .padded_to_kb(80)
        .write(&corpus.path().join("Ford/2019/F150/Poster (Body).pdf"));

    let mut settings = fast_settings();
    settings.size.split_threshold_kb = 50.0;
    let summary = run(corpus.path(), out.path(), &settings, WalkMode::EnforceSizeLimits);

    assert!(path.exists());
    assert!(matches!(summary.outcomes[0].1, SizeOutcome::StillOversized(_)));
    assert_eq!(summary.oversized.len(), 1);
    assert_eq!(summary.oversized[0].system, "Body");

    let mut reader = csv::Reader::from_path(out.path().join("oversized_files_report.csv")).unwrap();
    let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(headers, vec!["Year", "Make", "Model", "System", "FileSizeKB"]);
    let row = reader.records().next().unwrap().unwrap();
    assert_eq!(&row[0], "2019");
    assert!(row[4].ends_with(" KB"));
}

#[test]
fn unreadable_documents_do_not_stop_the_pass() {
    let corpus = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let model_dir = corpus.path().join("Ford/2019/F150");
    fs::create_dir_all(&model_dir).unwrap();
    let broken = model_dir.join("Broken (ABS).pdf");
    fs::write(&broken, b"this is not a pdf").unwrap();
    PdfFixture::new(1)
        .highlight(0, YELLOW)
        .write(&model_dir.join("Fine (Brakes).pdf"));

    let settings = fast_settings();
    let extraction = run(corpus.path(), out.path(), &settings, WalkMode::ExtractHighlights);
    assert_eq!(extraction.failures, 1);
    assert_eq!(extraction.highlights.len(), 2);
    let placeholder = &extraction.highlights[0];
    assert_eq!(placeholder.text, "could not open");
    assert_eq!(placeholder.color, ColorClass::Unknown);
    assert_eq!(placeholder.system, "ABS");

    let sizing = run(corpus.path(), out.path(), &settings, WalkMode::EnforceSizeLimits);
    assert_eq!(sizing.failures, 1);
    assert_eq!(sizing.outcomes.len(), 1);
    assert_eq!(fs::read(&broken).unwrap(), b"this is not a pdf");
}

#[test]
fn missing_system_tag_yields_placeholder() {
    let corpus = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    PdfFixture::new(1)
        .highlight(0, BLUE)
        .write(&corpus.path().join("Ford/2019/F150/Untagged.pdf"));

    let summary = run(corpus.path(), out.path(), &fast_settings(), WalkMode::ExtractHighlights);
    assert_eq!(summary.highlights.len(), 1);
    assert_eq!(summary.highlights[0].text, "no system found in file name");
    assert_eq!(summary.highlights[0].make, "Ford");
    assert_eq!(summary.failures, 0);
}

#[rstest]
#[case(CopySelection::Yellow, "Mixed (Brakes)_Yellow.pdf", 1)]
#[case(CopySelection::Blue, "Mixed (Brakes)_Blue.pdf", 1)]
#[case(CopySelection::YellowAndBlue, "Mixed (Brakes)_YB.pdf", 2)]
fn copies_highlighted_pages(
    #[case] selection: CopySelection,
    #[case] name: &str,
    #[case] pages: usize,
) {
    let corpus = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let model_dir = corpus.path().join("Ford/2019/F150");
    PdfFixture::new(3)
        .highlight(0, YELLOW)
        .highlight(2, BLUE)
        .write(&model_dir.join("Mixed (Brakes).pdf"));
    PdfFixture::new(2)
        .highlight(1, YELLOW)
        .write(&model_dir.join("Only Yellow (Body).pdf"));

    let summary = run(corpus.path(), out.path(), &fast_settings(), WalkMode::CopyPages(selection));
    let copy = out.path().join(name);
    assert!(summary.copies.contains(&copy));
    assert_eq!(page_count(&copy), pages);

    let only_yellow_copies = summary
        .copies
        .iter()
        .filter(|p| p.to_string_lossy().contains("Only Yellow"))
        .count();
    let expected_yellow_only = usize::from(selection == CopySelection::Yellow);
    assert_eq!(only_yellow_copies, expected_yellow_only);
}

#[test]
fn missing_root_is_fatal() {
    let out = tempfile::tempdir().unwrap();
    let settings = fast_settings();
    let engine = LopdfEngine;
    let err = CorpusWalker::new(&engine, &settings, out.path())
        .walk(Path::new("/no/such/corpus"), WalkMode::ExtractHighlights, &mut LogReporter)
        .unwrap_err();
    assert!(err.is_fatal());
}
