// S.I. Multi-Tool CLI
use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;
use std::path::{Path, PathBuf};

use si_multitool::color;
use si_multitool::path_metadata::PathMetadataResolver;
use si_multitool::{
    CopySelection, CorpusWalker, LopdfEngine, ProgressReporter, ProgressUpdate, ReportAggregator,
    RgbColor, Settings, SizeOutcome, WalkMode, WalkSummary,
};

#[derive(Parser, Debug)]
#[command(name = "si-multitool", author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Hide the progress bar
    #[arg(short, long, global = true)]
    quiet: bool,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract highlight annotations into a CSV report
    Extract {
        /// Corpus root (make/year/model/documents)
        root: PathBuf,
        /// Directory for the report
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Recompress documents and split the oversized ones
    Compress {
        /// Corpus root (make/year/model/documents)
        root: PathBuf,
        /// Directory for the oversized-files report
        #[arg(short, long)]
        output: PathBuf,
        /// Split documents larger than this many KB
        #[arg(long)]
        split_threshold_kb: Option<f64>,
        /// Pages per split part
        #[arg(long)]
        pages_per_part: Option<usize>,
    },
    /// Copy pages carrying highlights of a color into new documents
    CopyPages {
        /// Corpus root (make/year/model/documents)
        root: PathBuf,
        /// Directory for the copied documents
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long, value_enum)]
        color: ColorArg,
    },
    /// Classify an RGB stroke color (channels in 0..1)
    Classify { r: f64, g: f64, b: f64 },
    /// Print the metadata resolved from a document path as JSON
    Resolve { path: PathBuf },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ColorArg {
    Yellow,
    Blue,
    Yb,
}

impl From<ColorArg> for CopySelection {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Yellow => CopySelection::Yellow,
            ColorArg::Blue => CopySelection::Blue,
            ColorArg::Yb => CopySelection::YellowAndBlue,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;

    match cli.command {
        Commands::Extract { root, output } => {
            let summary = run_pass(&settings, &root, &output, WalkMode::ExtractHighlights, cli.quiet)?;
            println!(
                "{} highlight record(s) from {} document(s)",
                summary.highlights.len(),
                summary.documents_processed
            );
        }
        Commands::Compress {
            root,
            output,
            split_threshold_kb,
            pages_per_part,
        } => {
            if let Some(kb) = split_threshold_kb {
                settings.size.split_threshold_kb = kb;
            }
            if let Some(pages) = pages_per_part {
                settings.size.pages_per_part = pages;
            }
            settings.validate().context("Invalid size options")?;

            let summary = run_pass(&settings, &root, &output, WalkMode::EnforceSizeLimits, cli.quiet)?;
            print_size_tally(&summary);
        }
        Commands::CopyPages { root, output, color } => {
            let mode = WalkMode::CopyPages(color.into());
            let summary = run_pass(&settings, &root, &output, mode, cli.quiet)?;
            for copy in &summary.copies {
                println!("{}", copy.display());
            }
        }
        Commands::Classify { r, g, b } => {
            println!("{}", color::classify(RgbColor::new(r, g, b)));
        }
        Commands::Resolve { path } => {
            let resolver = PathMetadataResolver::new(settings.metadata.policy);
            let metadata = resolver.resolve(&path);
            println!("{}", serde_json::to_string_pretty(&metadata)?);
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn run_pass(
    settings: &Settings,
    root: &Path,
    output: &Path,
    mode: WalkMode,
    quiet: bool,
) -> Result<WalkSummary> {
    let engine = LopdfEngine;
    let walker = CorpusWalker::new(&engine, settings, output);
    let mut reporter = BarReporter::new(quiet);

    let summary = walker
        .walk(root, mode, &mut reporter)
        .with_context(|| format!("{} failed for {}", mode.label(), root.display()))?;

    let written = ReportAggregator::new(output, settings.reports.clone())
        .finalize(&summary)
        .context("Failed to write report")?;
    println!("{}", summary.headline());
    for path in written {
        println!("Report: {}", path.display());
    }
    if summary.failures > 0 {
        eprintln!("{} document(s) could not be processed, see log", summary.failures);
    }
    Ok(summary)
}

fn print_size_tally(summary: &WalkSummary) {
    let mut recompressed = 0;
    let mut unchanged = 0;
    let mut split = 0;
    let mut still_oversized = 0;
    for (_, outcome) in &summary.outcomes {
        match outcome {
            SizeOutcome::Unchanged => unchanged += 1,
            SizeOutcome::RecompressedInPlace => recompressed += 1,
            SizeOutcome::SplitIntoParts(_) => split += 1,
            SizeOutcome::StillOversized(_) => still_oversized += 1,
        }
    }
    println!(
        "{} recompressed, {} unchanged, {} split into {} part(s), {} still oversized",
        recompressed,
        unchanged,
        split,
        summary.parts_written(),
        still_oversized
    );
    println!("{} oversized file(s) after the pass", summary.oversized.len());
}

/// Progress bar on stderr.
struct BarReporter {
    bar: ProgressBar,
}

impl BarReporter {
    fn new(quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new(0);
            bar.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
            );
            bar
        };
        Self { bar }
    }
}

impl ProgressReporter for BarReporter {
    fn pass_started(&mut self, mode: WalkMode, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_message(mode.label());
    }

    fn branch_skipped(&mut self, branch: &str) {
        self.bar.println(format!("Skipping {}: no documents", branch));
    }

    fn document_done(&mut self, update: &ProgressUpdate<'_>) {
        let name = update
            .document
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let eta = update
            .eta
            .map(|d| format!(", ~{}s left", d.as_secs()))
            .unwrap_or_default();
        self.bar.set_position(update.processed as u64);
        self.bar.set_message(format!(
            "{} ({} {:.2}%, total {:.2}%{})",
            name, update.branch, update.branch_percent, update.overall_percent, eta
        ));
    }

    fn pass_finished(&mut self, _summary: &WalkSummary) {
        self.bar.finish_and_clear();
    }
}
