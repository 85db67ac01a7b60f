// Size policy - recompress small documents, split large ones into parts
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::config::{RetrySettings, Settings, SizeSettings};
use crate::pdf_engine::{with_document, write_atomically, PdfDocument, PdfEngine, SaveOptions};
use crate::types::{MultiToolError, OversizedFileRecord, PathMetadata, Result, SizeOutcome};

/// Bounded retry with a fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            backoff: settings.backoff(),
        }
    }
}

impl RetryPolicy {
    /// Runs `op` until it succeeds, fails fatally, or attempts run out.
    /// `op` receives the 1-based attempt number.
    pub fn run<T, F>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Result<T>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_fatal() || attempt >= self.max_attempts => return Err(e),
                Err(e) => {
                    warn!(
                        "{}: attempt {}/{} failed: {}",
                        label, attempt, self.max_attempts, e
                    );
                    if !self.backoff.is_zero() {
                        thread::sleep(self.backoff);
                    }
                    attempt += 1;
                }
            }
        }
    }
}

/// Keeps documents under the split threshold.
pub struct SizeManager<'a, E: PdfEngine> {
    engine: &'a E,
    size: SizeSettings,
    retry: RetryPolicy,
}

impl<'a, E: PdfEngine> SizeManager<'a, E> {
    pub fn new(engine: &'a E, settings: &Settings) -> Self {
        Self {
            engine,
            size: settings.size.clone(),
            retry: RetryPolicy::from(&settings.retry),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Applies the size policy to one document, retrying transient
    /// failures. A failed attempt leaves the document as it was.
    pub fn enforce_size_limit(&self, path: &Path) -> Result<SizeOutcome> {
        let label = path.display().to_string();
        let outcome = self.retry.run(&label, |_| self.enforce_once(path))?;
        debug!("{}: {}", label, outcome);
        Ok(outcome)
    }

    /// An oversized-file row when `path` is still above the split threshold.
    pub fn oversized_record(
        &self,
        path: &Path,
        metadata: &PathMetadata,
    ) -> Result<Option<OversizedFileRecord>> {
        let kb = size_kb(path)?;
        Ok((kb > self.size.split_threshold_kb).then(|| OversizedFileRecord::new(metadata, kb)))
    }

    fn enforce_once(&self, path: &Path) -> Result<SizeOutcome> {
        let kb = size_kb(path)?;
        if kb > self.size.split_threshold_kb {
            self.split(path, kb)
        } else {
            self.recompress(path)
        }
    }

    /// Rewrites with full compaction, keeping the result only when it saves
    /// at least `min_savings_bytes`. A second run on the output is a no-op.
    fn recompress(&self, path: &Path) -> Result<SizeOutcome> {
        let original = file_len(path)?;
        let bytes = with_document(self.engine, path, |document| {
            document.to_bytes(&SaveOptions::maximal())
        })?;

        let new_len = bytes.len() as u64;
        if new_len + self.size.min_savings_bytes > original {
            return Ok(SizeOutcome::Unchanged);
        }
        write_atomically(path, &bytes)?;
        debug!("{}: {} -> {} bytes", path.display(), original, new_len);
        Ok(SizeOutcome::RecompressedInPlace)
    }

    fn split(&self, path: &Path, kb: f64) -> Result<SizeOutcome> {
        let document = self.engine.open(path)?;
        let page_count = document.page_count();
        let per_part = self.size.pages_per_part.max(1);
        let part_total = page_count.div_ceil(per_part);

        if part_total < 2 {
            // Nothing to partition; compaction is the only lever left.
            drop(document);
            let outcome = self.recompress(path)?;
            let after = size_kb(path)?;
            if after > self.size.split_threshold_kb {
                warn!(
                    "{} has {} page(s) and is still {:.2} KB",
                    path.display(),
                    page_count,
                    after
                );
                return Ok(SizeOutcome::StillOversized(after));
            }
            return Ok(outcome);
        }

        let layout = SplitLayout::for_path(path)?;
        fs::create_dir_all(&layout.folder).map_err(|e| MultiToolError::io(&layout.folder, e))?;
        fs::rename(path, &layout.staged).map_err(|e| MultiToolError::io(path, e))?;

        let mut written = Vec::with_capacity(part_total);
        let result = (|| -> Result<()> {
            let pages: Vec<usize> = (0..page_count).collect();
            for (index, chunk) in pages.chunks(per_part).enumerate() {
                let part_path = layout.part_path(index + 1);
                let mut part = document.copy_pages(chunk)?;
                part.save(&part_path, &SaveOptions::maximal())?;
                written.push(part_path.clone());

                let part_kb = size_kb(&part_path)?;
                if part_kb > self.size.split_threshold_kb {
                    warn!(
                        "{} is still {:.2} KB after splitting",
                        part_path.display(),
                        part_kb
                    );
                }
            }
            Ok(())
        })();
        drop(document);

        match result {
            Ok(()) => {
                fs::remove_file(&layout.staged).map_err(|e| MultiToolError::io(&layout.staged, e))?;
                info!(
                    "Split {} ({:.2} KB, {} pages) into {} parts",
                    path.display(),
                    kb,
                    page_count,
                    written.len()
                );
                Ok(SizeOutcome::SplitIntoParts(written.len()))
            }
            Err(e) => {
                layout.roll_back(path, &written);
                Err(e)
            }
        }
    }
}

/// Where a split puts things: `<dir>/<stem>/<name>` while splitting and
/// `<dir>/<stem>/<stem> part-<n>.<ext>` for the parts.
struct SplitLayout {
    folder: PathBuf,
    staged: PathBuf,
    stem: String,
    extension: String,
}

impl SplitLayout {
    fn for_path(path: &Path) -> Result<Self> {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| MultiToolError::Engine(format!("no file name in {}", path.display())))?;
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| "pdf".to_string());
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        let folder = parent.join(&stem);
        let staged = folder.join(path.file_name().unwrap_or_default());
        Ok(Self {
            folder,
            staged,
            stem,
            extension,
        })
    }

    fn part_path(&self, number: usize) -> PathBuf {
        self.folder
            .join(format!("{} part-{}.{}", self.stem, number, self.extension))
    }

    /// Puts the original back and removes partial output.
    fn roll_back(&self, original: &Path, written: &[PathBuf]) {
        for part in written {
            if let Err(e) = fs::remove_file(part) {
                warn!("Could not remove partial part {}: {}", part.display(), e);
            }
        }
        if let Err(e) = fs::rename(&self.staged, original) {
            warn!(
                "Could not restore {} from {}: {}",
                original.display(),
                self.staged.display(),
                e
            );
        }
        // Only succeeds when empty
        let _ = fs::remove_dir(&self.folder);
    }
}

fn file_len(path: &Path) -> Result<u64> {
    fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| MultiToolError::io(path, e))
}

pub fn size_kb(path: &Path) -> Result<f64> {
    Ok(file_len(path)? as f64 / 1024.0)
}
