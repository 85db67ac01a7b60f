// PDF engine boundary - everything the pipeline needs from a PDF library
mod font_encoding;
pub mod lopdf_engine;
pub mod text_layout;

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::types::{MultiToolError, Rect, Result, RgbColor};

pub use lopdf_engine::{LopdfDocument, LopdfEngine};

/// One annotation as read from a page's annotation list.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub subtype: String,
    /// `None` unless the stroke is a 3-component RGB color.
    pub stroke: Option<RgbColor>,
    pub rect: Rect,
}

impl Annotation {
    pub fn is_highlight(&self) -> bool {
        self.subtype == "Highlight"
    }
}

/// A word with its layout box in page user space.
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub text: String,
    pub bbox: Rect,
}

/// Rewrite options applied on save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SaveOptions {
    /// Drop objects nothing references.
    pub garbage_collect: bool,
    /// Deflate streams.
    pub deflate: bool,
    /// Remove empty streams and renumber objects.
    pub clean: bool,
}

impl SaveOptions {
    pub const fn maximal() -> Self {
        Self {
            garbage_collect: true,
            deflate: true,
            clean: true,
        }
    }
}

/// Opens documents. Implementations decide how bytes become a document.
pub trait PdfEngine {
    type Document: PdfDocument;

    fn open(&self, path: &Path) -> Result<Self::Document>;
}

/// An open document. Dropping the value closes it.
pub trait PdfDocument: Sized {
    fn page_count(&self) -> usize;

    /// Annotations on a 0-based page, in the page's annotation order.
    fn annotations_on_page(&self, page_index: usize) -> Result<Vec<Annotation>>;

    /// Every word on a 0-based page, in reading order.
    fn words_on_page(&self, page_index: usize) -> Result<Vec<Word>>;

    /// Words whose layout falls inside `region`, in reading order.
    fn words_in_region(&self, page_index: usize, region: &Rect) -> Result<Vec<Word>> {
        Ok(words_within(&self.words_on_page(page_index)?, region))
    }

    /// New document holding the given 0-based pages, in ascending order.
    fn copy_pages(&self, pages: &[usize]) -> Result<Self>;

    /// Serializes the document with the given rewrite options.
    fn to_bytes(&mut self, options: &SaveOptions) -> Result<Vec<u8>>;

    /// Serializes and writes to `path` through a temporary sibling file, so
    /// a failed save never leaves a truncated document behind.
    fn save(&mut self, path: &Path, options: &SaveOptions) -> Result<()> {
        let bytes = self.to_bytes(options)?;
        write_atomically(path, &bytes)
    }
}

/// Words whose box center lies inside `region`.
pub fn words_within(words: &[Word], region: &Rect) -> Vec<Word> {
    words
        .iter()
        .filter(|w| {
            let (cx, cy) = w.bbox.center();
            region.contains_point(cx, cy)
        })
        .cloned()
        .collect()
}

/// Open, use, close. The handle is dropped on every exit path.
pub fn with_document<E, F, R>(engine: &E, path: &Path, f: F) -> Result<R>
where
    E: PdfEngine,
    F: FnOnce(&mut E::Document) -> Result<R>,
{
    let mut document = engine.open(path)?;
    f(&mut document)
}

pub fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| MultiToolError::io(dir, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| MultiToolError::io(dir, e))?;
    tmp.write_all(bytes).map_err(|e| MultiToolError::io(path, e))?;
    tmp.as_file().sync_all().map_err(|e| MultiToolError::io(path, e))?;
    tmp.persist(path)
        .map_err(|e| MultiToolError::io(path, e.error))?;
    Ok(())
}
