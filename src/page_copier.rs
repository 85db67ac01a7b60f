// Page copying - pull highlighted pages out into their own document
use log::debug;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::color::classify_stroke;
use crate::pdf_engine::{with_document, PdfDocument, PdfEngine, SaveOptions};
use crate::types::{ColorClass, MultiToolError, Result};

/// Which highlight colors make a page worth copying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopySelection {
    Yellow,
    Blue,
    /// Pages with either color, from documents that carry both.
    YellowAndBlue,
}

impl CopySelection {
    /// File name suffix for the copied document.
    pub fn suffix(&self) -> &'static str {
        match self {
            CopySelection::Yellow => "Yellow",
            CopySelection::Blue => "Blue",
            CopySelection::YellowAndBlue => "YB",
        }
    }

    fn accepts(&self, color: ColorClass) -> bool {
        match self {
            CopySelection::Yellow => color == ColorClass::Yellow,
            CopySelection::Blue => color == ColorClass::Blue,
            CopySelection::YellowAndBlue => {
                matches!(color, ColorClass::Yellow | ColorClass::Blue)
            }
        }
    }
}

impl fmt::Display for CopySelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// 0-based pages to copy, ascending. Empty when nothing qualifies.
pub fn pages_to_copy<D: PdfDocument>(document: &D, selection: CopySelection) -> Result<Vec<usize>> {
    let mut pages = BTreeSet::new();
    let mut seen_yellow = false;
    let mut seen_blue = false;

    for page_index in 0..document.page_count() {
        for annotation in document.annotations_on_page(page_index)? {
            if !annotation.is_highlight() {
                continue;
            }
            let color = classify_stroke(annotation.stroke);
            seen_yellow |= color == ColorClass::Yellow;
            seen_blue |= color == ColorClass::Blue;
            if selection.accepts(color) {
                pages.insert(page_index);
            }
        }
    }

    if selection == CopySelection::YellowAndBlue && !(seen_yellow && seen_blue) {
        return Ok(Vec::new());
    }
    Ok(pages.into_iter().collect())
}

/// Writes `<stem>_<suffix>.pdf` into `output_dir` holding the qualifying
/// pages of `path`. Returns the new file, or `None` when no page qualified.
pub fn copy_highlighted_pages<E: PdfEngine>(
    engine: &E,
    path: &Path,
    selection: CopySelection,
    output_dir: &Path,
) -> Result<Option<PathBuf>> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| MultiToolError::Engine(format!("no file name in {}", path.display())))?;

    with_document(engine, path, |document| {
        let pages = pages_to_copy(document, selection)?;
        if pages.is_empty() {
            debug!("{}: no {} pages", path.display(), selection);
            return Ok(None);
        }

        let target = output_dir.join(format!("{}_{}.pdf", stem, selection.suffix()));
        let mut copy = document.copy_pages(&pages)?;
        copy.save(&target, &SaveOptions::maximal())?;
        debug!("{}: copied {} page(s) to {}", path.display(), pages.len(), target.display());
        Ok(Some(target))
    })
}
