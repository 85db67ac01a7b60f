// Highlight extraction - one record per highlight annotation
use log::{debug, warn};
use std::path::Path;

use crate::color::classify_stroke;
use crate::config::{COULD_NOT_OPEN_TEXT, NO_SYSTEM_TEXT};
use crate::pdf_engine::{words_within, PdfDocument, PdfEngine, Word};
use crate::types::{ColorClass, HighlightRecord, PathMetadata, Result};

/// Reads highlight annotations from open documents and turns them into
/// report rows.
pub struct HighlightExtractor<'a, E: PdfEngine> {
    engine: &'a E,
}

impl<'a, E: PdfEngine> HighlightExtractor<'a, E> {
    pub fn new(engine: &'a E) -> Self {
        Self { engine }
    }

    /// Opens `path`, extracts, closes. Never returns an empty list for an
    /// unreadable or untagged document: those produce a single placeholder.
    pub fn extract_file(&self, path: &Path, metadata: &PathMetadata) -> Vec<HighlightRecord> {
        let document = match self.engine.open(path) {
            Ok(document) => document,
            Err(e) => {
                warn!("Could not open {}, skipping: {}", path.display(), e);
                return vec![placeholder(metadata, COULD_NOT_OPEN_TEXT)];
            }
        };

        match extract(&document, metadata) {
            Ok(records) => records,
            Err(e) => {
                warn!("Failed reading annotations in {}: {}", path.display(), e);
                vec![placeholder(metadata, COULD_NOT_OPEN_TEXT)]
            }
        }
    }
}

/// Extracts from an already open document, page order then annotation
/// order.
pub fn extract<D: PdfDocument>(document: &D, metadata: &PathMetadata) -> Result<Vec<HighlightRecord>> {
    if !metadata.has_system() {
        debug!("No system tag for {}/{}/{}", metadata.make, metadata.year, metadata.model);
        return Ok(vec![placeholder(metadata, NO_SYSTEM_TEXT)]);
    }

    let mut records = Vec::new();
    for page_index in 0..document.page_count() {
        // Laid out once, on the first highlight of the page
        let mut page_words: Option<Vec<Word>> = None;
        for annotation in document.annotations_on_page(page_index)? {
            if !annotation.is_highlight() {
                continue;
            }
            let color = classify_stroke(annotation.stroke);
            if page_words.is_none() {
                page_words = Some(document.words_on_page(page_index)?);
            }
            let words = words_within(page_words.as_deref().unwrap_or_default(), &annotation.rect);
            let text = words
                .iter()
                .map(|w| w.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            records.push(HighlightRecord::new(metadata, printable_only(&text), color));
        }
    }
    debug!("{} highlight(s) found", records.len());
    Ok(records)
}

pub fn placeholder(metadata: &PathMetadata, text: &str) -> HighlightRecord {
    HighlightRecord::new(metadata, text, ColorClass::Unknown)
}

/// True when `records` is the single placeholder for an unreadable document.
pub fn is_open_failure(records: &[HighlightRecord]) -> bool {
    matches!(records, [only] if only.text == COULD_NOT_OPEN_TEXT && only.color == ColorClass::Unknown)
}

/// Keeps printable ASCII plus ASCII whitespace, vertical tab and form feed
/// included.
pub fn printable_only(text: &str) -> String {
    text.chars()
        .filter(|c| {
            c.is_ascii_graphic() || matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0b' | '\x0c')
        })
        .collect()
}
