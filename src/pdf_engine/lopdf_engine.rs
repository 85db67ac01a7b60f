// lopdf engine - Pure Rust PDF operations
use lopdf::{Document, Object, ObjectId};
use std::collections::BTreeSet;
use std::path::Path;

use super::text_layout::{self, number, resolve};
use super::{Annotation, PdfDocument, PdfEngine, SaveOptions, Word};
use crate::types::{MultiToolError, Rect, Result, RgbColor};

/// Engine backed by the `lopdf` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfEngine;

impl PdfEngine for LopdfEngine {
    type Document = LopdfDocument;

    fn open(&self, path: &Path) -> Result<LopdfDocument> {
        let inner = Document::load(path).map_err(|e| MultiToolError::DocumentOpen {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(LopdfDocument::from_document(inner))
    }
}

/// An open lopdf document with its page ids cached in page order.
#[derive(Clone)]
pub struct LopdfDocument {
    inner: Document,
    page_ids: Vec<ObjectId>,
}

impl std::fmt::Debug for LopdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LopdfDocument")
            .field("page_count", &self.page_ids.len())
            .finish_non_exhaustive()
    }
}

impl LopdfDocument {
    pub fn from_document(inner: Document) -> Self {
        // get_pages is keyed by 1-based page number, so values come out in order
        let page_ids = inner.get_pages().values().copied().collect();
        Self { inner, page_ids }
    }

    fn page_id(&self, page_index: usize) -> Result<ObjectId> {
        self.page_ids.get(page_index).copied().ok_or_else(|| {
            MultiToolError::Engine(format!(
                "page {} out of range ({} pages)",
                page_index + 1,
                self.page_ids.len()
            ))
        })
    }
}

impl PdfDocument for LopdfDocument {
    fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    fn annotations_on_page(&self, page_index: usize) -> Result<Vec<Annotation>> {
        let doc = &self.inner;
        let page_dict = doc.get_object(self.page_id(page_index)?)?.as_dict()?;

        let annots = match page_dict.get(b"Annots") {
            Ok(obj) => resolve(doc, obj),
            Err(_) => return Ok(Vec::new()),
        };
        let annots = match annots.as_array() {
            Ok(arr) => arr,
            Err(_) => return Ok(Vec::new()),
        };

        let mut annotations = Vec::new();
        for entry in annots {
            let Ok(dict) = resolve(doc, entry).as_dict() else {
                continue;
            };
            let subtype = match dict.get(b"Subtype").map(|o| resolve(doc, o)) {
                Ok(Object::Name(name)) => String::from_utf8_lossy(name).into_owned(),
                _ => continue,
            };
            let rect = match dict
                .get(b"Rect")
                .ok()
                .and_then(|o| resolve(doc, o).as_array().ok())
                .and_then(|arr| rect_from_array(doc, arr))
            {
                Some(rect) => rect,
                None => continue,
            };
            let stroke = dict
                .get(b"C")
                .ok()
                .and_then(|o| resolve(doc, o).as_array().ok())
                .and_then(|arr| rgb_from_array(doc, arr));

            annotations.push(Annotation {
                subtype,
                stroke,
                rect,
            });
        }
        Ok(annotations)
    }

    fn words_on_page(&self, page_index: usize) -> Result<Vec<Word>> {
        text_layout::page_words(&self.inner, self.page_id(page_index)?)
    }

    fn copy_pages(&self, pages: &[usize]) -> Result<Self> {
        let keep: BTreeSet<usize> = pages.iter().copied().collect();
        if let Some(&last) = keep.iter().next_back() {
            self.page_id(last)?;
        }
        let removed: Vec<u32> = (0..self.page_ids.len())
            .filter(|i| !keep.contains(i))
            .map(|i| i as u32 + 1)
            .collect();

        let mut copy = self.inner.clone();
        copy.delete_pages(&removed);
        copy.prune_objects();
        Ok(Self::from_document(copy))
    }

    fn to_bytes(&mut self, options: &SaveOptions) -> Result<Vec<u8>> {
        if options.garbage_collect {
            self.inner.prune_objects();
        }
        if options.clean {
            self.inner.delete_zero_length_streams();
            self.inner.renumber_objects();
        }
        if options.deflate {
            self.inner.compress();
        }

        let mut buffer = Vec::new();
        self.inner
            .save_to(&mut buffer)
            .map_err(|e| MultiToolError::Engine(format!("serialize failed: {}", e)))?;
        // Object ids may have moved
        self.page_ids = self.inner.get_pages().values().copied().collect();
        Ok(buffer)
    }
}

fn rect_from_array(doc: &Document, arr: &[Object]) -> Option<Rect> {
    if arr.len() != 4 {
        return None;
    }
    let mut v = [0.0; 4];
    for (slot, obj) in v.iter_mut().zip(arr) {
        *slot = number(resolve(doc, obj))?;
    }
    Some(Rect::new(v[0], v[1], v[2], v[3]))
}

fn rgb_from_array(doc: &Document, arr: &[Object]) -> Option<RgbColor> {
    if arr.len() != 3 {
        return None;
    }
    let r = number(resolve(doc, &arr[0]))?;
    let g = number(resolve(doc, &arr[1]))?;
    let b = number(resolve(doc, &arr[2]))?;
    Some(RgbColor::new(r, g, b))
}
