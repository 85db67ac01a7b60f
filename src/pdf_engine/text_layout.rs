// Word layout from page content streams - Pure Rust via lopdf
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::BTreeMap;

use super::font_encoding::FontEncoding;
use super::Word;
use crate::types::{Rect, Result};

// Fallback advance when a font has no usable /Widths entry (thousandths of em)
const DEFAULT_GLYPH_WIDTH: f64 = 500.0;
// Glyph box relative to the baseline, in units of font size
const DESCENT: f64 = -0.2;
const ASCENT: f64 = 0.8;
// A TJ adjustment past this (thousandths of em) reads as a space
const TJ_SPACE_THRESHOLD: f64 = 200.0;
// Horizontal gap, relative to font size, that splits two glyphs into words
const WORD_GAP_RATIO: f64 = 0.15;

/// Affine matrix `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix([f64; 6]);

impl Matrix {
    const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn translate(tx: f64, ty: f64) -> Matrix {
        Matrix([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    /// `self × other`
    fn then(&self, other: &Matrix) -> Matrix {
        let [a1, b1, c1, d1, e1, f1] = self.0;
        let [a2, b2, c2, d2, e2, f2] = other.0;
        Matrix([
            a1 * a2 + b1 * c2,
            a1 * b2 + b1 * d2,
            c1 * a2 + d1 * c2,
            c1 * b2 + d1 * d2,
            e1 * a2 + f1 * c2 + e2,
            e1 * b2 + f1 * d2 + f2,
        ])
    }

    fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let [a, b, c, d, e, f] = self.0;
        (a * x + c * y + e, b * x + d * y + f)
    }

    fn vertical_scale(&self) -> f64 {
        let [_, _, c, d, _, _] = self.0;
        (c * c + d * d).sqrt()
    }
}

#[derive(Debug, Clone)]
struct FontMetrics {
    first_char: i64,
    widths: Vec<f64>,
    two_byte: bool,
    encoding: FontEncoding,
}

impl FontMetrics {
    fn width(&self, code: u32) -> f64 {
        let index = code as i64 - self.first_char;
        if index >= 0 {
            if let Some(w) = self.widths.get(index as usize) {
                if *w > 0.0 {
                    return *w;
                }
            }
        }
        DEFAULT_GLYPH_WIDTH
    }
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self {
            first_char: 0,
            widths: Vec::new(),
            two_byte: false,
            encoding: FontEncoding::default(),
        }
    }
}

#[derive(Debug, Clone)]
struct TextState {
    font: Option<Vec<u8>>,
    font_size: f64,
    char_spacing: f64,
    word_spacing: f64,
    horizontal_scale: f64,
    leading: f64,
    rise: f64,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: None,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Glyph {
    ch: char,
    bbox: Rect,
    size: f64,
}

#[derive(Default)]
struct WordCollector {
    words: Vec<Word>,
    text: String,
    bbox: Option<Rect>,
    last: Option<Glyph>,
}

impl WordCollector {
    fn push(&mut self, glyph: Glyph) {
        if glyph.ch.is_whitespace() {
            self.flush();
            return;
        }
        if let Some(last) = self.last {
            let size = last.size.max(glyph.size).max(1.0);
            let gap = glyph.bbox.x0 - last.bbox.x1;
            let baseline_shift = (glyph.bbox.y0 - last.bbox.y0).abs();
            if gap > size * WORD_GAP_RATIO || gap < -size || baseline_shift > size * 0.5 {
                self.flush();
            }
        }
        self.text.push(glyph.ch);
        self.bbox = Some(match self.bbox {
            Some(bbox) => bbox.union(&glyph.bbox),
            None => glyph.bbox,
        });
        self.last = Some(glyph);
    }

    fn flush(&mut self) {
        if let Some(bbox) = self.bbox.take() {
            if !self.text.is_empty() {
                self.words.push(Word {
                    text: std::mem::take(&mut self.text),
                    bbox,
                });
            }
        }
        self.text.clear();
        self.last = None;
    }

    fn finish(mut self) -> Vec<Word> {
        self.flush();
        self.words
    }
}

/// All words on a page, in content-stream order.
pub fn page_words(document: &Document, page_id: ObjectId) -> Result<Vec<Word>> {
    let content_data = document.get_page_content(page_id)?;
    if content_data.is_empty() {
        return Ok(Vec::new());
    }
    let content = Content::decode(&content_data)?;
    let fonts = page_font_metrics(document, page_id);

    let mut collector = WordCollector::default();
    let mut ctm = Matrix::IDENTITY;
    let mut state = TextState::default();
    let mut stack: Vec<(Matrix, TextState)> = Vec::new();
    let mut tm = Matrix::IDENTITY;
    let mut tlm = Matrix::IDENTITY;

    for op in &content.operations {
        let operands = &op.operands;
        match op.operator.as_str() {
            "q" => stack.push((ctm, state.clone())),
            "Q" => {
                if let Some((saved_ctm, saved_state)) = stack.pop() {
                    ctm = saved_ctm;
                    state = saved_state;
                }
            }
            "cm" => {
                if let Some(m) = matrix_operand(operands) {
                    ctm = m.then(&ctm);
                }
            }
            "BT" => {
                tm = Matrix::IDENTITY;
                tlm = Matrix::IDENTITY;
            }
            "ET" => collector.flush(),
            "Tf" => {
                if let Some(Object::Name(name)) = operands.first() {
                    state.font = Some(name.clone());
                }
                if let Some(size) = operands.get(1).and_then(number) {
                    state.font_size = size;
                }
            }
            "Tc" => state.char_spacing = first_number(operands).unwrap_or(0.0),
            "Tw" => state.word_spacing = first_number(operands).unwrap_or(0.0),
            "Tz" => state.horizontal_scale = first_number(operands).unwrap_or(100.0) / 100.0,
            "TL" => state.leading = first_number(operands).unwrap_or(0.0),
            "Ts" => state.rise = first_number(operands).unwrap_or(0.0),
            "Td" | "TD" => {
                let tx = operands.first().and_then(number).unwrap_or(0.0);
                let ty = operands.get(1).and_then(number).unwrap_or(0.0);
                if op.operator == "TD" {
                    state.leading = -ty;
                }
                tlm = Matrix::translate(tx, ty).then(&tlm);
                tm = tlm;
            }
            "Tm" => {
                if let Some(m) = matrix_operand(operands) {
                    tlm = m;
                    tm = m;
                }
            }
            "T*" => {
                tlm = Matrix::translate(0.0, -state.leading).then(&tlm);
                tm = tlm;
            }
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    show_text(bytes, &state, &fonts, &ctm, &mut tm, &mut collector);
                }
            }
            "'" => {
                tlm = Matrix::translate(0.0, -state.leading).then(&tlm);
                tm = tlm;
                if let Some(Object::String(bytes, _)) = operands.first() {
                    show_text(bytes, &state, &fonts, &ctm, &mut tm, &mut collector);
                }
            }
            "\"" => {
                state.word_spacing = operands.first().and_then(number).unwrap_or(0.0);
                state.char_spacing = operands.get(1).and_then(number).unwrap_or(0.0);
                tlm = Matrix::translate(0.0, -state.leading).then(&tlm);
                tm = tlm;
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    show_text(bytes, &state, &fonts, &ctm, &mut tm, &mut collector);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    for item in items {
                        match item {
                            Object::String(bytes, _) => {
                                show_text(bytes, &state, &fonts, &ctm, &mut tm, &mut collector)
                            }
                            other => {
                                if let Some(adjust) = number(other) {
                                    if -adjust > TJ_SPACE_THRESHOLD {
                                        collector.flush();
                                    }
                                    let tx = -adjust / 1000.0
                                        * state.font_size
                                        * state.horizontal_scale;
                                    tm = Matrix::translate(tx, 0.0).then(&tm);
                                }
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }

    Ok(collector.finish())
}

fn show_text(
    bytes: &[u8],
    state: &TextState,
    fonts: &BTreeMap<Vec<u8>, FontMetrics>,
    ctm: &Matrix,
    tm: &mut Matrix,
    collector: &mut WordCollector,
) {
    let default_metrics = FontMetrics::default();
    let metrics = state
        .font
        .as_ref()
        .and_then(|name| fonts.get(name))
        .unwrap_or(&default_metrics);

    let codes: Vec<u32> = if metrics.two_byte {
        bytes
            .chunks(2)
            .map(|pair| match pair {
                [hi, lo] => u32::from(*hi) << 8 | u32::from(*lo),
                [single] => u32::from(*single),
                _ => 0,
            })
            .collect()
    } else {
        bytes.iter().map(|b| u32::from(*b)).collect()
    };

    let fs = state.font_size;
    let th = state.horizontal_scale;

    for code in codes {
        let advance = metrics.width(code) / 1000.0 * fs * th;
        let device = tm.then(ctm);
        let corners = [
            device.apply(0.0, state.rise + DESCENT * fs),
            device.apply(advance, state.rise + DESCENT * fs),
            device.apply(0.0, state.rise + ASCENT * fs),
            device.apply(advance, state.rise + ASCENT * fs),
        ];
        let bbox = corners.iter().skip(1).fold(
            Rect::new(corners[0].0, corners[0].1, corners[0].0, corners[0].1),
            |acc, (x, y)| acc.union(&Rect::new(*x, *y, *x, *y)),
        );
        // A ligature code yields several characters sharing its advance
        let text: Vec<char> = metrics.encoding.decode(code, metrics.two_byte).chars().collect();
        let share = (bbox.x1 - bbox.x0) / text.len().max(1) as f64;
        for (i, ch) in text.into_iter().enumerate() {
            let x0 = bbox.x0 + share * i as f64;
            collector.push(Glyph {
                ch,
                bbox: Rect::new(x0, bbox.y0, x0 + share, bbox.y1),
                size: fs * device.vertical_scale(),
            });
        }

        let mut tx = advance + state.char_spacing * th;
        if code == 32 && !metrics.two_byte {
            tx += state.word_spacing * th;
        }
        *tm = Matrix::translate(tx, 0.0).then(tm);
    }
}

fn page_font_metrics(document: &Document, page_id: ObjectId) -> BTreeMap<Vec<u8>, FontMetrics> {
    let mut fonts = BTreeMap::new();
    let Some(resources) = inherited_dict(document, page_id, b"Resources") else {
        return fonts;
    };
    let Some(font_dict) = resources
        .get(b"Font")
        .ok()
        .and_then(|obj| resolve(document, obj).as_dict().ok())
    else {
        return fonts;
    };

    for (name, obj) in font_dict.iter() {
        if let Ok(font) = resolve(document, obj).as_dict() {
            fonts.insert(name.clone(), font_metrics(document, font));
        }
    }
    fonts
}

fn font_metrics(document: &Document, font: &Dictionary) -> FontMetrics {
    let two_byte = matches!(font.get(b"Subtype"), Ok(Object::Name(n)) if n.as_slice() == b"Type0");
    let first_char = font
        .get(b"FirstChar")
        .ok()
        .and_then(|obj| number(resolve(document, obj)))
        .unwrap_or(0.0) as i64;
    let widths = font
        .get(b"Widths")
        .ok()
        .and_then(|obj| resolve(document, obj).as_array().ok())
        .map(|arr| {
            arr.iter()
                .map(|w| number(resolve(document, w)).unwrap_or(0.0))
                .collect()
        })
        .unwrap_or_default();

    FontMetrics {
        first_char,
        widths,
        two_byte,
        encoding: FontEncoding::from_font(document, font, two_byte),
    }
}

/// Looks up `key` on the page, walking /Parent for inherited attributes.
fn inherited_dict<'a>(document: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Dictionary> {
    let mut current = document.get_object(page_id).ok()?.as_dict().ok()?;
    // Bounded walk guards against cyclic /Parent chains
    for _ in 0..64 {
        if let Ok(value) = current.get(key) {
            return resolve(document, value).as_dict().ok();
        }
        let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = document.get_object(parent).ok()?.as_dict().ok()?;
    }
    None
}

pub(crate) fn resolve<'a>(document: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => document.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

pub(crate) fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some(*f as f64),
        _ => None,
    }
}

fn first_number(operands: &[Object]) -> Option<f64> {
    operands.first().and_then(number)
}

fn matrix_operand(operands: &[Object]) -> Option<Matrix> {
    if operands.len() != 6 {
        return None;
    }
    let mut values = [0.0; 6];
    for (slot, obj) in values.iter_mut().zip(operands) {
        *slot = number(obj)?;
    }
    Some(Matrix(values))
}
