// Character code to Unicode mapping: /ToUnicode CMaps and simple-font /Encoding
use lopdf::{Dictionary, Document, Object};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

use super::text_layout::resolve;

static BFCHAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]+)>").expect("valid regex"));
// <start> <end> <dst>
static BFRANGE_SEQ: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]+)>")
        .expect("valid regex")
});
// <start> <end> [<dst1> <dst2> ...]
static BFRANGE_ARRAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]+)>\s*\[((?:\s*<[0-9A-Fa-f]*>\s*)*)\]")
        .expect("valid regex")
});
static HEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"<([0-9A-Fa-f]*)>").expect("valid regex"));

// Longest bfrange we expand; real CMaps stay far below this
const MAX_RANGE: u32 = 0xFFFF;

/// WinAnsi differs from Latin-1 only in 0x80..=0x9F. Zero marks an unused code.
const WIN_ANSI_HIGH: [u16; 32] = [
    0x20AC, 0, 0x201A, 0x0192, 0x201E, 0x2026, 0x2020, 0x2021, //
    0x02C6, 0x2030, 0x0160, 0x2039, 0x0152, 0, 0x017D, 0, //
    0, 0x2018, 0x2019, 0x201C, 0x201D, 0x2022, 0x2013, 0x2014, //
    0x02DC, 0x2122, 0x0161, 0x203A, 0x0153, 0, 0x017E, 0x0178,
];

/// Glyph names that are not a single character or a `uniXXXX` form.
const GLYPH_NAMES: &[(&str, &str)] = &[
    ("space", " "),
    ("nbspace", " "),
    ("nonbreakingspace", " "),
    ("exclam", "!"),
    ("quotedbl", "\""),
    ("numbersign", "#"),
    ("dollar", "$"),
    ("percent", "%"),
    ("ampersand", "&"),
    ("quotesingle", "'"),
    ("quoteright", "\u{2019}"),
    ("quoteleft", "\u{2018}"),
    ("quotedblleft", "\u{201C}"),
    ("quotedblright", "\u{201D}"),
    ("parenleft", "("),
    ("parenright", ")"),
    ("asterisk", "*"),
    ("plus", "+"),
    ("comma", ","),
    ("hyphen", "-"),
    ("minus", "\u{2212}"),
    ("period", "."),
    ("slash", "/"),
    ("zero", "0"),
    ("one", "1"),
    ("two", "2"),
    ("three", "3"),
    ("four", "4"),
    ("five", "5"),
    ("six", "6"),
    ("seven", "7"),
    ("eight", "8"),
    ("nine", "9"),
    ("colon", ":"),
    ("semicolon", ";"),
    ("less", "<"),
    ("equal", "="),
    ("greater", ">"),
    ("question", "?"),
    ("at", "@"),
    ("bracketleft", "["),
    ("backslash", "\\"),
    ("bracketright", "]"),
    ("underscore", "_"),
    ("braceleft", "{"),
    ("bar", "|"),
    ("braceright", "}"),
    ("bullet", "\u{2022}"),
    ("endash", "\u{2013}"),
    ("emdash", "\u{2014}"),
    ("degree", "\u{00B0}"),
    ("ellipsis", "\u{2026}"),
    ("fi", "fi"),
    ("fl", "fl"),
    ("ff", "ff"),
    ("ffi", "ffi"),
    ("ffl", "ffl"),
];

/// How a font's character codes turn into text.
#[derive(Debug, Clone, Default)]
pub(crate) struct FontEncoding {
    to_unicode: BTreeMap<u32, String>,
    differences: BTreeMap<u32, String>,
}

impl FontEncoding {
    /// Reads `/ToUnicode` and, for simple fonts, `/Encoding /Differences`.
    pub(crate) fn from_font(document: &Document, font: &Dictionary, two_byte: bool) -> Self {
        let to_unicode = font
            .get(b"ToUnicode")
            .ok()
            .and_then(|obj| resolve(document, obj).as_stream().ok())
            .map(|stream| {
                let data = if stream.dict.get(b"Filter").is_ok() {
                    stream.decompressed_content().unwrap_or_default()
                } else {
                    stream.content.clone()
                };
                parse_to_unicode(&data)
            })
            .unwrap_or_default();

        let differences = if two_byte {
            BTreeMap::new()
        } else {
            font.get(b"Encoding")
                .ok()
                .and_then(|obj| resolve(document, obj).as_dict().ok())
                .and_then(|encoding| encoding.get(b"Differences").ok())
                .map(|obj| parse_differences(document, resolve(document, obj)))
                .unwrap_or_default()
        };

        Self {
            to_unicode,
            differences,
        }
    }

    /// `/ToUnicode` first, then `/Differences`, then the base encoding
    /// (identity for composite fonts, WinAnsi for simple ones).
    pub(crate) fn decode(&self, code: u32, two_byte: bool) -> String {
        if let Some(text) = self.to_unicode.get(&code) {
            return text.clone();
        }
        if let Some(text) = self.differences.get(&code) {
            return text.clone();
        }
        let ch = if two_byte {
            char::from_u32(code)
        } else {
            win_ansi_char(code)
        };
        ch.unwrap_or('\u{FFFD}').to_string()
    }
}

/// Collects `bfchar` and `bfrange` mappings from a ToUnicode CMap.
pub(crate) fn parse_to_unicode(data: &[u8]) -> BTreeMap<u32, String> {
    let content = String::from_utf8_lossy(data);
    let mut map = BTreeMap::new();

    for section in sections(&content, "beginbfchar", "endbfchar") {
        for caps in BFCHAR.captures_iter(section) {
            if let (Ok(src), Some(dst)) = (u32::from_str_radix(&caps[1], 16), utf16_hex(&caps[2])) {
                map.insert(src, dst);
            }
        }
    }

    for section in sections(&content, "beginbfrange", "endbfrange") {
        for line in section.lines() {
            parse_bfrange_line(line, &mut map);
        }
    }
    map
}

fn parse_bfrange_line(line: &str, map: &mut BTreeMap<u32, String>) {
    if let Some(caps) = BFRANGE_ARRAY.captures(line) {
        let (Ok(start), Ok(end)) = (
            u32::from_str_radix(&caps[1], 16),
            u32::from_str_radix(&caps[2], 16),
        ) else {
            return;
        };
        if end < start || end - start > MAX_RANGE {
            return;
        }
        for (code, dst) in (start..=end).zip(HEX.captures_iter(&caps[3])) {
            if let Some(text) = utf16_hex(&dst[1]) {
                map.insert(code, text);
            }
        }
    } else if let Some(caps) = BFRANGE_SEQ.captures(line) {
        let (Ok(start), Ok(end)) = (
            u32::from_str_radix(&caps[1], 16),
            u32::from_str_radix(&caps[2], 16),
        ) else {
            return;
        };
        if end < start || end - start > MAX_RANGE {
            return;
        }
        let Some(mut units) = utf16_units(&caps[3]) else {
            return;
        };
        for code in start..=end {
            if let Ok(text) = String::from_utf16(&units) {
                map.insert(code, text);
            }
            // Only the last UTF-16 unit steps through the range
            if let Some(last) = units.last_mut() {
                *last = last.wrapping_add(1);
            }
        }
    }
}

/// Bodies between each `begin` and the following `end` keyword.
fn sections<'a>(content: &'a str, begin: &str, end: &str) -> Vec<&'a str> {
    let mut found = Vec::new();
    let mut rest = content;
    while let Some(start) = rest.find(begin) {
        let body = &rest[start + begin.len()..];
        match body.find(end) {
            Some(stop) => {
                found.push(&body[..stop]);
                rest = &body[stop + end.len()..];
            }
            None => break,
        }
    }
    found
}

fn utf16_units(hex: &str) -> Option<Vec<u16>> {
    if hex.is_empty() {
        return None;
    }
    // Two-digit destinations appear in some producers' CMaps
    if hex.len() <= 2 {
        return u16::from_str_radix(hex, 16).ok().map(|unit| vec![unit]);
    }
    if hex.len() % 4 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(4)
        .map(|i| u16::from_str_radix(&hex[i..i + 4], 16).ok())
        .collect()
}

/// Destination hex as UTF-16BE, covering surrogate pairs and ligatures.
fn utf16_hex(hex: &str) -> Option<String> {
    String::from_utf16(&utf16_units(hex)?).ok()
}

/// An integer sets the next code; every name after it takes one code.
fn parse_differences(document: &Document, obj: &Object) -> BTreeMap<u32, String> {
    let mut map = BTreeMap::new();
    let Ok(entries) = obj.as_array() else {
        return map;
    };
    let mut next_code: Option<u32> = None;
    for entry in entries {
        match resolve(document, entry) {
            Object::Integer(code) if (0..=255).contains(code) => next_code = Some(*code as u32),
            Object::Name(name) => {
                if let Some(code) = next_code {
                    if let Some(text) = glyph_name_text(&String::from_utf8_lossy(name)) {
                        map.insert(code, text);
                    }
                    next_code = if code < 255 { Some(code + 1) } else { None };
                }
            }
            _ => {}
        }
    }
    map
}

fn glyph_name_text(name: &str) -> Option<String> {
    let mut chars = name.chars();
    if let (Some(ch), None) = (chars.next(), chars.next()) {
        return Some(ch.to_string());
    }
    if let Some((_, text)) = GLYPH_NAMES.iter().find(|(glyph, _)| *glyph == name) {
        return Some((*text).to_string());
    }
    // uniXXXX (possibly several) and uXXXX[XX]
    if let Some(hex) = name.strip_prefix("uni") {
        return utf16_hex(hex);
    }
    if let Some(hex) = name.strip_prefix('u') {
        if (4..=6).contains(&hex.len()) {
            return u32::from_str_radix(hex, 16)
                .ok()
                .and_then(char::from_u32)
                .map(String::from);
        }
    }
    None
}

fn win_ansi_char(code: u32) -> Option<char> {
    match code {
        0x80..=0x9F => match WIN_ANSI_HIGH[(code - 0x80) as usize] {
            0 => None,
            mapped => char::from_u32(u32::from(mapped)),
        },
        0..=0xFF => char::from_u32(code),
        _ => None,
    }
}
