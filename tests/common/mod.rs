// Test fixtures - real PDFs built with lopdf
#![allow(dead_code)]

use lopdf::{dictionary, Document, Object, Stream};
use std::fs;
use std::path::{Path, PathBuf};

pub const YELLOW: [f32; 3] = [1.0, 1.0, 0.0];
pub const BLUE: [f32; 3] = [0.0, 0.0, 1.0];

/// Every page carries one line of text at (72, 700) reading
/// `Step <n> check pads`; highlights cover exactly that line.
pub struct PdfFixture {
    pages: usize,
    highlights: Vec<(usize, [f32; 3])>,
    padding_kb: usize,
    garbage_kb: usize,
}

impl PdfFixture {
    pub fn new(pages: usize) -> Self {
        Self {
            pages,
            highlights: Vec::new(),
            padding_kb: 0,
            garbage_kb: 0,
        }
    }

    /// Highlight on a 0-based page.
    pub fn highlight(mut self, page: usize, color: [f32; 3]) -> Self {
        self.highlights.push((page, color));
        self
    }

    /// Incompressible bytes spread evenly over the pages, so any subset of
    /// pages carries its share of the size.
    pub fn padded_to_kb(mut self, kb: usize) -> Self {
        self.padding_kb = kb;
        self
    }

    /// An unreferenced, highly compressible stream that compaction drops.
    pub fn with_garbage_kb(mut self, kb: usize) -> Self {
        self.garbage_kb = kb;
        self
    }

    pub fn build(&self) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let per_page = self.padding_kb * 1024 / self.pages.max(1);
        let mut noise = Lcg(0x5eed_1234_abcd_0001);
        let mut kids = Vec::with_capacity(self.pages);

        for index in 0..self.pages {
            let content = format!("BT /F1 12 Tf 72 700 Td (Step {} check pads) Tj ET", index + 1);
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

            let mut xobjects = lopdf::Dictionary::new();
            if per_page > 0 {
                let pad_id = doc.add_object(Stream::new(
                    dictionary! {
                        "Type" => "XObject",
                        "Subtype" => "Image",
                        "Width" => Object::Integer(per_page as i64),
                        "Height" => Object::Integer(1),
                        "ColorSpace" => "DeviceGray",
                        "BitsPerComponent" => Object::Integer(8),
                    },
                    noise.bytes(per_page),
                ));
                xobjects.set("Pad", pad_id);
            }

            let annots: Vec<Object> = self
                .highlights
                .iter()
                .filter(|(page, _)| *page == index)
                .map(|(_, color)| {
                    Object::Dictionary(dictionary! {
                        "Type" => "Annot",
                        "Subtype" => "Highlight",
                        "Rect" => vec![
                            Object::Integer(60),
                            Object::Integer(690),
                            Object::Integer(400),
                            Object::Integer(715),
                        ],
                        "C" => color.iter().map(|c| Object::Real(*c)).collect::<Vec<_>>(),
                    })
                })
                .collect();

            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ],
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                    "XObject" => xobjects,
                },
                "Annots" => annots,
            });
            kids.push(Object::Reference(page_id));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => Object::Integer(self.pages as i64),
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        if self.garbage_kb > 0 {
            doc.add_object(Stream::new(dictionary! {}, vec![b'x'; self.garbage_kb * 1024]));
        }
        doc
    }

    pub fn write(&self, path: &Path) -> PathBuf {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut doc = self.build();
        doc.save(path).unwrap();
        path.to_path_buf()
    }
}

/// Deterministic noise, so fixture sizes are reproducible.
struct Lcg(u64);

impl Lcg {
    fn bytes(&mut self, len: usize) -> Vec<u8> {
        (0..len)
            .map(|_| {
                self.0 = self
                    .0
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                (self.0 >> 33) as u8
            })
            .collect()
    }
}

pub fn page_count(path: &Path) -> usize {
    Document::load(path).unwrap().get_pages().len()
}

pub fn size_kb(path: &Path) -> f64 {
    fs::metadata(path).unwrap().len() as f64 / 1024.0
}

/// Every `.pdf` under `dir`, sorted.
pub fn pdfs_under(dir: &Path) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map_or(false, |ext| ext == "pdf"))
        .map(|e| e.into_path())
        .collect();
    found.sort();
    found
}
