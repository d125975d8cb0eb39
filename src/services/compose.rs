//! Exam paper composition: stamps per-student barcodes (and optionally
//! the student's shaped name) onto each page of an exam template, and
//! merges the per-student documents into one combined PDF for printing.
//!
//! Templates are either PDFs or single images. Image templates become a
//! one-page document whose media box equals the image's pixel
//! dimensions, so anchor coordinates captured against the image remain
//! valid 1:1.

use std::collections::HashMap;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use thiserror::Error;
use ttf_parser::Face;

use crate::services::barcode::{self, BarcodeError, PageIdentity};

// Stamp geometry in page units. Bars are drawn as vector rectangles;
// the human-readable caption sits below them in built-in Helvetica.
const MODULE_WIDTH: f64 = 1.3;
const BAR_HEIGHT: f64 = 45.0;
const CAPTION_SIZE: f64 = 10.0;
const CAPTION_GAP: f64 = 12.0;
const NAME_SIZE: f64 = 14.0;
const NAME_GAP: f64 = 6.0;

const CAPTION_FONT_NAME: &str = "XBarCap";
const NAME_FONT_NAME: &str = "XStuName";

#[derive(Debug, Error)]
pub(crate) enum ComposeError {
    #[error("template file is missing")]
    TemplateMissing,
    #[error("name font resource is missing or invalid")]
    FontMissing,
    #[error("unsupported template type: {0}")]
    UnsupportedTemplate(String),
    #[error("template has no pages")]
    EmptyTemplate,
    #[error(transparent)]
    Barcode(#[from] BarcodeError),
    #[error("pdf processing failed: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("image decoding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("content encoding failed: {0}")]
    Content(String),
    #[error("pdf serialization failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PageAnchor {
    pub(crate) x: f64,
    pub(crate) y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PageStampSpec {
    pub(crate) page_number: i32,
    pub(crate) barcode_value: String,
    pub(crate) anchor: PageAnchor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TemplateKind {
    Pdf,
    Jpeg,
    Png,
}

impl TemplateKind {
    pub(crate) fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "pdf" => Some(Self::Pdf),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }
}

/// Deterministic stamp plan for one (exam, student) pair: one entry per
/// page, barcode values derived from ids, page anchors falling back to
/// the exam-level anchor.
pub(crate) fn build_stamp_plan(
    exam_id: i32,
    student_id: i32,
    page_count: i32,
    default_anchor: PageAnchor,
    page_overrides: &HashMap<i32, PageAnchor>,
) -> Vec<PageStampSpec> {
    (1..=page_count)
        .map(|page_number| PageStampSpec {
            page_number,
            barcode_value: barcode::format_value(PageIdentity {
                exam_id,
                student_id,
                page_number,
            }),
            anchor: page_overrides.get(&page_number).copied().unwrap_or(default_anchor),
        })
        .collect()
}

pub(crate) fn template_page_count(
    kind: TemplateKind,
    bytes: &[u8],
) -> Result<i32, ComposeError> {
    match kind {
        TemplateKind::Pdf => {
            let doc = Document::load_mem(bytes)?;
            let count = doc.get_pages().len() as i32;
            if count == 0 {
                return Err(ComposeError::EmptyTemplate);
            }
            Ok(count)
        }
        TemplateKind::Jpeg | TemplateKind::Png => {
            image::load_from_memory(bytes)?;
            Ok(1)
        }
    }
}

/// Loads the template as a fresh document, ready for stamping. Each
/// student gets their own copy.
pub(crate) fn open_template(
    kind: TemplateKind,
    bytes: &[u8],
) -> Result<Document, ComposeError> {
    match kind {
        TemplateKind::Pdf => {
            let doc = Document::load_mem(bytes)?;
            if doc.get_pages().is_empty() {
                return Err(ComposeError::EmptyTemplate);
            }
            Ok(doc)
        }
        TemplateKind::Jpeg => image_document(bytes, true),
        TemplateKind::Png => image_document(bytes, false),
    }
}

/// Wraps an image into a one-page PDF at its native pixel dimensions.
/// JPEG bytes pass through as a DCT-encoded image object; PNG is
/// decoded to raw RGB samples.
fn image_document(bytes: &[u8], jpeg_passthrough: bool) -> Result<Document, ComposeError> {
    let decoded = image::load_from_memory(bytes)?;
    let width = decoded.width() as i64;
    let height = decoded.height() as i64;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image_stream = if jpeg_passthrough {
        let color_space = match decoded.color() {
            image::ColorType::L8 | image::ColorType::L16 => "DeviceGray",
            _ => "DeviceRGB",
        };
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => color_space,
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            bytes.to_vec(),
        )
    } else {
        let rgb = decoded.to_rgb8();
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            rgb.into_raw(),
        )
    };
    let image_id = doc.add_object(image_stream);

    let operations = vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                (width as f32).into(),
                0.into(),
                0.into(),
                (height as f32).into(),
                0.into(),
                0.into(),
            ],
        ),
        Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
        Operation::new("Q", vec![]),
    ];
    let content = Content { operations }
        .encode()
        .map_err(|err| ComposeError::Content(err.to_string()))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, content));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => Object::Reference(pages_id),
        "MediaBox" => vec![0.into(), 0.into(), (width as f32).into(), (height as f32).into()],
        "Contents" => Object::Reference(content_id),
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => Object::Reference(image_id) },
        },
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", catalog_id);

    Ok(doc)
}

/// An owned TTF used for name stamping. Parsed on construction so a
/// broken font fails fast with `FontMissing` instead of corrupting
/// output documents.
pub(crate) struct FontResource {
    data: Vec<u8>,
}

struct GlyphRun {
    bytes: Vec<u8>,
    entries: Vec<(u16, f64)>,
}

impl FontResource {
    pub(crate) fn new(data: Vec<u8>) -> Result<Self, ComposeError> {
        Face::parse(&data, 0).map_err(|_| ComposeError::FontMissing)?;
        Ok(Self { data })
    }

    fn face(&self) -> Result<Face<'_>, ComposeError> {
        Face::parse(&self.data, 0).map_err(|_| ComposeError::FontMissing)
    }

    /// Maps shaped text to glyph ids with widths in 1000-unit glyph
    /// space, as required by the CID width array.
    fn glyph_run(&self, text: &str) -> Result<GlyphRun, ComposeError> {
        let face = self.face()?;
        let upem = face.units_per_em() as f64;

        let mut bytes = Vec::with_capacity(text.len() * 2);
        let mut entries = Vec::new();
        for c in text.chars() {
            let glyph = face.glyph_index(c).unwrap_or(ttf_parser::GlyphId(0));
            let advance = face.glyph_hor_advance(glyph).unwrap_or(0) as f64;
            let width = advance * 1000.0 / upem;
            bytes.extend_from_slice(&glyph.0.to_be_bytes());
            entries.push((glyph.0, width));
        }
        Ok(GlyphRun { bytes, entries })
    }
}

/// Embeds the font as an Identity-H CIDFontType2 and returns the font
/// object plus the ready-to-show glyph string for `text`.
fn embed_name_font(
    doc: &mut Document,
    font: &FontResource,
    text: &str,
) -> Result<(ObjectId, Vec<u8>), ComposeError> {
    let run = font.glyph_run(text)?;
    let face = font.face()?;
    let upem = face.units_per_em() as f64;
    let scale = 1000.0 / upem;
    let bbox = face.global_bounding_box();

    let font_file_id = doc.add_object(Stream::new(
        dictionary! { "Length1" => font.data.len() as i64 },
        font.data.clone(),
    ));

    let descriptor_id = doc.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => "ExamScanName",
        "Flags" => 4,
        "FontBBox" => vec![
            ((bbox.x_min as f64 * scale) as f32).into(),
            ((bbox.y_min as f64 * scale) as f32).into(),
            ((bbox.x_max as f64 * scale) as f32).into(),
            ((bbox.y_max as f64 * scale) as f32).into(),
        ],
        "ItalicAngle" => 0,
        "Ascent" => ((face.ascender() as f64 * scale) as f32),
        "Descent" => ((face.descender() as f64 * scale) as f32),
        "CapHeight" => ((face.ascender() as f64 * scale) as f32),
        "StemV" => 80,
        "FontFile2" => Object::Reference(font_file_id),
    });

    let mut widths: Vec<Object> = Vec::with_capacity(run.entries.len() * 2);
    for (glyph_id, width) in &run.entries {
        widths.push((*glyph_id as i64).into());
        widths.push(Object::Array(vec![(*width as f32).into()]));
    }

    let cid_font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "CIDFontType2",
        "BaseFont" => "ExamScanName",
        "CIDSystemInfo" => dictionary! {
            "Registry" => Object::string_literal("Adobe"),
            "Ordering" => Object::string_literal("Identity"),
            "Supplement" => 0,
        },
        "FontDescriptor" => Object::Reference(descriptor_id),
        "DW" => 1000,
        "W" => widths,
        "CIDToGIDMap" => "Identity",
    });

    let type0_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => "ExamScanName",
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![Object::Reference(cid_font_id)],
    });

    Ok((type0_id, run.bytes))
}

/// Stamps every page of `template` per the plan. `name_stamp` carries
/// the already-shaped student name and the embedding font.
pub(crate) fn compose_student(
    kind: TemplateKind,
    template_bytes: &[u8],
    plan: &[PageStampSpec],
    name_stamp: Option<(&str, &FontResource)>,
) -> Result<Document, ComposeError> {
    let mut doc = open_template(kind, template_bytes)?;

    let caption_font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let name_font = match name_stamp {
        Some((name, font)) => Some(embed_name_font(&mut doc, font, name)?),
        None => None,
    };

    let pages: Vec<(u32, ObjectId)> = doc.get_pages().into_iter().collect();
    for spec in plan {
        let Some((_, page_id)) = pages.iter().find(|(n, _)| *n as i32 == spec.page_number)
        else {
            continue;
        };
        let page_id = *page_id;

        materialize_resources(&mut doc, page_id)?;
        add_page_font(&mut doc, page_id, CAPTION_FONT_NAME, caption_font_id)?;
        if let Some((font_id, _)) = &name_font {
            add_page_font(&mut doc, page_id, NAME_FONT_NAME, *font_id)?;
        }

        let ops = stamp_operations(spec, name_font.as_ref().map(|(_, bytes)| bytes.as_slice()))?;
        append_page_content(&mut doc, page_id, ops)?;
    }

    Ok(doc)
}

/// The stamp drawing for one page: vector bars, the caption under
/// them, and optionally the shaped name above.
fn stamp_operations(
    spec: &PageStampSpec,
    name_glyphs: Option<&[u8]>,
) -> Result<Vec<u8>, ComposeError> {
    let pattern = barcode::bar_pattern(&spec.barcode_value)?;
    let PageAnchor { x, y } = spec.anchor;
    let bars_bottom = y + CAPTION_GAP;

    let mut operations = vec![
        Operation::new("q", vec![]),
        Operation::new("rg", vec![0.into(), 0.into(), 0.into()]),
    ];

    // Consecutive set modules collapse into one rectangle.
    let mut run_start: Option<usize> = None;
    for (index, module) in pattern.iter().chain(std::iter::once(&0u8)).enumerate() {
        match (*module, run_start) {
            (1, None) => run_start = Some(index),
            (0, Some(start)) => {
                let rect_x = x + start as f64 * MODULE_WIDTH;
                let rect_w = (index - start) as f64 * MODULE_WIDTH;
                operations.push(Operation::new(
                    "re",
                    vec![
                        (rect_x as f32).into(),
                        (bars_bottom as f32).into(),
                        (rect_w as f32).into(),
                        (BAR_HEIGHT as f32).into(),
                    ],
                ));
                run_start = None;
            }
            _ => {}
        }
    }
    operations.push(Operation::new("f", vec![]));

    operations.extend([
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![Object::Name(CAPTION_FONT_NAME.into()), (CAPTION_SIZE as f32).into()],
        ),
        Operation::new("Td", vec![(x as f32).into(), (y as f32).into()]),
        Operation::new("Tj", vec![Object::string_literal(spec.barcode_value.as_str())]),
        Operation::new("ET", vec![]),
    ]);

    if let Some(glyphs) = name_glyphs {
        let name_y = bars_bottom + BAR_HEIGHT + NAME_GAP;
        operations.extend([
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![Object::Name(NAME_FONT_NAME.into()), (NAME_SIZE as f32).into()],
            ),
            Operation::new("Td", vec![(x as f32).into(), (name_y as f32).into()]),
            Operation::new(
                "Tj",
                vec![Object::String(glyphs.to_vec(), StringFormat::Hexadecimal)],
            ),
            Operation::new("ET", vec![]),
        ]);
    }

    operations.push(Operation::new("Q", vec![]));

    Content { operations }.encode().map_err(|err| ComposeError::Content(err.to_string()))
}

/// Copies the page's effective Resources dictionary (possibly inherited
/// through the page tree) onto the page itself so fonts can be added
/// without mutating shared state.
fn materialize_resources(doc: &mut Document, page_id: ObjectId) -> Result<(), ComposeError> {
    let resources = resolved_resources(doc, page_id).unwrap_or_default();
    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page.set("Resources", Object::Dictionary(resources));
    Ok(())
}

fn resolved_resources(doc: &Document, page_id: ObjectId) -> Option<Dictionary> {
    let mut current = Some(page_id);
    while let Some(id) = current {
        let dict = doc.get_object(id).ok()?.as_dict().ok()?;
        if let Ok(resources) = dict.get(b"Resources") {
            return match resources {
                Object::Reference(reference) => {
                    doc.get_object(*reference).ok()?.as_dict().ok().cloned()
                }
                Object::Dictionary(direct) => Some(direct.clone()),
                _ => None,
            };
        }
        current = dict.get(b"Parent").ok().and_then(|parent| parent.as_reference().ok());
    }
    None
}

fn add_page_font(
    doc: &mut Document,
    page_id: ObjectId,
    name: &str,
    font_id: ObjectId,
) -> Result<(), ComposeError> {
    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    let resources = page.get_mut(b"Resources")?.as_dict_mut()?;

    if !resources.has(b"Font") {
        resources.set("Font", Dictionary::new());
    }
    resources.get_mut(b"Font")?.as_dict_mut()?.set(name, Object::Reference(font_id));
    Ok(())
}

/// Appends the stamp as its own content stream, preceded by a
/// graphics-state save so the template's trailing state cannot leak
/// into the stamp.
fn append_page_content(
    doc: &mut Document,
    page_id: ObjectId,
    stamp_content: Vec<u8>,
) -> Result<(), ComposeError> {
    let prefix_id = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
    let mut suffix = b"Q\n".to_vec();
    suffix.extend_from_slice(&stamp_content);
    let suffix_id = doc.add_object(Stream::new(dictionary! {}, suffix));

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    let mut contents: Vec<Object> = vec![Object::Reference(prefix_id)];
    match page.get(b"Contents") {
        Ok(Object::Reference(existing)) => contents.push(Object::Reference(*existing)),
        Ok(Object::Array(existing)) => contents.extend(existing.clone()),
        _ => {}
    }
    contents.push(Object::Reference(suffix_id));
    page.set("Contents", Object::Array(contents));
    Ok(())
}

/// Concatenates per-student documents into one combined PDF.
pub(crate) fn merge_documents(documents: Vec<Document>) -> Result<Vec<u8>, ComposeError> {
    let mut merged = Document::with_version("1.5");
    let mut max_id = 1;
    let mut page_ids: Vec<ObjectId> = Vec::new();

    for mut doc in documents {
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        for &page_id in &pages {
            materialize_inherited_media_box(&mut doc, page_id);
        }
        merged.objects.extend(doc.objects);
        page_ids.extend(pages);
    }

    if page_ids.is_empty() {
        return Err(ComposeError::EmptyTemplate);
    }

    merged.max_id = max_id;
    let pages_id = merged.new_object_id();
    for &page_id in &page_ids {
        if let Ok(page) = merged.get_object_mut(page_id).and_then(Object::as_dict_mut) {
            page.set("Parent", Object::Reference(pages_id));
        }
    }

    let kids: Vec<Object> = page_ids.iter().map(|id| Object::Reference(*id)).collect();
    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_ids.len() as i64,
        }),
    );
    let catalog_id = merged.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    merged.trailer.set("Root", catalog_id);
    merged.compress();

    let mut buffer = Vec::new();
    merged.save_to(&mut buffer)?;
    Ok(buffer)
}

/// Reparenting a page under a fresh Pages node severs attribute
/// inheritance, so the media box is copied down first.
fn materialize_inherited_media_box(doc: &mut Document, page_id: ObjectId) {
    if let Ok(page) = doc.get_object(page_id).and_then(Object::as_dict) {
        if page.has(b"MediaBox") {
            return;
        }
    }

    let mut current = Some(page_id);
    let mut media_box: Option<Object> = None;
    while let Some(id) = current {
        let Ok(dict) = doc.get_object(id).and_then(Object::as_dict) else { break };
        if id != page_id {
            if let Ok(found) = dict.get(b"MediaBox") {
                media_box = Some(match found {
                    Object::Reference(reference) => doc
                        .get_object(*reference)
                        .cloned()
                        .unwrap_or(Object::Null),
                    direct => direct.clone(),
                });
                break;
            }
        }
        current = dict.get(b"Parent").ok().and_then(|parent| parent.as_reference().ok());
    }

    if let Some(media_box) = media_box {
        if let Ok(page) = doc.get_object_mut(page_id).and_then(Object::as_dict_mut) {
            page.set("MediaBox", media_box);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_pdf(pages: usize) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids = Vec::new();
        for _ in 0..pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => Object::Reference(pages_id),
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                "Contents" => Object::Reference(content_id),
            });
            kids.push(Object::Reference(page_id));
        }
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([255, 255, 255]));
        let mut bytes = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut bytes, image::ImageFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    fn anchor(x: f64, y: f64) -> PageAnchor {
        PageAnchor { x, y }
    }

    #[test]
    fn template_kind_from_extension() {
        assert_eq!(TemplateKind::from_extension("pdf"), Some(TemplateKind::Pdf));
        assert_eq!(TemplateKind::from_extension("jpg"), Some(TemplateKind::Jpeg));
        assert_eq!(TemplateKind::from_extension("jpeg"), Some(TemplateKind::Jpeg));
        assert_eq!(TemplateKind::from_extension("png"), Some(TemplateKind::Png));
        assert_eq!(TemplateKind::from_extension("docx"), None);
    }

    #[test]
    fn stamp_plan_is_deterministic_and_uses_overrides() {
        let mut overrides = HashMap::new();
        overrides.insert(2, anchor(10.0, 20.0));

        let first = build_stamp_plan(5, 12, 3, anchor(40.0, 700.0), &overrides);
        let second = build_stamp_plan(5, 12, 3, anchor(40.0, 700.0), &overrides);
        assert_eq!(first, second);

        assert_eq!(first.len(), 3);
        assert_eq!(first[0].barcode_value, "5-12-1");
        assert_eq!(first[2].barcode_value, "5-12-3");
        assert_eq!(first[0].anchor, anchor(40.0, 700.0));
        assert_eq!(first[1].anchor, anchor(10.0, 20.0));
    }

    #[test]
    fn page_count_for_pdf_and_image_templates() {
        let pdf = blank_pdf(3);
        assert_eq!(template_page_count(TemplateKind::Pdf, &pdf).unwrap(), 3);

        let png = png_bytes(4, 4);
        assert_eq!(template_page_count(TemplateKind::Png, &png).unwrap(), 1);
    }

    #[test]
    fn invalid_template_bytes_are_rejected() {
        assert!(template_page_count(TemplateKind::Pdf, b"not a pdf").is_err());
        assert!(template_page_count(TemplateKind::Png, b"not an image").is_err());
    }

    #[test]
    fn image_template_page_matches_pixel_dimensions() {
        let png = png_bytes(120, 80);
        let doc = open_template(TemplateKind::Png, &png).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 1);

        let page_id = *pages.values().next().unwrap();
        let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
        let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
        assert_eq!(media_box[2].as_float().unwrap(), 120.0);
        assert_eq!(media_box[3].as_float().unwrap(), 80.0);
    }

    #[test]
    fn compose_preserves_page_count_and_appends_content() {
        let pdf = blank_pdf(2);
        let plan = build_stamp_plan(5, 12, 2, anchor(40.0, 700.0), &HashMap::new());
        let doc = compose_student(TemplateKind::Pdf, &pdf, &plan, None).unwrap();

        let pages = doc.get_pages();
        assert_eq!(pages.len(), 2);

        for page_id in pages.values() {
            let page = doc.get_object(*page_id).unwrap().as_dict().unwrap();
            // Save-state prefix, original content, stamp suffix.
            let contents = page.get(b"Contents").unwrap().as_array().unwrap();
            assert_eq!(contents.len(), 3);
            // The stamp registered the caption font on the page.
            let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
            let fonts = resources.get(b"Font").unwrap().as_dict().unwrap();
            assert!(fonts.has(CAPTION_FONT_NAME.as_bytes()));
        }
    }

    #[test]
    fn compose_twice_yields_identical_stamp_plan() {
        let plan_a = build_stamp_plan(5, 12, 2, anchor(40.0, 700.0), &HashMap::new());
        let plan_b = build_stamp_plan(5, 12, 2, anchor(40.0, 700.0), &HashMap::new());
        let values_a: Vec<&str> =
            plan_a.iter().map(|spec| spec.barcode_value.as_str()).collect();
        let values_b: Vec<&str> =
            plan_b.iter().map(|spec| spec.barcode_value.as_str()).collect();
        assert_eq!(values_a, values_b);
    }

    #[test]
    fn merge_concatenates_student_documents() {
        let pdf = blank_pdf(2);
        let plan = build_stamp_plan(5, 12, 2, anchor(40.0, 700.0), &HashMap::new());
        let first = compose_student(TemplateKind::Pdf, &pdf, &plan, None).unwrap();

        let plan2 = build_stamp_plan(5, 31, 2, anchor(40.0, 700.0), &HashMap::new());
        let second = compose_student(TemplateKind::Pdf, &pdf, &plan2, None).unwrap();

        let merged_bytes = merge_documents(vec![first, second]).unwrap();
        let merged = Document::load_mem(&merged_bytes).unwrap();
        assert_eq!(merged.get_pages().len(), 4);
    }

    #[test]
    fn one_bad_template_does_not_abort_a_batch() {
        let good = blank_pdf(1);
        let templates: Vec<(i32, &[u8])> =
            vec![(12, &good), (31, b"not a pdf"), (44, &good)];

        let mut documents = Vec::new();
        let mut failures = Vec::new();
        for (student_id, bytes) in templates {
            let plan = build_stamp_plan(5, student_id, 1, anchor(40.0, 700.0), &HashMap::new());
            match compose_student(TemplateKind::Pdf, bytes, &plan, None) {
                Ok(doc) => documents.push(doc),
                Err(_) => failures.push(student_id),
            }
        }

        assert_eq!(documents.len(), 2);
        assert_eq!(failures, vec![31]);
        let merged = merge_documents(documents).unwrap();
        assert_eq!(Document::load_mem(&merged).unwrap().get_pages().len(), 2);
    }

    #[test]
    fn merge_of_nothing_is_an_error() {
        assert!(matches!(merge_documents(vec![]), Err(ComposeError::EmptyTemplate)));
    }

    #[test]
    fn broken_font_bytes_fail_fast() {
        assert!(matches!(
            FontResource::new(b"not a font".to_vec()),
            Err(ComposeError::FontMissing)
        ));
    }
}
