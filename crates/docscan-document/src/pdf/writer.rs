// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF writer. Builds multi-page PDFs from scanned images (optionally with an
// invisible OCR text layer) or from plain text using `printpdf` 0.8, then
// stamps the `/Info` dictionary with `lopdf`.
//
// printpdf 0.8 uses a data-oriented API: documents are built by constructing
// `PdfPage` structs containing `Vec<Op>` operation lists, then serialised via
// `PdfDocument::save()`.

use std::path::Path;

use chrono::{DateTime, Utc};
use docscan_core::config::PdfSettings;
use docscan_core::error::{DocscanError, Result};
use docscan_core::{PaperSize, PdfMetadata};
use image::DynamicImage;
use lopdf::{Dictionary, Object, StringFormat};
use printpdf::{
    BuiltinFont, ImageCompression, ImageOptimizationOptions, Mm, Op, PdfDocument, PdfPage,
    PdfSaveOptions, PdfWarnMsg, Point, Pt, RawImage, RawImageData, RawImageFormat, TextItem,
    TextRenderingMode, XObjectTransform,
};
use tracing::{debug, info, instrument};

use crate::document::Document;
use crate::image::processor::ImageProcessor;

/// Resolution images are embedded at before being scaled to the page.
const IMAGE_DPI: f32 = 300.0;
/// Invisible text layer: font size, leading, and line cap.
const TEXT_LAYER_FONT_PT: f32 = 8.0;
const TEXT_LAYER_LEADING_PT: f32 = 10.0;
const TEXT_LAYER_MAX_LINES: usize = 50;

/// Where an image ended up on the page, in points.
struct Placement {
    ops: Vec<Op>,
    x: f32,
    y: f32,
    height: f32,
}

/// Creates PDF documents from scanned pages or text.
pub struct PdfWriter {
    paper_size: PaperSize,
    margin_mm: f32,
    /// Longest image side, in pixels, before embedding.
    max_image_dimension: u32,
    /// JPEG quality (1-100) for colour images.
    image_quality: u8,
    metadata: PdfMetadata,
}

impl PdfWriter {
    /// Writer with 0.5 in margins, a 2480 px image cap, and default metadata.
    pub fn new(paper_size: PaperSize) -> Self {
        let defaults = PdfSettings::default();
        Self {
            paper_size,
            margin_mm: defaults.margin_mm(),
            max_image_dimension: defaults.max_image_dimension,
            image_quality: defaults.quality,
            metadata: defaults.metadata,
        }
    }

    pub fn a4() -> Self {
        Self::new(PaperSize::A4)
    }

    pub fn from_settings(settings: &PdfSettings) -> Self {
        Self {
            paper_size: settings.paper_size,
            margin_mm: settings.margin_mm(),
            max_image_dimension: settings.max_image_dimension,
            image_quality: settings.quality.clamp(1, 100),
            metadata: settings.metadata.clone(),
        }
    }

    pub fn paper_size(&self) -> PaperSize {
        self.paper_size
    }

    pub fn set_paper_size(&mut self, paper_size: PaperSize) {
        self.paper_size = paper_size;
    }

    pub fn set_margin_mm(&mut self, margin_mm: f32) {
        self.margin_mm = margin_mm.max(0.0);
    }

    pub fn set_max_image_dimension(&mut self, max_dimension: u32) {
        self.max_image_dimension = max_dimension;
    }

    pub fn set_image_quality(&mut self, quality: u8) {
        self.image_quality = quality.clamp(1, 100);
    }

    pub fn metadata(&self) -> &PdfMetadata {
        &self.metadata
    }

    pub fn set_metadata(&mut self, metadata: PdfMetadata) {
        self.metadata = metadata;
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.metadata.title = title.into();
    }

    pub fn set_author(&mut self, author: impl Into<String>) {
        self.metadata.author = author.into();
    }

    /// Paper dimensions in printpdf's Mm units.
    fn page_dimensions(&self) -> (Mm, Mm) {
        let (w_mm, h_mm) = self.paper_size.dimensions_mm();
        (Mm(w_mm as f32), Mm(h_mm as f32))
    }

    // -- Images to PDF --------------------------------------------------------

    /// One page per image, each fitted inside the margins and centred.
    #[instrument(skip_all, fields(images = images.len()))]
    pub fn create_from_images(&self, images: &[DynamicImage]) -> Result<Vec<u8>> {
        self.render_pages(images.iter().map(|image| (image, None)))
    }

    /// Like [`PdfWriter::create_from_images`], with each page's OCR text laid
    /// over the image as invisible, searchable text. `texts` is matched to
    /// `images` by position; missing entries mean no text layer.
    #[instrument(skip_all, fields(images = images.len()))]
    pub fn create_searchable(
        &self,
        images: &[DynamicImage],
        texts: &[Option<String>],
    ) -> Result<Vec<u8>> {
        self.render_pages(
            images
                .iter()
                .enumerate()
                .map(|(i, image)| (image, texts.get(i).and_then(|t| t.as_deref()))),
        )
    }

    /// Export every page of a document, in order. With `searchable`, pages
    /// that carry OCR text get an invisible text layer.
    #[instrument(skip_all, fields(pages = document.len(), searchable))]
    pub fn create_from_document(&self, document: &Document, searchable: bool) -> Result<Vec<u8>> {
        self.render_pages(document.pages().iter().map(|page| {
            let text = if searchable { page.text.as_deref() } else { None };
            (&page.image, text)
        }))
    }

    fn render_pages<'a>(
        &self,
        pages: impl Iterator<Item = (&'a DynamicImage, Option<&'a str>)>,
    ) -> Result<Vec<u8>> {
        let (page_w, page_h) = self.page_dimensions();
        info!(paper = %self.paper_size, title = %self.metadata.title, "Creating image PDF");

        let mut doc = PdfDocument::new(&self.metadata.title);
        let mut pdf_pages = Vec::new();

        for (index, (image, text)) in pages.enumerate() {
            let placement = self.place_image(&mut doc, image, index);
            let text_ops = text
                .map(|text| invisible_text_ops(text, &placement))
                .unwrap_or_default();
            let mut ops = placement.ops;
            ops.extend(text_ops);
            pdf_pages.push(PdfPage::new(page_w, page_h, ops));
        }

        if pdf_pages.is_empty() {
            return Err(DocscanError::EmptyDocument);
        }

        let page_count = pdf_pages.len();
        doc.with_pages(pdf_pages);
        let bytes = self.finish(&doc)?;
        debug!(pages = page_count, bytes = bytes.len(), "Image PDF complete");
        Ok(bytes)
    }

    /// Embed `image` and draw it centred in the usable area, scaled up or
    /// down to fit.
    fn place_image(&self, doc: &mut PdfDocument, image: &DynamicImage, index: usize) -> Placement {
        let rgb = ImageProcessor::from_dynamic(image.clone())
            .fit_within(self.max_image_dimension)
            .into_dynamic()
            .to_rgb8();
        let (px_w, px_h) = rgb.dimensions();

        let raw = RawImage {
            pixels: RawImageData::U8(rgb.into_raw()),
            width: px_w as usize,
            height: px_h as usize,
            data_format: RawImageFormat::RGB8,
            tag: Vec::new(),
        };
        let xobject_id = doc.add_image(&raw);

        let (page_w, page_h) = self.page_dimensions();
        let margin_pt = Mm(self.margin_mm).into_pt().0;
        let usable_w_pt = (page_w.into_pt().0 - 2.0 * margin_pt).max(1.0);
        let usable_h_pt = (page_h.into_pt().0 - 2.0 * margin_pt).max(1.0);

        let img_w_pt = px_w.max(1) as f32 / IMAGE_DPI * 72.0;
        let img_h_pt = px_h.max(1) as f32 / IMAGE_DPI * 72.0;
        let scale = (usable_w_pt / img_w_pt).min(usable_h_pt / img_h_pt);

        let rendered_w_pt = img_w_pt * scale;
        let rendered_h_pt = img_h_pt * scale;
        let x_offset = margin_pt + (usable_w_pt - rendered_w_pt) / 2.0;
        let y_offset = margin_pt + (usable_h_pt - rendered_h_pt) / 2.0;

        debug!(page = index + 1, px_w, px_h, rendered_w_pt, rendered_h_pt, scale, "Image placed on page");

        Placement {
            ops: vec![Op::UseXobject {
                id: xobject_id,
                transform: XObjectTransform {
                    translate_x: Some(Pt(x_offset)),
                    translate_y: Some(Pt(y_offset)),
                    scale_x: Some(scale),
                    scale_y: Some(scale),
                    dpi: Some(IMAGE_DPI),
                    rotate: None,
                },
            }],
            x: x_offset,
            y: y_offset,
            height: rendered_h_pt,
        }
    }

    // -- Text to PDF ----------------------------------------------------------

    /// Lay out plain text top to bottom in Helvetica 11 pt, wrapping long
    /// lines and breaking pages as needed. Used to export OCR results.
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub fn create_from_text(&self, text: &str) -> Result<Vec<u8>> {
        let (page_w, page_h) = self.page_dimensions();
        info!(paper = %self.paper_size, title = %self.metadata.title, "Creating text PDF");

        let font_size_pt: f32 = 11.0;
        let line_height_pt: f32 = 14.0;
        let margin_pt = Mm(self.margin_mm).into_pt().0;
        let usable_width_mm = page_w.0 - 2.0 * self.margin_mm;

        // Average Helvetica glyph is about half the font size wide.
        let avg_char_width_mm: f32 = 0.50 * font_size_pt * 0.3528;
        let max_chars_per_line = ((usable_width_mm / avg_char_width_mm) as usize).max(1);

        let wrapped_lines = wrap_text(text, max_chars_per_line);
        let page_h_pt = page_h.into_pt().0;
        let lines_per_page = (((page_h_pt - 2.0 * margin_pt) / line_height_pt) as usize).max(1);

        let mut pages: Vec<PdfPage> = wrapped_lines
            .chunks(lines_per_page)
            .map(|chunk| {
                let ops = chunk
                    .iter()
                    .enumerate()
                    .flat_map(|(i, line)| {
                        let y_pt = page_h_pt - margin_pt - font_size_pt - i as f32 * line_height_pt;
                        text_line_ops(line, margin_pt, y_pt, font_size_pt, None)
                    })
                    .collect();
                PdfPage::new(page_w, page_h, ops)
            })
            .collect();

        if pages.is_empty() {
            pages.push(PdfPage::new(page_w, page_h, Vec::new()));
        }

        let mut doc = PdfDocument::new(&self.metadata.title);
        doc.with_pages(pages);
        debug!(lines = wrapped_lines.len(), pages = doc.pages.len(), "Text layout complete");
        self.finish(&doc)
    }

    // -- Output ---------------------------------------------------------------

    /// Colour images are JPEG-encoded at `image_quality`; greyscale images
    /// stay lossless. Size is already capped by `max_image_dimension`, so
    /// printpdf's own downscaling is off.
    fn save_options(&self) -> PdfSaveOptions {
        PdfSaveOptions {
            image_optimization: Some(ImageOptimizationOptions {
                quality: Some(f32::from(self.image_quality) / 100.0),
                max_image_size: None,
                format: Some(ImageCompression::Auto),
                ..ImageOptimizationOptions::default()
            }),
            ..PdfSaveOptions::default()
        }
    }

    fn finish(&self, doc: &PdfDocument) -> Result<Vec<u8>> {
        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = doc.save(&self.save_options(), &mut warnings);
        if !warnings.is_empty() {
            debug!(warnings = warnings.len(), "printpdf reported warnings");
        }
        stamp_metadata(&output, &self.metadata, Utc::now())
    }

    pub fn write_images_to_file(&self, images: &[DynamicImage], path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.create_from_images(images)?;
        write_pdf(path.as_ref(), &bytes)
    }

    pub fn write_document_to_file(
        &self,
        document: &Document,
        searchable: bool,
        path: impl AsRef<Path>,
    ) -> Result<()> {
        let bytes = self.create_from_document(document, searchable)?;
        write_pdf(path.as_ref(), &bytes)
    }

    pub fn write_text_to_file(&self, text: &str, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.create_from_text(text)?;
        write_pdf(path.as_ref(), &bytes)
    }
}

fn write_pdf(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    info!("Wrote PDF to {}", path.display());
    Ok(())
}

// -- Metadata -----------------------------------------------------------------

/// Write `metadata` and creation/modification dates into the `/Info`
/// dictionary of an existing PDF.
pub fn stamp_metadata(pdf: &[u8], metadata: &PdfMetadata, now: DateTime<Utc>) -> Result<Vec<u8>> {
    let mut doc = lopdf::Document::load_mem(pdf)
        .map_err(|err| DocscanError::PdfError(format!("failed to reload generated PDF: {err}")))?;

    let date = pdf_date(now);
    let mut entries = vec![
        ("Title", text_string(&metadata.title)),
        ("Author", text_string(&metadata.author)),
        ("Subject", text_string(&metadata.subject)),
        ("Creator", text_string(&metadata.creator)),
        ("Producer", text_string(&metadata.producer)),
        ("CreationDate", Object::string_literal(date.clone())),
        ("ModDate", Object::string_literal(date)),
    ];
    if !metadata.keywords.is_empty() {
        entries.push(("Keywords", text_string(&metadata.keywords.join(", "))));
    }

    let existing = doc
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|info| info.as_reference().ok())
        .filter(|id| doc.get_dictionary(*id).is_ok());
    let info_id = match existing {
        Some(id) => id,
        None => {
            let id = doc.add_object(Dictionary::new());
            doc.trailer.set("Info", Object::Reference(id));
            id
        }
    };

    let info = doc
        .get_object_mut(info_id)
        .and_then(|object| object.as_dict_mut())
        .map_err(|err| DocscanError::PdfError(format!("unusable /Info dictionary: {err}")))?;
    for (key, value) in entries {
        info.set(key, value);
    }

    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|err| DocscanError::PdfError(format!("failed to write PDF metadata: {err}")))?;
    Ok(output)
}

/// `D:YYYYMMDDHHmmSS+00'00'`.
fn pdf_date(when: DateTime<Utc>) -> String {
    format!("D:{}+00'00'", when.format("%Y%m%d%H%M%S"))
}

/// PDF text string: a literal for ASCII, UTF-16BE with a byte-order mark
/// otherwise.
fn text_string(value: &str) -> Object {
    if value.is_ascii() {
        return Object::string_literal(value);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in value.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

// -- Text helpers -------------------------------------------------------------

/// Invisible text lines stacked down from the top of the image. Lines that
/// would fall below the image's bottom edge are dropped.
fn invisible_text_ops(text: &str, placement: &Placement) -> Vec<Op> {
    text.lines()
        .take(TEXT_LAYER_MAX_LINES)
        .enumerate()
        .filter_map(|(i, line)| {
            let line_y = placement.y + placement.height - (i as f32 + 1.0) * TEXT_LAYER_LEADING_PT;
            (line_y > placement.y).then(|| {
                text_line_ops(
                    line.trim(),
                    placement.x,
                    line_y,
                    TEXT_LAYER_FONT_PT,
                    Some(TextRenderingMode::Invisible),
                )
            })
        })
        .flatten()
        .collect()
}

fn text_line_ops(
    line: &str,
    x_pt: f32,
    y_pt: f32,
    size_pt: f32,
    mode: Option<TextRenderingMode>,
) -> Vec<Op> {
    let mut ops = vec![Op::StartTextSection];
    if let Some(mode) = mode {
        ops.push(Op::SetTextRenderingMode { mode });
    }
    ops.extend([
        Op::SetTextCursor {
            pos: Point {
                x: Pt(x_pt),
                y: Pt(y_pt),
            },
        },
        Op::SetFontSizeBuiltinFont {
            size: Pt(size_pt),
            font: BuiltinFont::Helvetica,
        },
        Op::WriteTextBuiltinFont {
            items: vec![TextItem::Text(line.to_string())],
            font: BuiltinFont::Helvetica,
        },
        Op::EndTextSection,
    ]);
    ops
}

/// Wrap text so no line exceeds `max_width` characters. Existing newlines
/// are kept; words longer than a line are broken.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    let mut result = Vec::new();

    for paragraph in text.split('\n') {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        if words.is_empty() {
            result.push(String::new());
            continue;
        }

        let mut current = String::new();
        let mut current_len = 0usize;
        for word in words {
            let chars: Vec<char> = word.chars().collect();
            if chars.len() > max_width {
                if !current.is_empty() {
                    result.push(std::mem::take(&mut current));
                }
                let mut chunks = chars.chunks(max_width).peekable();
                while let Some(chunk) = chunks.next() {
                    if chunks.peek().is_some() {
                        result.push(chunk.iter().collect());
                    } else {
                        current = chunk.iter().collect();
                        current_len = chunk.len();
                    }
                }
            } else if current.is_empty() {
                current.push_str(word);
                current_len = chars.len();
            } else if current_len + 1 + chars.len() <= max_width {
                current.push(' ');
                current.push_str(word);
                current_len += 1 + chars.len();
            } else {
                result.push(std::mem::replace(&mut current, word.to_string()));
                current_len = chars.len();
            }
        }

        if !current.is_empty() {
            result.push(current);
        }
    }

    result
}
