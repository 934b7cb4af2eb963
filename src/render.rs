//! Document renderers: PDF (lopdf, A4, Helvetica) and plain text.
//!
//! Renderers own image decoding. A scan whose bytes do not decode is drawn as a
//! one-line placeholder carrying the classification already resolved for it.

use image::RgbImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use textwrap::core::Fragment;
use textwrap::wrap_algorithms::wrap_first_fit;
use textwrap::WordSeparator;

use crate::catalog::Rgb;
use crate::imaging::thumbnail;
use crate::report::{
    Block, ImageSource, LineKind, PanelLine, RenderableDocument, ReportSection,
};

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("pdf encoding failed: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Turns a composed report into a downloadable artifact.
pub trait DocumentRenderer: Send + Sync {
    fn content_type(&self) -> &'static str;
    fn render(&self, doc: &RenderableDocument) -> Result<Vec<u8>, RenderError>;
}

// ---------------------------------------------------------------------------
// Scan figures
// ---------------------------------------------------------------------------

/// Longest side, in pixels, of images embedded in a report.
pub const THUMBNAIL_MAX_SIDE: u32 = 320;

#[derive(Debug)]
pub enum Figure {
    Thumbnail(RgbImage),
    Placeholder(String),
}

/// Decode a section's image for embedding, or fall back to its placeholder.
pub fn scan_figure(section: &ReportSection) -> Figure {
    let result = match &section.image {
        ImageSource::Bytes(bytes) => thumbnail(bytes, THUMBNAIL_MAX_SIDE).map_err(|e| e.to_string()),
        ImageSource::Invalid(reason) => Err(reason.clone()),
    };
    match result {
        Ok(img) => Figure::Thumbnail(img),
        Err(reason) => {
            tracing::warn!(scan = section.index, %reason, "error processing image");
            Figure::Placeholder(section.placeholder_text())
        }
    }
}

fn result_rows(section: &ReportSection) -> [(&'static str, String); 5] {
    [
        ("Status:", section.status.as_str().to_string()),
        ("Classification:", section.record.label.to_string()),
        ("AI Confidence:", section.confidence_text()),
        ("Risk Level:", section.record.risk_level.as_str().to_string()),
        ("Severity:", section.record.severity_tier.as_str().to_string()),
    ]
}

fn detail_lines(section: &ReportSection) -> Vec<PanelLine> {
    let record = section.record;
    let line = |kind, text: &str| PanelLine {
        kind,
        text: text.to_string(),
    };
    let mut lines = vec![
        line(LineKind::Text, &format!("Classification: {}", record.label)),
        line(LineKind::Text, &format!("Description: {}", record.narrative)),
        line(LineKind::Gap, ""),
        line(LineKind::Heading, "Clinical Characteristics:"),
    ];
    lines.extend(record.clinical_notes.iter().map(|n| line(LineKind::Bullet, *n)));
    lines.push(line(LineKind::Gap, ""));
    lines.push(line(LineKind::Heading, "Recommended Treatment Approach:"));
    lines.push(line(LineKind::Text, record.recommended_action));
    lines
}

// ---------------------------------------------------------------------------
// PDF
// ---------------------------------------------------------------------------

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
/// 0.6 inch.
const MARGIN: f32 = 43.2;
const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;
/// 1.8 inch.
const FIGURE_SIZE: f32 = 129.6;
const CELL_PAD: f32 = 4.0;

const BRAND: Rgb = Rgb(0x85, 0x4C, 0xE6);
const DARK: Rgb = Rgb(0x33, 0x33, 0x33);
const MUTED: Rgb = Rgb(0x66, 0x66, 0x66);
const BLACK: Rgb = Rgb(0, 0, 0);
const WHITE: Rgb = Rgb(0xF5, 0xF5, 0xF5);
const GRID: Rgb = Rgb(0x80, 0x80, 0x80);
const ROW_FILL: Rgb = Rgb(0xF2, 0xF2, 0xFA);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Font {
    Regular,
    Bold,
    Italic,
}

impl Font {
    const ALL: [Font; 3] = [Font::Regular, Font::Bold, Font::Italic];

    fn resource(&self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
            Font::Italic => "F3",
        }
    }

    fn base_font(&self) -> &'static str {
        match self {
            Font::Regular => "Helvetica",
            Font::Bold => "Helvetica-Bold",
            Font::Italic => "Helvetica-Oblique",
        }
    }
}

/// Approximate Helvetica advance width in ems.
fn glyph_width(c: char, font: Font) -> f32 {
    let w = match c {
        'i' | 'j' | 'l' | '.' | ',' | ';' | ':' | '\'' | '!' | '|' | 'I' => 0.278,
        ' ' | 'f' | 't' | 'r' | '(' | ')' | '[' | ']' | '-' | '/' => 0.333,
        'm' | 'w' | 'M' | 'W' | '%' | '@' => 0.833,
        '0'..='9' => 0.556,
        c if c.is_ascii_uppercase() => 0.667,
        _ => 0.556,
    };
    if font == Font::Bold {
        w * 1.06
    } else {
        w
    }
}

fn text_width(text: &str, font: Font, size: f32) -> f32 {
    text.chars().map(|c| glyph_width(c, font)).sum::<f32>() * size
}

/// Restrict to printable ASCII; the standard fonts are used without embedding.
fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\t' | '\n' | '\r' => ' ',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '?',
        })
        .collect()
}

/// A run of text measured in points, as seen by the line breaker.
#[derive(Debug)]
struct Glyphs<'a> {
    text: &'a str,
    width: f64,
    /// Width of the space after the run; zero inside a split word.
    space: f64,
}

impl Fragment for Glyphs<'_> {
    fn width(&self) -> f64 {
        self.width
    }

    fn whitespace_width(&self) -> f64 {
        self.space
    }

    fn penalty_width(&self) -> f64 {
        0.0
    }
}

/// First-fit word wrap on Helvetica advance widths.
///
/// A word wider than the line is fed to the breaker one character at a time so
/// it splits wherever the line fills up.
fn wrap(text: &str, max_width: f32, font: Font, size: f32) -> Vec<String> {
    let text = sanitize(text);
    let space = f64::from(text_width(" ", font, size));

    let mut glyphs = Vec::new();
    for word in WordSeparator::AsciiSpace.find_words(&text) {
        let word = word.word;
        if word.is_empty() {
            continue;
        }
        let width = text_width(word, font, size);
        if width <= max_width {
            glyphs.push(Glyphs {
                text: word,
                width: f64::from(width),
                space,
            });
            continue;
        }
        let last = word.len() - 1;
        for (i, c) in word.char_indices() {
            let end = i + c.len_utf8();
            glyphs.push(Glyphs {
                text: &word[i..end],
                width: f64::from(glyph_width(c, font) * size),
                space: if end > last { space } else { 0.0 },
            });
        }
    }

    let mut lines: Vec<String> = wrap_first_fit(&glyphs, &[f64::from(max_width)])
        .into_iter()
        .filter(|line| !line.is_empty())
        .map(|line| {
            let mut out = String::new();
            for (n, g) in line.iter().enumerate() {
                out.push_str(g.text);
                if g.space > 0.0 && n + 1 < line.len() {
                    out.push(' ');
                }
            }
            out
        })
        .collect();
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

fn num(v: f32) -> Object {
    v.into()
}

fn color_ops(color: Rgb, op: &str) -> Operation {
    let [r, g, b] = color.unit();
    Operation::new(op, vec![num(r), num(g), num(b)])
}

#[derive(Default)]
struct Page {
    ops: Vec<Operation>,
    images: Vec<(String, ObjectId)>,
}

/// Top-down layout cursor over a growing list of pages.
struct Canvas {
    doc: Document,
    finished: Vec<Page>,
    current: Page,
    y: f32,
    image_count: usize,
}

impl Canvas {
    fn new() -> Self {
        Self {
            doc: Document::with_version("1.5"),
            finished: Vec::new(),
            current: Page::default(),
            y: PAGE_HEIGHT - MARGIN,
            image_count: 0,
        }
    }

    fn new_page(&mut self) {
        self.finished.push(std::mem::take(&mut self.current));
        self.y = PAGE_HEIGHT - MARGIN;
    }

    fn at_page_top(&self) -> bool {
        self.y >= PAGE_HEIGHT - MARGIN
    }

    /// Break the page unless `height` still fits above the bottom margin.
    fn ensure(&mut self, height: f32) {
        if self.y - height < MARGIN && !self.at_page_top() {
            self.new_page();
        }
    }

    fn space(&mut self, height: f32) {
        self.y -= height;
        if self.y < MARGIN {
            self.new_page();
        }
    }

    fn push(&mut self, op: Operation) {
        self.current.ops.push(op);
    }

    fn text_at(&mut self, x: f32, baseline: f32, text: &str, font: Font, size: f32, color: Rgb) {
        self.push(Operation::new("BT", vec![]));
        self.push(color_ops(color, "rg"));
        self.push(Operation::new(
            "Tf",
            vec![Object::Name(font.resource().as_bytes().to_vec()), num(size)],
        ));
        self.push(Operation::new("Td", vec![num(x), num(baseline)]));
        self.push(Operation::new(
            "Tj",
            vec![Object::string_literal(sanitize(text))],
        ));
        self.push(Operation::new("ET", vec![]));
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgb) {
        self.push(color_ops(color, "rg"));
        self.push(Operation::new("re", vec![num(x), num(y), num(w), num(h)]));
        self.push(Operation::new("f", vec![]));
    }

    fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgb, width: f32) {
        self.push(color_ops(color, "RG"));
        self.push(Operation::new("w", vec![num(width)]));
        self.push(Operation::new("re", vec![num(x), num(y), num(w), num(h)]));
        self.push(Operation::new("S", vec![]));
    }

    /// One wrapped paragraph flowing down the page.
    fn paragraph(&mut self, text: &str, font: Font, size: f32, color: Rgb, indent: f32) {
        let leading = size * 1.3;
        for line in wrap(text, CONTENT_WIDTH - indent, font, size) {
            self.ensure(leading);
            let baseline = self.y - size;
            self.text_at(MARGIN + indent, baseline, &line, font, size, color);
            self.y -= leading;
        }
    }

    fn centered(&mut self, text: &str, font: Font, size: f32, color: Rgb) {
        let leading = size * 1.3;
        for line in wrap(text, CONTENT_WIDTH, font, size) {
            self.ensure(leading);
            let x = MARGIN + (CONTENT_WIDTH - text_width(&line, font, size)).max(0.0) / 2.0;
            let baseline = self.y - size;
            self.text_at(x, baseline, &line, font, size, color);
            self.y -= leading;
        }
    }

    fn heading(&mut self, text: &str) {
        self.space(10.0);
        self.ensure(40.0);
        self.paragraph(text, Font::Bold, 13.0, BRAND, 0.0);
        self.space(4.0);
    }

    /// Draw one table row with its top edge at `top`; returns the row height.
    #[allow(clippy::too_many_arguments)]
    fn draw_row(
        &mut self,
        x: f32,
        top: f32,
        cells: &[String],
        widths: &[f32],
        fonts: (Font, Font),
        size: f32,
        fill: Option<Rgb>,
        text_color: Rgb,
    ) -> f32 {
        let leading = size * 1.25;
        let wrapped: Vec<Vec<String>> = cells
            .iter()
            .zip(widths)
            .enumerate()
            .map(|(i, (cell, w))| {
                let font = if i == 0 { fonts.0 } else { fonts.1 };
                wrap(cell, w - 2.0 * CELL_PAD, font, size)
            })
            .collect();
        let lines = wrapped.iter().map(Vec::len).max().unwrap_or(1).max(1);
        let height = lines as f32 * leading + 2.0 * CELL_PAD;

        let mut cx = x;
        for (i, (cell, w)) in wrapped.iter().zip(widths).enumerate() {
            if let Some(fill) = fill {
                self.fill_rect(cx, top - height, *w, height, fill);
            }
            self.stroke_rect(cx, top - height, *w, height, GRID, 0.5);
            let font = if i == 0 { fonts.0 } else { fonts.1 };
            for (n, line) in cell.iter().enumerate() {
                let baseline = top - CELL_PAD - size - n as f32 * leading;
                self.text_at(cx + CELL_PAD, baseline, line, font, size, text_color);
            }
            cx += w;
        }
        height
    }

    fn table_row(
        &mut self,
        cells: &[String],
        widths: &[f32],
        fonts: (Font, Font),
        size: f32,
        fill: Option<Rgb>,
        text_color: Rgb,
    ) {
        let leading = size * 1.25;
        let estimate = cells
            .iter()
            .zip(widths)
            .map(|(c, w)| wrap(c, w - 2.0 * CELL_PAD, fonts.1, size).len())
            .max()
            .unwrap_or(1) as f32
            * leading
            + 2.0 * CELL_PAD;
        self.ensure(estimate);
        let top = self.y;
        let height = self.draw_row(MARGIN, top, cells, widths, fonts, size, fill, text_color);
        self.y -= height;
    }

    fn key_value(&mut self, rows: &[(String, String)]) {
        let widths = [158.4, CONTENT_WIDTH - 158.4];
        self.table_row(
            &["Field".to_string(), "Details".to_string()],
            &widths,
            (Font::Bold, Font::Bold),
            9.0,
            Some(BRAND),
            WHITE,
        );
        for (k, v) in rows {
            self.table_row(
                &[k.clone(), v.clone()],
                &widths,
                (Font::Bold, Font::Regular),
                8.5,
                Some(ROW_FILL),
                BLACK,
            );
        }
    }

    fn table(&mut self, header: &[String], rows: &[Vec<String>]) {
        let widths = column_widths(header, rows, 8.0);
        self.table_row(header, &widths, (Font::Bold, Font::Bold), 8.5, Some(BRAND), WHITE);
        for row in rows {
            self.table_row(row, &widths, (Font::Regular, Font::Regular), 8.0, Some(ROW_FILL), BLACK);
        }
    }

    /// Boxed text with a coloured rule down the left edge.
    fn panel(&mut self, accent: Rgb, lines: &[PanelLine], size: f32) {
        let leading = size * 1.3;
        let indent = 10.0;
        for line in lines {
            let (font, prefix, extra) = match line.kind {
                LineKind::Gap => {
                    self.space(leading * 0.5);
                    continue;
                }
                LineKind::Heading => (Font::Bold, "", 0.0),
                LineKind::Text => (Font::Regular, "", 0.0),
                LineKind::Bullet => (Font::Regular, "- ", 8.0),
            };
            let text = format!("{prefix}{}", line.text);
            for wrapped in wrap(&text, CONTENT_WIDTH - indent - extra - 4.0, font, size) {
                self.ensure(leading);
                self.fill_rect(MARGIN, self.y - leading, 2.5, leading, accent);
                let baseline = self.y - size;
                self.text_at(MARGIN + indent + extra, baseline, &wrapped, font, size, DARK);
                self.y -= leading;
            }
        }
    }

    fn add_image(&mut self, img: &RgbImage) -> String {
        self.image_count += 1;
        let name = format!("Im{}", self.image_count);
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => img.width() as i64,
                "Height" => img.height() as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8i64,
            },
            img.as_raw().clone(),
        );
        let id = self.doc.add_object(stream);
        self.current.images.push((name.clone(), id));
        name
    }

    fn draw_image(&mut self, name: &str, x: f32, y: f32, w: f32, h: f32) {
        self.push(Operation::new("q", vec![]));
        self.push(Operation::new(
            "cm",
            vec![num(w), num(0.0), num(0.0), num(h), num(x), num(y)],
        ));
        self.push(Operation::new(
            "Do",
            vec![Object::Name(name.as_bytes().to_vec())],
        ));
        self.push(Operation::new("Q", vec![]));
    }

    fn scan(&mut self, section: &ReportSection) {
        self.space(6.0);
        self.ensure(60.0);
        self.paragraph(
            &format!("MRI Scan #{} - Detailed Analysis", section.index),
            Font::Bold,
            10.5,
            DARK,
            0.0,
        );

        let img = match scan_figure(section) {
            Figure::Thumbnail(img) => img,
            Figure::Placeholder(text) => {
                self.paragraph(&text, Font::Italic, 9.0, DARK, 0.0);
                self.space(6.0);
                return;
            }
        };

        let pad = 8.0;
        let height = FIGURE_SIZE + 2.0 * pad;
        self.ensure(height);
        let top = self.y;
        let accent = section.record.accent_color;
        self.stroke_rect(MARGIN, top - height, CONTENT_WIDTH, height, accent, 1.0);

        let name = self.add_image(&img);
        let scale = (FIGURE_SIZE / img.width().max(1) as f32)
            .min(FIGURE_SIZE / img.height().max(1) as f32);
        let (w, h) = (img.width() as f32 * scale, img.height() as f32 * scale);
        self.draw_image(
            &name,
            MARGIN + pad + (FIGURE_SIZE - w) / 2.0,
            top - pad - FIGURE_SIZE + (FIGURE_SIZE - h) / 2.0,
            w,
            h,
        );

        let x = MARGIN + pad + FIGURE_SIZE + 2.0 * pad;
        let widths = [80.0, MARGIN + CONTENT_WIDTH - pad - x - 80.0];
        let mut row_top = top - pad;
        for (key, value) in result_rows(section) {
            row_top -= self.draw_row(
                x,
                row_top,
                &[key.to_string(), value],
                &widths,
                (Font::Bold, Font::Regular),
                8.0,
                Some(Rgb(0xFA, 0xFA, 0xFA)),
                BLACK,
            );
        }
        self.y = (top - height).min(row_top - pad);
        self.space(6.0);
        self.panel(accent, &detail_lines(section), 8.0);
        self.space(8.0);
    }

    fn finish(mut self, doc: &RenderableDocument) -> Result<Vec<u8>, RenderError> {
        self.finished.push(std::mem::take(&mut self.current));
        let Canvas {
            doc: mut pdf,
            finished: pages,
            ..
        } = self;

        let mut fonts = Dictionary::new();
        for font in Font::ALL {
            let id = pdf.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => font.base_font(),
                "Encoding" => "WinAnsiEncoding",
            });
            fonts.set(font.resource(), id);
        }

        let pages_id = pdf.new_object_id();
        let total = pages.len();
        let mut kids: Vec<Object> = Vec::with_capacity(total);
        for (i, page) in pages.into_iter().enumerate() {
            let mut ops = page.ops;
            let footer = format!("{} | Page {} of {}", doc.report_id, i + 1, total);
            let x = MARGIN + (CONTENT_WIDTH - text_width(&footer, Font::Regular, 7.0)) / 2.0;
            ops.extend([
                Operation::new("BT", vec![]),
                color_ops(MUTED, "rg"),
                Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), num(7.0)]),
                Operation::new("Td", vec![num(x), num(MARGIN / 2.0)]),
                Operation::new("Tj", vec![Object::string_literal(footer)]),
                Operation::new("ET", vec![]),
            ]);
            let content = Content { operations: ops };
            let content_id = pdf.add_object(Stream::new(dictionary! {}, content.encode()?));

            let mut xobjects = Dictionary::new();
            for (name, id) in page.images {
                xobjects.set(name, id);
            }
            let page_id = pdf.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "MediaBox" => vec![num(0.0), num(0.0), num(PAGE_WIDTH), num(PAGE_HEIGHT)],
                "Resources" => dictionary! {
                    "Font" => fonts.clone(),
                    "XObject" => xobjects,
                },
            });
            kids.push(page_id.into());
        }

        pdf.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => total as i64,
            }),
        );
        let catalog_id = pdf.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        let info_id = pdf.add_object(dictionary! {
            "Title" => Object::string_literal(sanitize(&doc.title)),
            "Subject" => Object::string_literal(doc.report_id.clone()),
            "Producer" => Object::string_literal(concat!("neuroscan ", env!("CARGO_PKG_VERSION"))),
        });
        pdf.trailer.set("Root", catalog_id);
        pdf.trailer.set("Info", info_id);
        pdf.compress();

        let mut out = Vec::new();
        pdf.save_to(&mut out)?;
        Ok(out)
    }
}

/// Column widths proportional to content, scaled to the printable width.
fn column_widths(header: &[String], rows: &[Vec<String>], size: f32) -> Vec<f32> {
    let natural: Vec<f32> = (0..header.len())
        .map(|col| {
            std::iter::once(&header[col])
                .chain(rows.iter().filter_map(|r| r.get(col)))
                .map(|c| text_width(c, Font::Bold, size) + 2.0 * CELL_PAD)
                .fold(40.0f32, f32::max)
        })
        .collect();
    let sum: f32 = natural.iter().sum();
    if sum <= 0.0 {
        return natural;
    }
    natural.iter().map(|w| w / sum * CONTENT_WIDTH).collect()
}

/// A4 PDF with embedded scan thumbnails.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfRenderer;

impl DocumentRenderer for PdfRenderer {
    fn content_type(&self) -> &'static str {
        "application/pdf"
    }

    fn render(&self, doc: &RenderableDocument) -> Result<Vec<u8>, RenderError> {
        let mut canvas = Canvas::new();
        canvas.centered(&doc.title, Font::Bold, 18.0, BRAND);
        canvas.centered(&doc.subtitle, Font::Regular, 9.0, MUTED);
        canvas.space(8.0);

        for block in &doc.blocks {
            match block {
                Block::Heading(text) => canvas.heading(text),
                Block::Subheading(text) => {
                    canvas.space(8.0);
                    canvas.paragraph(text, Font::Bold, 10.5, DARK, 0.0);
                    canvas.space(3.0);
                }
                Block::KeyValue(rows) => canvas.key_value(rows),
                Block::Table { header, rows } => canvas.table(header, rows),
                Block::Scan(i) => {
                    if let Some(section) = doc.sections.get(*i) {
                        canvas.scan(section);
                    }
                }
                Block::Panel { accent, lines } => {
                    canvas.space(4.0);
                    canvas.panel(*accent, lines, 7.5);
                }
                Block::Footer(lines) => {
                    canvas.space(12.0);
                    for line in lines {
                        canvas.centered(line, Font::Regular, 7.0, MUTED);
                    }
                }
            }
        }

        let bytes = canvas.finish(doc)?;
        tracing::debug!(
            report_id = %doc.report_id,
            bytes = bytes.len(),
            "pdf rendered"
        );
        Ok(bytes)
    }
}

// ---------------------------------------------------------------------------
// Plain text
// ---------------------------------------------------------------------------

/// Plain-text rendition, used by the CLI and for inspecting report content.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextRenderer;

impl TextRenderer {
    pub fn render_string(&self, doc: &RenderableDocument) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        let rule = "=".repeat(78);
        let _ = writeln!(out, "{}\n{}\n{}", doc.title, doc.subtitle, rule);
        for block in &doc.blocks {
            match block {
                Block::Heading(text) => {
                    let _ = writeln!(out, "\n## {text}\n");
                }
                Block::Subheading(text) => {
                    let _ = writeln!(out, "\n-- {text}");
                }
                Block::KeyValue(rows) => {
                    for (k, v) in rows {
                        let _ = writeln!(out, "{k:<26}{v}");
                    }
                }
                Block::Table { header, rows } => {
                    let _ = writeln!(out, "{}", header.join(" | "));
                    for row in rows {
                        let _ = writeln!(out, "{}", row.join(" | "));
                    }
                }
                Block::Scan(i) => {
                    let Some(section) = doc.sections.get(*i) else {
                        continue;
                    };
                    let _ = writeln!(out, "MRI Scan #{} - Detailed Analysis", section.index);
                    match scan_figure(section) {
                        Figure::Placeholder(text) => {
                            let _ = writeln!(out, "  {text}\n");
                            continue;
                        }
                        Figure::Thumbnail(img) => {
                            let _ = writeln!(out, "  Image: {}x{}", img.width(), img.height());
                        }
                    }
                    for (k, v) in result_rows(section) {
                        let _ = writeln!(out, "  {k:<16}{v}");
                    }
                    write_lines(&mut out, &detail_lines(section), "  ");
                    out.push('\n');
                }
                Block::Panel { lines, .. } => write_lines(&mut out, lines, ""),
                Block::Footer(lines) => {
                    let _ = writeln!(out, "\n{rule}");
                    for line in lines {
                        let _ = writeln!(out, "{line}");
                    }
                }
            }
        }
        out
    }
}

fn write_lines(out: &mut String, lines: &[PanelLine], indent: &str) {
    use std::fmt::Write;

    for line in lines {
        let _ = match line.kind {
            LineKind::Gap => writeln!(out),
            LineKind::Bullet => writeln!(out, "{indent}  * {}", line.text),
            LineKind::Heading | LineKind::Text => writeln!(out, "{indent}{}", line.text),
        };
    }
}

impl DocumentRenderer for TextRenderer {
    fn content_type(&self) -> &'static str {
        "text/plain; charset=utf-8"
    }

    fn render(&self, doc: &RenderableDocument) -> Result<Vec<u8>, RenderError> {
        Ok(self.render_string(doc).into_bytes())
    }
}
