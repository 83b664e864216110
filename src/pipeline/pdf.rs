//! HTML → PDF.
//!
//! Two engines sit behind [`PdfEngine`]:
//!
//! * **Builtin**: reads the HTML into [`Block`]s and lays them out with
//!   `printpdf` using the standard Helvetica and Courier faces. No external
//!   tools, no font files. CPU-bound, so it runs inside `spawn_blocking`.
//! * **Command**: hands the HTML to an external program such as WeasyPrint
//!   and waits for it under a timeout.
//!
//! Either way the HTML is written to `notebook.html` in a fresh temporary
//! directory and the engine produces `notebook.pdf` beside it. The directory
//! is removed when the render finishes, success or not.

use crate::config::{ConversionConfig, EngineCommand, PdfEngine};
use crate::error::ConvertError;
use crate::pipeline::layout::{
    read_html, text_width, to_latin1, wrap_pre, wrap_runs, Block, FontStyle, PreKind, PromptKind,
    Run, MAX_INDENT,
};
use base64::Engine as _;
use ::image::DynamicImage;
use once_cell::sync::Lazy;
use printpdf::*;
use regex::bytes::Regex as BytesRegex;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A finished PDF.
#[derive(Debug, Clone)]
pub struct RenderedPdf {
    pub bytes: Vec<u8>,
    pub pages: usize,
}

/// Render a complete HTML document to PDF with the configured engine.
pub async fn render_pdf(
    html: &str,
    title: &str,
    config: &ConversionConfig,
) -> Result<RenderedPdf, ConvertError> {
    let dir = tempfile::tempdir()
        .map_err(|e| ConvertError::Internal(format!("Failed to create temp dir: {e}")))?;
    let html_path = dir.path().join("notebook.html");
    let pdf_path = dir.path().join("notebook.pdf");

    tokio::fs::write(&html_path, html)
        .await
        .map_err(|e| ConvertError::Internal(format!("Failed to write HTML temp file: {e}")))?;

    let pages = match &config.engine {
        PdfEngine::Builtin => {
            let layout = PageLayout::from_config(config);
            let (src, dst, title) = (html_path.clone(), pdf_path.clone(), title.to_string());
            tokio::task::spawn_blocking(move || render_builtin_file(&src, &dst, &title, &layout))
                .await
                .map_err(|e| ConvertError::Internal(format!("PDF task panicked: {e}")))??
        }
        PdfEngine::Command(cmd) => {
            run_engine(cmd, &html_path, &pdf_path, config.engine_timeout_secs).await?;
            None
        }
    };

    let bytes = tokio::fs::read(&pdf_path)
        .await
        .map_err(|e| ConvertError::PdfRenderFailed {
            detail: format!("engine produced no output file: {e}"),
        })?;
    if !bytes.starts_with(b"%PDF") {
        return Err(ConvertError::PdfRenderFailed {
            detail: "engine output is not a PDF document".into(),
        });
    }

    let pages = pages.unwrap_or_else(|| count_pages(&bytes));
    info!("Rendered PDF: {} page(s), {} bytes", pages, bytes.len());
    Ok(RenderedPdf { bytes, pages })
}

static RE_PAGE_OBJ: Lazy<BytesRegex> =
    Lazy::new(|| BytesRegex::new(r"(?-u)/Type\s*/Page\b").unwrap());

/// Rough page count for PDFs made by external engines.
///
/// Counts `/Type /Page` dictionaries; PDFs that hide pages inside
/// compressed object streams report zero.
pub fn count_pages(pdf: &[u8]) -> usize {
    RE_PAGE_OBJ.find_iter(pdf).count()
}

// ── Command engine ───────────────────────────────────────────────────────

async fn run_engine(
    cmd: &EngineCommand,
    input: &Path,
    output: &Path,
    timeout_secs: u64,
) -> Result<(), ConvertError> {
    let args = cmd.render_args(&input.to_string_lossy(), &output.to_string_lossy());
    debug!("Running PDF engine: {} {:?}", cmd.program, args);

    let child = tokio::process::Command::new(&cmd.program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ConvertError::EngineNotFound {
            program: cmd.program.clone(),
            source,
        })?;

    let out = tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait_with_output())
        .await
        .map_err(|_| ConvertError::EngineTimeout {
            program: cmd.program.clone(),
            secs: timeout_secs,
        })?
        .map_err(|e| ConvertError::Internal(format!("Waiting for '{}': {e}", cmd.program)))?;

    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        let stderr: String = stderr.trim().chars().take(2000).collect();
        warn!("PDF engine '{}' exited with {}", cmd.program, out.status);
        return Err(ConvertError::EngineFailed {
            program: cmd.program.clone(),
            status: out.status.to_string(),
            stderr,
        });
    }
    Ok(())
}

// ── Builtin engine ───────────────────────────────────────────────────────

/// Page geometry and type sizes, all in points.
#[derive(Debug, Clone)]
pub struct PageLayout {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
    pub font_size: f32,
    pub code_size: f32,
    pub max_image_pixels: u32,
}

impl PageLayout {
    pub fn from_config(config: &ConversionConfig) -> Self {
        let (w, h) = config.page_size.dimensions_mm();
        Self {
            width: Mm(w).into_pt().0,
            height: Mm(h).into_pt().0,
            margin: Mm(config.margin_mm).into_pt().0,
            font_size: config.font_size,
            code_size: config.code_font_size,
            max_image_pixels: config.max_image_pixels,
        }
    }

    fn content_width(&self) -> f32 {
        self.width - 2.0 * self.margin
    }
}

fn render_builtin_file(
    html_path: &Path,
    pdf_path: &Path,
    title: &str,
    layout: &PageLayout,
) -> Result<Option<usize>, ConvertError> {
    let html = std::fs::read_to_string(html_path)
        .map_err(|e| ConvertError::Internal(format!("Failed to read HTML temp file: {e}")))?;
    let (bytes, pages) = render_builtin(&html, title, layout);
    std::fs::write(pdf_path, bytes).map_err(|source| ConvertError::OutputWriteFailed {
        path: pdf_path.to_path_buf(),
        source,
    })?;
    Ok(Some(pages))
}

/// Lay out an HTML document with the built-in faces. Returns the PDF bytes
/// and the page count.
pub fn render_builtin(html: &str, title: &str, layout: &PageLayout) -> (Vec<u8>, usize) {
    let blocks = read_html(html);
    debug!("Laying out {} blocks", blocks.len());

    let mut doc = PdfDocument::new(&to_latin1(title));
    let mut canvas = Canvas::new(layout);
    for block in &blocks {
        canvas.block(&mut doc, block);
    }
    let pages = canvas.finish();
    let count = pages.len();
    doc.pages = pages;

    let mut warnings = Vec::new();
    let bytes = doc.save(&PdfSaveOptions::default(), &mut warnings);
    if !warnings.is_empty() {
        debug!("printpdf reported {} warning(s)", warnings.len());
    }
    (bytes, count)
}

const BLACK: (f32, f32, f32) = (0.0, 0.0, 0.0);
const GREY_BG: (f32, f32, f32) = (0.969, 0.969, 0.969);
const STDERR_BG: (f32, f32, f32) = (1.0, 0.867, 0.867);
const ERROR_FG: (f32, f32, f32) = (0.718, 0.110, 0.110);
const IN_PROMPT: (f32, f32, f32) = (0.188, 0.247, 0.624);
const OUT_PROMPT: (f32, f32, f32) = (0.847, 0.263, 0.082);
const RULE: (f32, f32, f32) = (0.8, 0.8, 0.8);
const QUOTE_FG: (f32, f32, f32) = (0.333, 0.333, 0.333);

const INDENT_STEP: f32 = 14.0;
const MIN_TEXT_WIDTH: f32 = 120.0;

fn color((r, g, b): (f32, f32, f32)) -> Color {
    Color::Rgb(Rgb {
        r,
        g,
        b,
        icc_profile: None,
    })
}

fn builtin(style: FontStyle) -> BuiltinFont {
    match style {
        FontStyle::Regular => BuiltinFont::Helvetica,
        FontStyle::Bold => BuiltinFont::HelveticaBold,
        FontStyle::Italic => BuiltinFont::HelveticaOblique,
        FontStyle::BoldItalic => BuiltinFont::HelveticaBoldOblique,
        FontStyle::Mono => BuiltinFont::Courier,
    }
}

/// Cursor-driven page writer. `y` is the top of the next line, measured
/// from the bottom of the page as PDF does.
struct Canvas<'a> {
    layout: &'a PageLayout,
    pages: Vec<PdfPage>,
    ops: Vec<Op>,
    y: f32,
    dirty: bool,
}

impl<'a> Canvas<'a> {
    fn new(layout: &'a PageLayout) -> Self {
        Self {
            layout,
            pages: Vec::new(),
            ops: Vec::new(),
            y: layout.height - layout.margin,
            dirty: false,
        }
    }

    fn bottom(&self) -> f32 {
        self.layout.margin
    }

    fn new_page(&mut self) {
        let page = make_page(self.layout, std::mem::take(&mut self.ops));
        self.pages.push(page);
        self.y = self.layout.height - self.layout.margin;
        self.dirty = false;
    }

    /// Make room for `h` points, breaking the page if needed.
    fn ensure(&mut self, h: f32) {
        if self.dirty && self.y - h < self.bottom() {
            self.new_page();
        }
    }

    fn gap(&mut self, h: f32) {
        // No leading space at the top of a page.
        if self.dirty {
            self.y -= h;
        }
    }

    fn finish(mut self) -> Vec<PdfPage> {
        if self.dirty || self.pages.is_empty() {
            self.new_page();
        }
        self.pages
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, rgb: (f32, f32, f32)) {
        let pt = |x: f32, y: f32| LinePoint {
            p: Point { x: Pt(x), y: Pt(y) },
            bezier: false,
        };
        self.ops.push(Op::SetFillColor { col: color(rgb) });
        self.ops.push(Op::DrawPolygon {
            polygon: Polygon {
                rings: vec![PolygonRing {
                    points: vec![pt(x, y), pt(x + w, y), pt(x + w, y + h), pt(x, y + h)],
                }],
                mode: PaintMode::Fill,
                winding_order: WindingOrder::NonZero,
            },
        });
        self.dirty = true;
    }

    /// Write one line of runs with its baseline at `baseline`.
    fn text_line(&mut self, x: f32, baseline: f32, runs: &[Run], size: f32, rgb: (f32, f32, f32)) {
        if runs.iter().all(|r| r.text.is_empty()) {
            self.dirty = true;
            return;
        }
        self.ops.push(Op::SetFillColor { col: color(rgb) });
        self.ops.push(Op::StartTextSection);
        self.ops.push(Op::SetTextMatrix {
            matrix: TextMatrix::Translate(Pt(x), Pt(baseline)),
        });
        for run in runs {
            self.ops.push(Op::SetFontSizeBuiltinFont {
                size: Pt(size),
                font: builtin(run.style),
            });
            self.ops.push(Op::WriteTextBuiltinFont {
                items: vec![TextItem::Text(run.text.clone())],
                font: builtin(run.style),
            });
        }
        self.ops.push(Op::EndTextSection);
        self.dirty = true;
    }

    /// Wrapped flowing text starting at `x`.
    /// Left edge for an indented block, leaving room for a few words.
    fn indent_x(&self, indent: u8) -> f32 {
        let l = self.layout;
        let x = l.margin + f32::from(indent.min(MAX_INDENT)) * INDENT_STEP;
        x.min(l.margin + l.content_width() - MIN_TEXT_WIDTH).max(l.margin)
    }

    fn flow(&mut self, x: f32, runs: &[Run], size: f32, rgb: (f32, f32, f32)) {
        let runs: Vec<Run> = runs
            .iter()
            .map(|r| Run::new(to_latin1(&r.text), r.style))
            .collect();
        let max = self.layout.margin + self.layout.content_width() - x;
        let line_h = size * 1.35;
        for line in wrap_runs(&runs, max, size) {
            self.ensure(line_h);
            self.text_line(x, self.y - size, &line, size, rgb);
            self.y -= line_h;
        }
    }

    fn block(&mut self, doc: &mut PdfDocument, block: &Block) {
        let l = self.layout;
        let body = l.font_size;
        match block {
            Block::Heading { level, runs } => {
                let scale = match level {
                    1 => 1.8,
                    2 => 1.5,
                    3 => 1.25,
                    4 => 1.1,
                    _ => 1.0,
                };
                let size = body * scale;
                self.gap(size * 0.6);
                // Keep a heading with at least one following line.
                self.ensure(size * 1.35 + body * 1.4);
                self.flow(l.margin, runs, size, BLACK);
                self.gap(size * 0.25);
            }
            Block::Paragraph { runs, indent } => {
                let x = self.indent_x(*indent);
                let rgb = if *indent > 0 { QUOTE_FG } else { BLACK };
                self.flow(x, runs, body, rgb);
                self.gap(body * 0.45);
            }
            Block::ListItem {
                marker,
                runs,
                indent,
            } => {
                let x = self.indent_x(*indent);
                self.ensure(body * 1.35);
                let marker = [Run::new(marker.clone(), FontStyle::Regular)];
                self.text_line(x, self.y - body, &marker, body, BLACK);
                self.flow(x + 16.0, runs, body, BLACK);
                self.gap(body * 0.2);
            }
            Block::Preformatted { kind, text } => self.preformatted(*kind, text),
            Block::Prompt { kind, text } => {
                let size = l.code_size * 0.95;
                let rgb = match kind {
                    PromptKind::In => IN_PROMPT,
                    PromptKind::Out => OUT_PROMPT,
                };
                self.gap(2.0);
                self.ensure(size * 1.3);
                let runs = [Run::new(to_latin1(text), FontStyle::Mono)];
                self.text_line(l.margin, self.y - size, &runs, size, rgb);
                self.y -= size * 1.3;
            }
            Block::Image { src, alt } => self.image(doc, src, alt),
            Block::TableRow { cells, header } => self.table_row(cells, *header),
            Block::Rule => {
                self.gap(4.0);
                self.ensure(1.0);
                self.fill_rect(l.margin, self.y, l.content_width(), 0.6, RULE);
                self.y -= 6.0;
            }
            Block::CellBreak => self.gap(body * 0.6),
        }
    }

    fn preformatted(&mut self, kind: PreKind, text: &str) {
        let l = self.layout;
        let size = l.code_size;
        let pad = 4.0;
        let line_h = size * 1.25;
        let (bg, fg) = match kind {
            PreKind::Source | PreKind::Code => (Some(GREY_BG), BLACK),
            PreKind::Stderr => (Some(STDERR_BG), BLACK),
            PreKind::Error => (None, ERROR_FG),
            PreKind::Output => (None, BLACK),
        };
        let cols = ((l.content_width() - 2.0 * pad) / (0.6 * size)).floor().max(1.0) as usize;
        let lines = wrap_pre(&to_latin1(text), cols);
        let last = lines.len().saturating_sub(1);

        self.gap(2.0);
        for (i, line) in lines.iter().enumerate() {
            // First and last lines carry the padding.
            let top = if i == 0 { pad } else { 0.0 };
            let bottom = if i == last { pad } else { 0.0 };
            let h = top + line_h + bottom;
            self.ensure(h);
            if let Some(bg) = bg {
                self.fill_rect(l.margin, self.y - h, l.content_width(), h, bg);
            }
            let runs = [Run::new(line.clone(), FontStyle::Mono)];
            self.text_line(l.margin + pad, self.y - top - size, &runs, size, fg);
            self.y -= h;
        }
        self.gap(4.0);
    }

    fn table_row(&mut self, cells: &[String], header: bool) {
        let l = self.layout;
        let size = l.font_size * 0.9;
        let line_h = size * 1.5;
        let col_w = l.content_width() / cells.len().max(1) as f32;
        let style = if header {
            FontStyle::Bold
        } else {
            FontStyle::Regular
        };

        self.ensure(line_h);
        let baseline = self.y - size * 1.1;
        for (i, cell) in cells.iter().enumerate() {
            let text = truncate_to_width(&to_latin1(cell), style, size, col_w - 6.0);
            let runs = [Run::new(text, style)];
            self.text_line(l.margin + i as f32 * col_w, baseline, &runs, size, BLACK);
        }
        self.y -= line_h;
        if header {
            self.fill_rect(l.margin, self.y + 1.0, l.content_width(), 0.6, RULE);
        }
    }

    fn image(&mut self, doc: &mut PdfDocument, src: &str, alt: &str) {
        let l = self.layout;
        let decoded = match decode_data_uri(src) {
            Some(bytes) => ::image::load_from_memory(&bytes).map_err(|e| e.to_string()),
            None => Err("not an embedded raster image".to_string()),
        };
        let img = match decoded {
            Ok(img) => img,
            Err(e) => {
                debug!("Skipping image ({e}); using placeholder");
                let label = if alt.is_empty() { "image" } else { alt };
                let runs = [Run::new(format!("[{label}]"), FontStyle::Italic)];
                self.flow(l.margin, &runs, l.font_size, QUOTE_FG);
                return;
            }
        };

        let img = downscale(img, l.max_image_pixels);
        let rgb = img.to_rgb8();
        let (px_w, px_h) = rgb.dimensions();
        if px_w == 0 || px_h == 0 {
            return;
        }

        // Treat image pixels as CSS pixels (96 dpi), then fit the frame.
        let mut w = px_w as f32 * 0.75;
        let mut h = px_h as f32 * 0.75;
        let max_h = l.height - 2.0 * l.margin;
        let fit = (l.content_width() / w).min(max_h / h).min(1.0);
        w *= fit;
        h *= fit;

        let raw = RawImage {
            pixels: RawImageData::U8(rgb.into_raw()),
            width: px_w as usize,
            height: px_h as usize,
            data_format: RawImageFormat::RGB8,
            tag: Vec::new(),
        };
        let id = doc.add_image(&raw);

        self.gap(2.0);
        self.ensure(h);
        self.ops.push(Op::UseXobject {
            id,
            transform: XObjectTransform {
                translate_x: Some(Pt(l.margin)),
                translate_y: Some(Pt(self.y - h)),
                scale_x: Some(w / px_w as f32),
                scale_y: Some(h / px_h as f32),
                dpi: Some(72.0),
                ..Default::default()
            },
        });
        self.dirty = true;
        self.y -= h + 4.0;
    }
}

fn make_page(layout: &PageLayout, ops: Vec<Op>) -> PdfPage {
    let rect = Rect {
        x: Pt(0.0),
        y: Pt(0.0),
        width: Pt(layout.width),
        height: Pt(layout.height),
    };
    PdfPage {
        media_box: rect.clone(),
        trim_box: rect.clone(),
        crop_box: rect,
        ops,
    }
}

fn truncate_to_width(text: &str, style: FontStyle, size: f32, max: f32) -> String {
    if text_width(text, style, size) <= max {
        return text.to_string();
    }
    let mut out = String::new();
    for c in text.chars() {
        out.push(c);
        if text_width(&out, style, size) + text_width("...", style, size) > max {
            out.pop();
            break;
        }
    }
    out.push_str("...");
    out
}

/// Decode a base64 `data:` URI for PNG or JPEG content.
pub fn decode_data_uri(src: &str) -> Option<Vec<u8>> {
    let rest = src.strip_prefix("data:")?;
    let (meta, data) = rest.split_once(',')?;
    let mime = meta.strip_suffix(";base64")?;
    if !matches!(mime, "image/png" | "image/jpeg" | "image/jpg") {
        return None;
    }
    base64::engine::general_purpose::STANDARD
        .decode(data.trim())
        .ok()
}

/// Shrink so the longest edge is at most `max_pixels`.
fn downscale(img: DynamicImage, max_pixels: u32) -> DynamicImage {
    let longest = img.width().max(img.height());
    if longest <= max_pixels {
        img
    } else {
        img.resize(max_pixels, max_pixels, ::image::imageops::FilterType::Triangle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageSize;
    use ::image::{ImageBuffer, Rgb as Pixel};
    use std::io::Cursor;

    fn layout() -> PageLayout {
        PageLayout::from_config(&ConversionConfig::default())
    }

    fn png_data_uri(w: u32, h: u32) -> String {
        let img = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(w, h, Pixel([200u8, 30, 30])));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ::image::ImageFormat::Png).unwrap();
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(buf.into_inner())
        )
    }

    #[test]
    fn a4_geometry() {
        let l = layout();
        assert!((l.width - 595.28).abs() < 0.5);
        assert!((l.height - 841.89).abs() < 0.5);
        let letter = PageLayout::from_config(
            &ConversionConfig::builder()
                .page_size(PageSize::Letter)
                .build()
                .unwrap(),
        );
        assert!((letter.width - 612.0).abs() < 0.5);
    }

    #[test]
    fn builtin_produces_pdf() {
        let html = "<h1>Report</h1><p>Hello <b>world</b></p><pre class=\"source\">print(1)</pre>";
        let (bytes, pages) = render_builtin(html, "Report", &layout());
        assert!(bytes.starts_with(b"%PDF"));
        assert_eq!(pages, 1);
    }

    #[test]
    fn empty_document_still_has_a_page() {
        let (bytes, pages) = render_builtin("", "empty", &layout());
        assert!(bytes.starts_with(b"%PDF"));
        assert_eq!(pages, 1);
    }

    #[test]
    fn long_output_breaks_pages() {
        let text: Vec<String> = (0..400).map(|i| format!("line {i}")).collect();
        let html = format!("<pre>{}</pre>", text.join("\n"));
        let (_, pages) = render_builtin(&html, "long", &layout());
        assert!(pages >= 4, "got {pages} pages");
    }

    #[test]
    fn embeds_png_images() {
        let html = format!("<p>plot</p><img src=\"{}\">", png_data_uri(40, 20));
        let (bytes, pages) = render_builtin(&html, "img", &layout());
        assert!(bytes.starts_with(b"%PDF"));
        assert_eq!(pages, 1);
    }

    #[test]
    fn data_uri_decoding() {
        assert!(decode_data_uri(&png_data_uri(2, 2)).is_some());
        assert!(decode_data_uri("data:image/svg+xml;base64,PHN2Zz4=").is_none());
        assert!(decode_data_uri("https://example.com/a.png").is_none());
    }

    #[test]
    fn downscale_caps_longest_edge() {
        let img = DynamicImage::ImageRgb8(ImageBuffer::new(400, 100));
        let small = downscale(img, 200);
        assert_eq!(small.width(), 200);
        assert_eq!(small.height(), 50);
    }

    #[test]
    fn truncation_adds_ellipsis() {
        let t = truncate_to_width("abcdefghijklmnop", FontStyle::Mono, 10.0, 60.0);
        assert!(t.ends_with("..."));
        assert!(text_width(&t, FontStyle::Mono, 10.0) <= 60.0);
        assert_eq!(truncate_to_width("ab", FontStyle::Mono, 10.0, 60.0), "ab");
    }

    #[test]
    fn counts_page_objects() {
        let pdf = b"%PDF-1.4 << /Type /Pages /Kids [] >> << /Type /Page >> << /Type/Page >>";
        assert_eq!(count_pages(pdf), 2);
    }

    #[tokio::test]
    async fn builtin_engine_end_to_end() {
        let out = render_pdf("<p>hi</p>", "t", &ConversionConfig::default())
            .await
            .unwrap();
        assert!(out.bytes.starts_with(b"%PDF"));
        assert_eq!(out.pages, 1);
    }

    #[tokio::test]
    async fn missing_engine_program() {
        let config = ConversionConfig::builder()
            .engine(PdfEngine::Command(
                EngineCommand::parse("definitely-not-a-real-pdf-engine {input} {output}").unwrap(),
            ))
            .build()
            .unwrap();
        let err = render_pdf("<p>hi</p>", "t", &config).await.unwrap_err();
        assert!(matches!(err, ConvertError::EngineNotFound { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_engine_reports_status() {
        let config = ConversionConfig::builder()
            .engine(PdfEngine::Command(EngineCommand {
                program: "sh".into(),
                args: vec!["-c".into(), "echo boom >&2; exit 3".into(), "{input}".into(), "{output}".into()],
            }))
            .build()
            .unwrap();
        let err = render_pdf("<p>hi</p>", "t", &config).await.unwrap_err();
        match err {
            ConvertError::EngineFailed { stderr, .. } => assert_eq!(stderr, "boom"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn engine_output_must_be_pdf() {
        // `cp` copies the HTML to the output path: it exits 0 but is no PDF.
        let config = ConversionConfig::builder()
            .engine(PdfEngine::Command(
                EngineCommand::parse("cp {input} {output}").unwrap(),
            ))
            .build()
            .unwrap();
        let err = render_pdf("<p>hi</p>", "t", &config).await.unwrap_err();
        assert!(matches!(err, ConvertError::PdfRenderFailed { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn engine_timeout() {
        let config = ConversionConfig::builder()
            .engine(PdfEngine::Command(EngineCommand {
                program: "sh".into(),
                args: vec!["-c".into(), "sleep 5".into(), "{input}".into(), "{output}".into()],
            }))
            .engine_timeout_secs(1)
            .build()
            .unwrap();
        let err = render_pdf("<p>hi</p>", "t", &config).await.unwrap_err();
        assert!(matches!(err, ConvertError::EngineTimeout { secs: 1, .. }));
    }
}
