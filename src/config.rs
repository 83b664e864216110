//! Configuration types for notebook-to-PDF conversion and the HTTP service.
//!
//! Conversion behaviour is controlled through [`ConversionConfig`], built via
//! its [`ConversionConfigBuilder`]. The service side has its own
//! [`ServerConfig`] with the same builder shape. Every knob lives in one
//! struct so a config can be cloned into a blocking task or logged as a whole.

use crate::error::ConvertError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Configuration for a notebook-to-PDF conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use ipynb2pdf::{ConversionConfig, PageSize};
///
/// let config = ConversionConfig::builder()
///     .page_size(PageSize::Letter)
///     .font_size(10.0)
///     .exclude_input(true)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Paper size of the produced PDF. Default: A4.
    pub page_size: PageSize,

    /// Margin on every side, in millimetres. Range: 5–50. Default: 15.
    pub margin_mm: f32,

    /// Body text size in points. Range: 6–24. Default: 10.5.
    ///
    /// Headings scale from this value; code uses [`Self::code_font_size`].
    pub font_size: f32,

    /// Monospace size for code and outputs, in points. Default: 9.
    ///
    /// Slightly smaller than body text so an 80-column line fits the
    /// content width of an A4 page at 15 mm margins.
    pub code_font_size: f32,

    /// Longest edge, in pixels, of an embedded output image. Default: 1600.
    ///
    /// Plots saved at high DPI can be several thousand pixels wide. Larger
    /// images are downscaled before they are written to the PDF.
    pub max_image_pixels: u32,

    /// Options for the HTML stage.
    pub html: HtmlOptions,

    /// Which HTML → PDF implementation runs. Default: [`PdfEngine::Builtin`].
    pub engine: PdfEngine,

    /// Timeout for the external engine, in seconds. Default: 120.
    pub engine_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional per-stage progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            page_size: PageSize::default(),
            margin_mm: 15.0,
            font_size: 10.5,
            code_font_size: 9.0,
            max_image_pixels: 1600,
            html: HtmlOptions::default(),
            engine: PdfEngine::default(),
            engine_timeout_secs: 120,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("page_size", &self.page_size)
            .field("margin_mm", &self.margin_mm)
            .field("font_size", &self.font_size)
            .field("code_font_size", &self.code_font_size)
            .field("max_image_pixels", &self.max_image_pixels)
            .field("html", &self.html)
            .field("engine", &self.engine)
            .field("engine_timeout_secs", &self.engine_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn page_size(mut self, size: PageSize) -> Self {
        self.config.page_size = size;
        self
    }

    pub fn margin_mm(mut self, mm: f32) -> Self {
        self.config.margin_mm = mm;
        self
    }

    pub fn font_size(mut self, pt: f32) -> Self {
        self.config.font_size = pt;
        self
    }

    pub fn code_font_size(mut self, pt: f32) -> Self {
        self.config.code_font_size = pt;
        self
    }

    pub fn max_image_pixels(mut self, px: u32) -> Self {
        self.config.max_image_pixels = px.max(16);
        self
    }

    pub fn html_options(mut self, options: HtmlOptions) -> Self {
        self.config.html = options;
        self
    }

    pub fn exclude_input(mut self, v: bool) -> Self {
        self.config.html.exclude_input = v;
        self
    }

    pub fn exclude_output(mut self, v: bool) -> Self {
        self.config.html.exclude_output = v;
        self
    }

    pub fn exclude_prompts(mut self, v: bool) -> Self {
        self.config.html.exclude_prompts = v;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.html.title = Some(title.into());
        self
    }

    pub fn engine(mut self, engine: PdfEngine) -> Self {
        self.config.engine = engine;
        self
    }

    pub fn engine_timeout_secs(mut self, secs: u64) -> Self {
        self.config.engine_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, ConvertError> {
        let c = &self.config;
        if !(5.0..=50.0).contains(&c.margin_mm) {
            return Err(ConvertError::InvalidConfig(format!(
                "Margin must be 5–50 mm, got {}",
                c.margin_mm
            )));
        }
        if !(6.0..=24.0).contains(&c.font_size) {
            return Err(ConvertError::InvalidConfig(format!(
                "Font size must be 6–24 pt, got {}",
                c.font_size
            )));
        }
        if !(5.0..=24.0).contains(&c.code_font_size) {
            return Err(ConvertError::InvalidConfig(format!(
                "Code font size must be 5–24 pt, got {}",
                c.code_font_size
            )));
        }
        if c.engine_timeout_secs == 0 {
            return Err(ConvertError::InvalidConfig(
                "Engine timeout must be ≥ 1 second".into(),
            ));
        }
        if let PdfEngine::Command(ref cmd) = c.engine {
            cmd.validate()?;
        }
        Ok(self.config)
    }
}

// ── HTML options ─────────────────────────────────────────────────────────

/// What the HTML stage includes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtmlOptions {
    /// Drop code cell sources, keeping their outputs.
    pub exclude_input: bool,
    /// Drop every cell output.
    pub exclude_output: bool,
    /// Drop the `In [n]:` / `Out[n]:` prompts.
    pub exclude_prompts: bool,
    /// Document title. If None, uses notebook `metadata.title`, else the file stem.
    pub title: Option<String>,
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Paper size of the produced PDF.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum PageSize {
    /// 210 × 297 mm (default).
    #[default]
    A4,
    /// 8.5 × 11 in.
    Letter,
    /// 8.5 × 14 in.
    Legal,
    /// Width and height in millimetres.
    Custom { width_mm: f32, height_mm: f32 },
}

impl PageSize {
    /// `(width, height)` in millimetres.
    pub fn dimensions_mm(&self) -> (f32, f32) {
        match *self {
            PageSize::A4 => (210.0, 297.0),
            PageSize::Letter => (215.9, 279.4),
            PageSize::Legal => (215.9, 355.6),
            PageSize::Custom {
                width_mm,
                height_mm,
            } => (width_mm, height_mm),
        }
    }
}

/// HTML → PDF implementation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PdfEngine {
    /// In-process layout with `printpdf` (default). Needs nothing installed.
    #[default]
    Builtin,
    /// External program such as `weasyprint` or `wkhtmltopdf`.
    Command(EngineCommand),
}

/// An external HTML → PDF command line.
///
/// `{input}` and `{output}` in `args` are replaced by the HTML and PDF paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl EngineCommand {
    /// `weasyprint {input} {output}`
    pub fn weasyprint() -> Self {
        Self {
            program: "weasyprint".into(),
            args: vec!["{input}".into(), "{output}".into()],
        }
    }

    /// `wkhtmltopdf --quiet --enable-local-file-access {input} {output}`
    pub fn wkhtmltopdf() -> Self {
        Self {
            program: "wkhtmltopdf".into(),
            args: vec![
                "--quiet".into(),
                "--enable-local-file-access".into(),
                "{input}".into(),
                "{output}".into(),
            ],
        }
    }

    /// Parse a whitespace-separated command line, e.g. `"weasyprint {input} {output}"`.
    ///
    /// Arguments containing spaces are not supported; use [`EngineCommand`]
    /// directly for those.
    pub fn parse(line: &str) -> Result<Self, ConvertError> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| ConvertError::InvalidConfig("Engine command is empty".into()))?;
        let cmd = Self {
            program,
            args: parts.collect(),
        };
        cmd.validate()?;
        Ok(cmd)
    }

    fn validate(&self) -> Result<(), ConvertError> {
        if self.program.trim().is_empty() {
            return Err(ConvertError::InvalidConfig("Engine program is empty".into()));
        }
        let has = |p: &str| self.args.iter().any(|a| a.contains(p));
        if !has("{input}") || !has("{output}") {
            return Err(ConvertError::InvalidConfig(format!(
                "Engine command '{}' must reference both {{input}} and {{output}}",
                self.program
            )));
        }
        Ok(())
    }

    /// Arguments with placeholders substituted.
    pub fn render_args(&self, input: &str, output: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.replace("{input}", input).replace("{output}", output))
            .collect()
    }
}

// ── Server configuration ─────────────────────────────────────────────────

/// Configuration for the HTTP service.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address to listen on. Default: 127.0.0.1:8000.
    pub bind_addr: SocketAddr,
    /// Directory holding `notebooks/` and `pdfs/`. Default: `./media`.
    pub media_root: PathBuf,
    /// URL prefix under which media files are served. Default: `/media`.
    pub media_url: String,
    /// Upload size limit in MiB. Default: 20.
    pub max_upload_mb: u64,
    /// Where records are persisted. If None, records live in memory only.
    pub state_file: Option<PathBuf>,
    /// Pipeline configuration for every upload.
    pub conversion: ConversionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            media_root: PathBuf::from("media"),
            media_url: "/media".into(),
            max_upload_mb: 20,
            state_file: None,
            conversion: ConversionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new builder for `ServerConfig`.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder {
            config: Self::default(),
        }
    }

    /// Upload limit in bytes.
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb * 1024 * 1024
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.config.bind_addr = addr;
        self
    }

    pub fn media_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.media_root = root.into();
        self
    }

    pub fn media_url(mut self, prefix: impl Into<String>) -> Self {
        self.config.media_url = prefix.into();
        self
    }

    pub fn max_upload_mb(mut self, mb: u64) -> Self {
        self.config.max_upload_mb = mb;
        self
    }

    pub fn state_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.state_file = Some(path.into());
        self
    }

    pub fn conversion(mut self, config: ConversionConfig) -> Self {
        self.config.conversion = config;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServerConfig, ConvertError> {
        let c = &self.config;
        if c.max_upload_mb == 0 {
            return Err(ConvertError::InvalidConfig(
                "Upload limit must be ≥ 1 MB".into(),
            ));
        }
        if !c.media_url.starts_with('/') || c.media_url.trim_end_matches('/').is_empty() {
            return Err(ConvertError::InvalidConfig(format!(
                "Media URL must be an absolute path like /media, got '{}'",
                c.media_url
            )));
        }
        let mut config = self.config;
        config.media_url = config.media_url.trim_end_matches('/').to_string();
        Ok(config)
    }
}
