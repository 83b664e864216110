//! Conversion entry points.
//!
//! Every entry point funnels into one pipeline run over the notebook bytes:
//! parse → HTML → PDF. Input resolution (path or URL) happens first for the
//! path-based functions; [`convert_from_bytes`] starts from bytes the caller
//! already holds, which is how the upload service uses it.

use crate::config::ConversionConfig;
use crate::error::ConvertError;
use crate::output::{ConversionOutput, ConversionStats};
use crate::pipeline::notebook::{parse_notebook, Notebook, NotebookSummary};
use crate::pipeline::{html, input, pdf};
use crate::progress::Stage;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Convert a notebook file or URL to PDF.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input` - Local file path or HTTP/HTTPS URL to an `.ipynb` file
/// * `config` - Conversion configuration
///
/// # Errors
/// Input problems (missing file, not a notebook, download failure), notebook
/// decoding problems, and PDF engine failures. There are no partial results.
pub async fn convert(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, ConvertError> {
    let input_str = input_str.as_ref();
    info!("Starting conversion: {}", input_str);

    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let bytes = read_file(resolved.path()).await?;
    convert_from_bytes(&bytes, &resolved.stem(), config).await
}

/// Convert notebook bytes held in memory.
///
/// `name` identifies the notebook in progress events and log lines and is
/// the fallback document title; a file stem such as `"analysis"` works well.
pub async fn convert_from_bytes(
    bytes: &[u8],
    name: &str,
    config: &ConversionConfig,
) -> Result<ConversionOutput, ConvertError> {
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(name);
    }

    let result = run_pipeline(bytes, name, config).await;

    if let Some(ref cb) = config.progress_callback {
        match &result {
            Ok(out) => cb.on_conversion_complete(name, out.stats.pages, out.stats.pdf_bytes),
            Err(e) => cb.on_conversion_error(name, &e.to_string()),
        }
    }
    result
}

async fn run_pipeline(
    bytes: &[u8],
    name: &str,
    config: &ConversionConfig,
) -> Result<ConversionOutput, ConvertError> {
    let total_start = Instant::now();
    let stage = |s: Stage| {
        if let Some(ref cb) = config.progress_callback {
            cb.on_stage(name, s);
        }
    };

    // ── Step 1: Parse ────────────────────────────────────────────────────
    stage(Stage::Parse);
    let parse_start = Instant::now();
    if !input::looks_like_notebook(bytes) {
        return Err(ConvertError::NotANotebook {
            path: PathBuf::from(name),
            first_byte: input::first_significant_byte(bytes),
        });
    }
    let owned = bytes.to_vec();
    let notebook = tokio::task::spawn_blocking(move || parse_notebook(&owned))
        .await
        .map_err(|e| ConvertError::Internal(format!("Parse task panicked: {e}")))??;
    let summary = notebook.summary();
    let parse_duration_ms = parse_start.elapsed().as_millis() as u64;
    debug!(
        "Parsed '{}': {} cells in {}ms",
        name,
        summary.total_cells(),
        parse_duration_ms
    );

    // ── Step 2: HTML ─────────────────────────────────────────────────────
    stage(Stage::Html);
    let html_start = Instant::now();
    let html = render_html_blocking(notebook, config, name).await?;
    let html_duration_ms = html_start.elapsed().as_millis() as u64;

    // ── Step 3: PDF ──────────────────────────────────────────────────────
    stage(Stage::Pdf);
    let pdf_start = Instant::now();
    let title = document_title(config, &summary, name);
    let rendered = pdf::render_pdf(&html, &title, config).await?;
    let pdf_duration_ms = pdf_start.elapsed().as_millis() as u64;

    let stats = ConversionStats {
        cells: summary.total_cells(),
        pages: rendered.pages,
        pdf_bytes: rendered.bytes.len(),
        parse_duration_ms,
        html_duration_ms,
        pdf_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Conversion complete: '{}' → {} page(s), {} bytes, {}ms total",
        name, stats.pages, stats.pdf_bytes, stats.total_duration_ms
    );

    Ok(ConversionOutput {
        pdf: rendered.bytes,
        html,
        summary,
        stats,
    })
}

/// Convert a notebook and write the PDF directly to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionStats, ConvertError> {
    let output = convert(input_str, config).await?;
    write_atomic(output_path.as_ref(), &output.pdf).await?;
    Ok(output.stats)
}

/// Write `bytes` to `path` through a sibling temp file and a rename.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ConvertError> {
    let fail = |e| ConvertError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    tokio::fs::write(&tmp_path, bytes).await.map_err(fail)?;

    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(fail(e));
    }
    Ok(())
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, ConvertError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ConvertError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, config))
}

/// Render a notebook to its standalone HTML document without making a PDF.
///
/// Useful for previews and for feeding an HTML → PDF tool the caller runs
/// itself.
pub async fn render_html_only(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<String, ConvertError> {
    let resolved = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    let bytes = read_file(resolved.path()).await?;
    let notebook = parse_notebook(&bytes)?;
    render_html_blocking(notebook, config, &resolved.stem()).await
}

/// Summarise a notebook's contents without converting it.
///
/// Only `config.download_timeout_secs` is consulted.
pub async fn inspect(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<NotebookSummary, ConvertError> {
    let resolved = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    let bytes = read_file(resolved.path()).await?;
    Ok(parse_notebook(&bytes)?.summary())
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn read_file(path: &Path) -> Result<Vec<u8>, ConvertError> {
    tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => ConvertError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => ConvertError::FileNotFound {
            path: path.to_path_buf(),
        },
    })
}

async fn render_html_blocking(
    notebook: Notebook,
    config: &ConversionConfig,
    name: &str,
) -> Result<String, ConvertError> {
    let config = config.clone();
    let name = name.to_string();
    tokio::task::spawn_blocking(move || html::render_html(&notebook, &config, &name))
        .await
        .map_err(|e| ConvertError::Internal(format!("HTML task panicked: {e}")))
}

/// Title precedence: explicit option, notebook metadata, then `name`.
fn document_title(config: &ConversionConfig, summary: &NotebookSummary, name: &str) -> String {
    config
        .html
        .title
        .clone()
        .or_else(|| summary.title.clone())
        .unwrap_or_else(|| name.to_string())
}
