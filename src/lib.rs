//! # ipynb2pdf
//!
//! Convert Jupyter notebooks to PDF, as a library, a CLI, or a small upload
//! service.
//!
//! ## Pipeline Overview
//!
//! ```text
//! .ipynb
//!  │
//!  ├─ 1. Input   resolve local file or download from URL
//!  ├─ 2. Parse   nbformat v4 JSON → typed cells and outputs
//!  ├─ 3. HTML    classic notebook look, self-contained (inline CSS, data: images)
//!  ├─ 4. PDF     built-in printpdf layout, or an external HTML → PDF command
//!  └─ 5. Output  PDF bytes + HTML + notebook summary + stage timings
//! ```
//!
//! ## Upload service
//!
//! [`server::app`] exposes the pipeline over HTTP. Each upload becomes a
//! [`NotebookRecord`] that moves `pending → processing → completed` (or
//! `failed`) while the request is being handled; there is no job queue.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ipynb2pdf::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!     let output = convert("analysis.ipynb", &config).await?;
//!     std::fs::write("analysis.pdf", &output.pdf)?;
//!     eprintln!("{} cells → {} pages in {}ms",
//!         output.stats.cells,
//!         output.stats.pages,
//!         output.stats.total_duration_ms);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ipynb2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! ipynb2pdf = { version = "0.1", default-features = false }
//! ```
//!
//! ## Choosing an Engine
//!
//! | Engine | Needs | Fidelity |
//! |--------|-------|----------|
//! | [`PdfEngine::Builtin`] | nothing | Text, code, tables, PNG/JPEG; Latin-1 text only |
//! | `weasyprint {input} {output}` | WeasyPrint on PATH | Full CSS, SVG, any script |
//! | `wkhtmltopdf … {input} {output}` | wkhtmltopdf on PATH | Full CSS, older WebKit |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod media;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod server;
pub mod service;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ConversionConfig, ConversionConfigBuilder, EngineCommand, HtmlOptions, PageSize, PdfEngine,
    ServerConfig, ServerConfigBuilder,
};
pub use convert::{
    convert, convert_from_bytes, convert_sync, convert_to_file, inspect, render_html_only,
};
pub use error::{ConvertError, ServiceError};
pub use media::MediaStorage;
pub use output::{ConversionOutput, ConversionStats};
pub use pipeline::notebook::NotebookSummary;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
pub use service::ConversionService;
pub use store::{ConversionStatus, NotebookRecord, RecordStore};
