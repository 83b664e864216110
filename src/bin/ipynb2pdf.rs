//! CLI binary for ipynb2pdf.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig` / `ServerConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use ipynb2pdf::pipeline::input::{file_stem, filename_from_url, is_url};
use ipynb2pdf::{
    convert_to_file, inspect, render_html_only, server, ConversionConfig,
    ConversionProgressCallback, EngineCommand, PageSize, PdfEngine, ProgressCallback,
    ServerConfig, Stage,
};
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: one bar across all inputs, three steps per notebook
/// (parse, HTML, PDF), plus a log line per finished notebook.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Stage steps already counted for the notebook in flight, so a failure
    /// can fast-forward the bar past the steps it skipped.
    steps_done: AtomicUsize,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new(inputs: usize) -> Arc<Self> {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} steps  ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        let bar = ProgressBar::new((inputs * 3) as u64);
        bar.set_style(style);
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            steps_done: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
        })
    }

    fn skip_remaining(&self) {
        let done = self.steps_done.swap(0, Ordering::SeqCst);
        self.bar.inc(3usize.saturating_sub(done) as u64);
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, name: &str) {
        self.steps_done.store(0, Ordering::SeqCst);
        self.bar.set_message(name.to_string());
    }

    fn on_stage(&self, name: &str, stage: Stage) {
        // A stage begins once the previous one is done.
        if stage != Stage::Parse {
            self.bar.inc(1);
            self.steps_done.fetch_add(1, Ordering::SeqCst);
        }
        self.bar.set_message(format!("{name}: {stage}"));
    }

    fn on_conversion_complete(&self, name: &str, pages: usize, pdf_bytes: usize) {
        self.skip_remaining();
        self.bar.println(format!(
            "  {} {:<32}  {}",
            green("✓"),
            name,
            dim(&format!("{pages} pages, {} KiB", pdf_bytes / 1024)),
        ));
    }

    fn on_conversion_error(&self, name: &str, error: &str) {
        self.skip_remaining();
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Keep the first line only; engine errors can be long.
        let first = error.lines().next().unwrap_or_default();
        let msg = if first.chars().count() > 80 {
            format!("{}\u{2026}", first.chars().take(79).collect::<String>())
        } else {
            first.to_string()
        };
        self.bar
            .println(format!("  {} {:<32}  {}", red("✗"), name, red(&msg)));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert next to the notebook (analysis.pdf)
  ipynb2pdf convert analysis.ipynb

  # Several notebooks into one directory
  ipynb2pdf convert week1.ipynb week2.ipynb -o out/

  # Report style: outputs only, Letter paper
  ipynb2pdf convert report.ipynb --exclude-input --no-prompts --page-size letter

  # Use WeasyPrint for full CSS and SVG support
  ipynb2pdf convert analysis.ipynb --engine weasyprint

  # Any HTML → PDF command with {input} and {output} placeholders
  ipynb2pdf convert analysis.ipynb --engine-command "chromium --headless --print-to-pdf={output} {input}"

  # From a URL
  ipynb2pdf convert https://raw.githubusercontent.com/user/repo/main/demo.ipynb

  # Intermediate HTML only
  ipynb2pdf convert analysis.ipynb --html

  # Notebook summary
  ipynb2pdf inspect analysis.ipynb --json

  # Upload service on port 8000
  ipynb2pdf serve --media-root ./media --state-file ./media/records.json

ENVIRONMENT VARIABLES:
  IPYNB2PDF_ENGINE           builtin | weasyprint | wkhtmltopdf
  IPYNB2PDF_ENGINE_COMMAND   custom HTML → PDF command line
  IPYNB2PDF_BIND             serve: listen address
  IPYNB2PDF_MEDIA_ROOT       serve: storage directory
  IPYNB2PDF_MAX_UPLOAD_MB    serve: upload limit
  RUST_LOG                   log filter, overrides -v / -q
"#;

/// Convert Jupyter notebooks to PDF.
#[derive(Parser, Debug)]
#[command(
    name = "ipynb2pdf",
    version,
    about = "Convert Jupyter notebooks to PDF",
    long_about = "Convert Jupyter notebooks (.ipynb, local files or URLs) to PDF through a \
classic-notebook HTML rendering, or run a small HTTP service that does the same for uploads.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "IPYNB2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "IPYNB2PDF_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert one or more notebooks.
    Convert(ConvertArgs),
    /// Print a summary of a notebook's contents.
    Inspect(InspectArgs),
    /// Run the upload/convert HTTP service.
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Local .ipynb paths or HTTP/HTTPS URLs.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Output file (single input) or directory.
    #[arg(short, long, env = "IPYNB2PDF_OUTPUT")]
    output: Option<PathBuf>,

    /// Write the intermediate HTML instead of a PDF.
    #[arg(long)]
    html: bool,

    /// Disable progress bar.
    #[arg(long, env = "IPYNB2PDF_NO_PROGRESS")]
    no_progress: bool,

    #[command(flatten)]
    render: RenderArgs,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Local .ipynb path or HTTP/HTTPS URL.
    input: String,

    /// Print JSON instead of a table.
    #[arg(long)]
    json: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "IPYNB2PDF_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "IPYNB2PDF_BIND", default_value = "127.0.0.1:8000")]
    bind: SocketAddr,

    /// Directory for uploaded notebooks and generated PDFs.
    #[arg(long, env = "IPYNB2PDF_MEDIA_ROOT", default_value = "media")]
    media_root: PathBuf,

    /// URL prefix the media directory is served under.
    #[arg(long, env = "IPYNB2PDF_MEDIA_URL", default_value = "/media")]
    media_url: String,

    /// Largest accepted upload, in MB.
    #[arg(long, env = "IPYNB2PDF_MAX_UPLOAD_MB", default_value_t = 20)]
    max_upload_mb: u64,

    /// Persist records to this JSON file.
    #[arg(long, env = "IPYNB2PDF_STATE_FILE")]
    state_file: Option<PathBuf>,

    #[command(flatten)]
    render: RenderArgs,
}

/// Rendering options shared by `convert` and `serve`.
#[derive(Args, Debug)]
struct RenderArgs {
    /// HTML → PDF engine.
    #[arg(long, env = "IPYNB2PDF_ENGINE", value_enum, default_value = "builtin")]
    engine: EngineArg,

    /// Custom engine command line with {input} and {output}; overrides --engine.
    #[arg(long, env = "IPYNB2PDF_ENGINE_COMMAND")]
    engine_command: Option<String>,

    /// Paper size.
    #[arg(long, env = "IPYNB2PDF_PAGE_SIZE", value_enum, default_value = "a4")]
    page_size: PageSizeArg,

    /// Page margin in millimetres (5–50).
    #[arg(long, env = "IPYNB2PDF_MARGIN_MM", default_value_t = 15.0)]
    margin_mm: f32,

    /// Body font size in points.
    #[arg(long, env = "IPYNB2PDF_FONT_SIZE", default_value_t = 10.5)]
    font_size: f32,

    /// Code font size in points.
    #[arg(long, env = "IPYNB2PDF_CODE_FONT_SIZE", default_value_t = 9.0)]
    code_font_size: f32,

    /// Longest image edge in pixels before downscaling (builtin engine).
    #[arg(long, env = "IPYNB2PDF_MAX_IMAGE_PIXELS", default_value_t = 1600)]
    max_image_pixels: u32,

    /// Leave code cell sources out.
    #[arg(long)]
    exclude_input: bool,

    /// Leave cell outputs out.
    #[arg(long)]
    exclude_output: bool,

    /// Leave In[n]/Out[n] prompts out.
    #[arg(long)]
    no_prompts: bool,

    /// Document title (default: notebook metadata, then file name).
    #[arg(long)]
    title: Option<String>,

    /// External engine timeout in seconds.
    #[arg(long, env = "IPYNB2PDF_ENGINE_TIMEOUT", default_value_t = 120)]
    engine_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "IPYNB2PDF_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum EngineArg {
    Builtin,
    Weasyprint,
    Wkhtmltopdf,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PageSizeArg {
    A4,
    Letter,
    Legal,
}

impl From<PageSizeArg> for PageSize {
    fn from(v: PageSizeArg) -> Self {
        match v {
            PageSizeArg::A4 => PageSize::A4,
            PageSizeArg::Letter => PageSize::Letter,
            PageSizeArg::Legal => PageSize::Legal,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs while the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = match &cli.command {
        Command::Convert(args) => !cli.quiet && !args.no_progress,
        _ => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Convert(args) => run_convert(args, cli.quiet, show_progress).await,
        Command::Inspect(args) => run_inspect(args).await,
        Command::Serve(args) => run_serve(args).await,
    }
}

async fn run_convert(args: ConvertArgs, quiet: bool, show_progress: bool) -> Result<()> {
    let progress = if show_progress && !args.html {
        Some(CliProgressCallback::new(args.inputs.len()))
    } else {
        None
    };
    let config = build_config(
        &args.render,
        progress
            .clone()
            .map(|cb| cb as Arc<dyn ConversionProgressCallback>),
    )?;

    let multi = args.inputs.len() > 1;
    let ext = if args.html { "html" } else { "pdf" };
    let mut failed = 0usize;

    for input in &args.inputs {
        let target = output_path(input, args.output.as_deref(), multi, ext);
        let result = if args.html {
            write_html(input, &target, &config).await
        } else {
            convert_to_file(input, &target, &config)
                .await
                .map(|stats| {
                    if !quiet && !show_progress {
                        eprintln!(
                            "{}  {} pages  {}ms  →  {}",
                            green("✔"),
                            stats.pages,
                            stats.total_duration_ms,
                            bold(&target.display().to_string()),
                        );
                    }
                })
                .with_context(|| format!("Conversion failed: {input}"))
        };

        if let Err(e) = result {
            failed += 1;
            // The progress callback already printed a line for this one.
            if progress.is_none() {
                eprintln!("{} {:#}", red("✘"), e);
            }
        }
    }

    if let Some(cb) = &progress {
        cb.bar.finish_and_clear();
        let errors = cb.errors.load(Ordering::SeqCst);
        if !quiet {
            let ok = args.inputs.len() - errors;
            eprintln!(
                "{} {} of {} notebooks converted",
                if errors == 0 { green("✔") } else { cyan("⚠") },
                bold(&ok.to_string()),
                args.inputs.len()
            );
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} conversions failed", args.inputs.len());
    }
    Ok(())
}

async fn write_html(input: &str, target: &Path, config: &ConversionConfig) -> Result<()> {
    let html = render_html_only(input, config)
        .await
        .with_context(|| format!("HTML rendering failed: {input}"))?;
    ipynb2pdf::convert::write_atomic(target, html.as_bytes())
        .await
        .context("Failed to write HTML")?;
    eprintln!("{}  →  {}", green("✔"), bold(&target.display().to_string()));
    Ok(())
}

/// Where the output for `input` goes.
///
/// Without `-o` a local notebook gets a sibling file and a URL lands in the
/// working directory. `-o` names a file for a single input, or a directory
/// for several inputs (or when it already is one).
fn output_path(input: &str, output: Option<&Path>, multi: bool, ext: &str) -> PathBuf {
    let stem = if is_url(input) {
        file_stem(Path::new(&filename_from_url(input)))
    } else {
        file_stem(Path::new(input))
    };
    let file_name = format!("{stem}.{ext}");

    match output {
        Some(out) if multi || out.is_dir() => out.join(file_name),
        Some(out) => out.to_path_buf(),
        None if is_url(input) => PathBuf::from(file_name),
        None => Path::new(input).with_extension(ext),
    }
}

async fn run_inspect(args: InspectArgs) -> Result<()> {
    let config = ConversionConfig::builder()
        .download_timeout_secs(args.download_timeout)
        .build()
        .context("Invalid configuration")?;
    let summary = inspect(&args.input, &config)
        .await
        .context("Failed to inspect notebook")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?
        );
        return Ok(());
    }

    println!("File:            {}", args.input);
    println!("Format:          nbformat {}", summary.nbformat);
    if let Some(ref t) = summary.title {
        println!("Title:           {}", t);
    }
    if let Some(ref k) = summary.kernel {
        println!("Kernel:          {}", k);
    }
    if let Some(ref l) = summary.language {
        println!("Language:        {}", l);
    }
    println!(
        "Cells:           {} ({} code, {} markdown, {} raw)",
        summary.total_cells(),
        summary.code_cells,
        summary.markdown_cells,
        summary.raw_cells
    );
    println!("Outputs:         {}", summary.outputs);
    println!("Images:          {}", summary.images);
    println!("Errors:          {}", summary.errors);
    Ok(())
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let conversion = build_config(&args.render, None)?;
    let mut builder = ServerConfig::builder()
        .bind_addr(args.bind)
        .media_root(&args.media_root)
        .media_url(&args.media_url)
        .max_upload_mb(args.max_upload_mb)
        .conversion(conversion);
    if let Some(ref path) = args.state_file {
        builder = builder.state_file(path);
    }
    let config = builder.build().context("Invalid server configuration")?;

    eprintln!(
        "{} Serving on {}",
        cyan("◆"),
        bold(&format!("http://{}", config.bind_addr))
    );
    server::serve(config).await.context("Server failed")
}

/// Map CLI args to `ConversionConfig`.
fn build_config(
    args: &RenderArgs,
    progress: Option<ProgressCallback>,
) -> Result<ConversionConfig> {
    let engine = match (&args.engine_command, args.engine) {
        (Some(line), _) => PdfEngine::Command(
            EngineCommand::parse(line).context("Invalid --engine-command")?,
        ),
        (None, EngineArg::Builtin) => PdfEngine::Builtin,
        (None, EngineArg::Weasyprint) => PdfEngine::Command(EngineCommand::weasyprint()),
        (None, EngineArg::Wkhtmltopdf) => PdfEngine::Command(EngineCommand::wkhtmltopdf()),
    };

    let mut builder = ConversionConfig::builder()
        .page_size(args.page_size.into())
        .margin_mm(args.margin_mm)
        .font_size(args.font_size)
        .code_font_size(args.code_font_size)
        .max_image_pixels(args.max_image_pixels)
        .exclude_input(args.exclude_input)
        .exclude_output(args.exclude_output)
        .exclude_prompts(args.no_prompts)
        .engine(engine)
        .engine_timeout_secs(args.engine_timeout)
        .download_timeout_secs(args.download_timeout);

    if let Some(ref title) = args.title {
        builder = builder.title(title.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_paths() {
        assert_eq!(
            output_path("dir/a.ipynb", None, false, "pdf"),
            PathBuf::from("dir/a.pdf")
        );
        assert_eq!(
            output_path("https://x.org/n/demo.ipynb", None, false, "pdf"),
            PathBuf::from("demo.pdf")
        );
        assert_eq!(
            output_path("a.ipynb", Some(Path::new("out.pdf")), false, "pdf"),
            PathBuf::from("out.pdf")
        );
        assert_eq!(
            output_path("x/a.ipynb", Some(Path::new("out")), true, "html"),
            PathBuf::from("out/a.html")
        );
    }

    #[test]
    fn cli_parses_convert() {
        let cli = Cli::try_parse_from([
            "ipynb2pdf",
            "convert",
            "a.ipynb",
            "b.ipynb",
            "--engine",
            "weasyprint",
            "--page-size",
            "letter",
            "-q",
        ])
        .unwrap();
        assert!(cli.quiet);
        match cli.command {
            Command::Convert(args) => {
                assert_eq!(args.inputs.len(), 2);
                let config = build_config(&args.render, None).unwrap();
                assert_eq!(config.page_size, PageSize::Letter);
                assert_eq!(config.engine, PdfEngine::Command(EngineCommand::weasyprint()));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn cli_parses_inspect_timeout() {
        let cli = Cli::try_parse_from([
            "ipynb2pdf",
            "inspect",
            "https://x.org/demo.ipynb",
            "--download-timeout",
            "5",
        ])
        .unwrap();
        match cli.command {
            Command::Inspect(args) => {
                assert_eq!(args.download_timeout, 5);
                assert!(!args.json);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn engine_command_overrides_engine() {
        let cli = Cli::try_parse_from([
            "ipynb2pdf",
            "serve",
            "--engine-command",
            "prince {input} -o {output}",
        ])
        .unwrap();
        match cli.command {
            Command::Serve(args) => {
                let config = build_config(&args.render, None).unwrap();
                match config.engine {
                    PdfEngine::Command(cmd) => assert_eq!(cmd.program, "prince"),
                    other => panic!("unexpected {other:?}"),
                }
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
