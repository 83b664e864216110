//! Notebook → standalone HTML document.
//!
//! Produces the classic notebook look: one block per cell, `In [n]:` and
//! `Out[n]:` prompts, source in a grey input area, outputs below. The whole
//! document is self-contained (inline stylesheet, images as `data:` URIs) so
//! it can be written to a temp file and handed to any HTML → PDF engine.
//!
//! ## Output selection
//!
//! A display output usually carries several representations of the same
//! value. The first one found in [`MIME_ORDER`] wins.

use crate::config::ConversionConfig;
use crate::pipeline::markdown::{escape_html, markdown_to_html};
use crate::pipeline::notebook::{bundle_text, Cell, MimeBundle, Notebook, Output};
use crate::pipeline::template;
use base64::Engine as _;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Preferred representation order for display outputs.
pub const MIME_ORDER: &[&str] = &[
    "text/html",
    "text/markdown",
    "image/svg+xml",
    "text/latex",
    "image/png",
    "image/jpeg",
    "text/plain",
];

/// Render a notebook to a complete HTML document.
///
/// `fallback_title` is used when neither the options nor the notebook
/// metadata carry a title; callers pass the source file stem.
pub fn render_html(notebook: &Notebook, config: &ConversionConfig, fallback_title: &str) -> String {
    let options = &config.html;
    let title = options
        .title
        .clone()
        .or_else(|| notebook.metadata.title.clone())
        .unwrap_or_else(|| fallback_title.to_string());

    let mut body = String::new();
    for cell in &notebook.cells {
        match cell {
            Cell::Markdown {
                source,
                attachments,
            } => {
                body.push_str("<div class=\"cell text_cell\">\n<div class=\"text_cell_render\">\n");
                body.push_str(&markdown_to_html(source.as_str(), attachments));
                body.push_str("</div>\n</div>\n");
            }
            Cell::Code {
                source,
                execution_count,
                outputs,
            } => {
                let show_input = !options.exclude_input;
                let show_output = !options.exclude_output && !outputs.is_empty();
                if !show_input && !show_output {
                    continue;
                }
                body.push_str("<div class=\"cell code_cell\">\n");
                if show_input {
                    body.push_str("<div class=\"input\">\n");
                    if !options.exclude_prompts {
                        body.push_str(&format!(
                            "<div class=\"prompt input_prompt\">In&nbsp;[{}]:</div>\n",
                            prompt_number(*execution_count)
                        ));
                    }
                    body.push_str(&format!(
                        "<div class=\"input_area\"><pre class=\"source\">{}</pre></div>\n</div>\n",
                        escape_html(source.as_str())
                    ));
                }
                if show_output {
                    body.push_str("<div class=\"output_wrapper\">\n<div class=\"output\">\n");
                    for output in outputs {
                        body.push_str(&render_output(output, options.exclude_prompts));
                    }
                    body.push_str("</div>\n</div>\n");
                }
                body.push_str("</div>\n");
            }
            Cell::Raw { source, metadata } => {
                // Raw cells only reach HTML output when marked as HTML.
                if metadata.mimetype() == Some("text/html") {
                    body.push_str("<div class=\"cell raw_cell\">\n");
                    body.push_str(source.as_str());
                    body.push_str("\n</div>\n");
                }
            }
        }
    }

    debug!(
        "Rendered {} cells to {} bytes of HTML",
        notebook.cells.len(),
        body.len()
    );
    let (w, h) = config.page_size.dimensions_mm();
    template::page(&escape_html(&title), (w, h), config.margin_mm, &body)
}

fn prompt_number(count: Option<u64>) -> String {
    count.map_or_else(|| "&nbsp;".to_string(), |n| n.to_string())
}

fn render_output(output: &Output, exclude_prompts: bool) -> String {
    let mut html = String::from("<div class=\"output_area\">\n");
    match output {
        Output::Stream { name, text } => {
            let class = if name == "stderr" {
                "output_stderr"
            } else {
                "output_stdout"
            };
            html.push_str(&format!(
                "<div class=\"output_subarea output_stream {class} output_text\"><pre>{}</pre></div>\n",
                escape_html(&strip_ansi(text.as_str()))
            ));
        }
        Output::ExecuteResult {
            execution_count,
            data,
        } => {
            if !exclude_prompts {
                html.push_str(&format!(
                    "<div class=\"prompt output_prompt\">Out[{}]:</div>\n",
                    prompt_number(*execution_count)
                ));
            }
            html.push_str(&render_bundle(data));
        }
        Output::DisplayData { data } => {
            html.push_str(&render_bundle(data));
        }
        Output::Error {
            ename,
            evalue,
            traceback,
        } => {
            let text = if traceback.is_empty() {
                format!("{ename}: {evalue}")
            } else {
                strip_ansi(&traceback.join("\n"))
            };
            html.push_str(&format!(
                "<div class=\"output_subarea output_text output_error\"><pre>{}</pre></div>\n",
                escape_html(&text)
            ));
        }
    }
    html.push_str("</div>\n");
    html
}

fn render_bundle(data: &MimeBundle) -> String {
    let Some((mime, value)) = MIME_ORDER
        .iter()
        .find_map(|m| data.get(*m).map(|v| (*m, v)))
    else {
        return String::new();
    };
    let text = bundle_text(value);

    match mime {
        "text/html" => format!(
            "<div class=\"output_subarea output_html rendered_html\">\n{text}\n</div>\n"
        ),
        "text/markdown" => format!(
            "<div class=\"output_subarea output_markdown rendered_html\">\n{}</div>\n",
            markdown_to_html(&text, &Default::default())
        ),
        "image/svg+xml" => format!(
            "<div class=\"output_subarea output_svg\"><img src=\"data:image/svg+xml;base64,{}\" alt=\"svg output\"></div>\n",
            base64::engine::general_purpose::STANDARD.encode(text.as_bytes())
        ),
        "image/png" | "image/jpeg" => {
            let b64: String = text.chars().filter(|c| !c.is_whitespace()).collect();
            let class = if mime == "image/png" {
                "output_png"
            } else {
                "output_jpeg"
            };
            format!(
                "<div class=\"output_subarea {class}\"><img src=\"data:{mime};base64,{b64}\" alt=\"{mime} output\"></div>\n"
            )
        }
        "text/latex" => format!(
            "<div class=\"output_subarea output_latex output_text\"><pre>{}</pre></div>\n",
            escape_html(&text)
        ),
        _ => format!(
            "<div class=\"output_subarea output_text output_result\"><pre>{}</pre></div>\n",
            escape_html(&strip_ansi(&text))
        ),
    }
}

static RE_ANSI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]|\x1b\][^\x07]*\x07").unwrap());

/// Remove terminal colour and cursor escape sequences.
pub fn strip_ansi(s: &str) -> String {
    RE_ANSI.replace_all(s, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::notebook::parse_notebook;

    fn render(json: &str, config: &ConversionConfig) -> String {
        render_html(&parse_notebook(json.as_bytes()).unwrap(), config, "fallback")
    }

    const NB: &str = r##"{
        "cells": [
            {"cell_type": "markdown", "source": "# Intro"},
            {"cell_type": "code", "execution_count": 3, "source": "x = 1 < 2\nx",
             "outputs": [
                {"output_type": "execute_result", "execution_count": 3,
                 "data": {"text/plain": "True"}},
                {"output_type": "stream", "name": "stderr", "text": "warn\n"}
             ]},
            {"cell_type": "code", "execution_count": null, "source": "pass", "outputs": []},
            {"cell_type": "raw", "source": "\\begin{x}"}
        ],
        "metadata": {},
        "nbformat": 4, "nbformat_minor": 5
    }"##;

    #[test]
    fn classic_structure() {
        let html = render(NB, &ConversionConfig::default());
        assert!(html.contains("<title>fallback</title>"));
        assert!(html.contains("<h1>Intro</h1>"));
        assert!(html.contains("In&nbsp;[3]:"));
        assert!(html.contains("In&nbsp;[&nbsp;]:"));
        assert!(html.contains("<pre class=\"source\">x = 1 &lt; 2\nx</pre>"));
        assert!(html.contains("Out[3]:"));
        assert!(html.contains("<pre>True</pre>"));
        assert!(html.contains("output_stderr"));
        // Raw LaTeX cell is not HTML and is dropped.
        assert!(!html.contains("begin{x}"));
    }

    #[test]
    fn exclude_options() {
        let config = ConversionConfig::builder()
            .exclude_input(true)
            .exclude_prompts(true)
            .title("Report")
            .build()
            .unwrap();
        let html = render(NB, &config);
        assert!(html.contains("<title>Report</title>"));
        assert!(!html.contains("class=\"source\""));
        assert!(!html.contains("Out[3]:"));
        assert!(html.contains("<pre>True</pre>"));

        let config = ConversionConfig::builder()
            .exclude_output(true)
            .build()
            .unwrap();
        let html = render(NB, &config);
        assert!(!html.contains("<pre>True</pre>"));
        assert!(html.contains("class=\"source\""));
    }

    #[test]
    fn html_output_beats_plain_text() {
        let nb = r#"{"cells": [{"cell_type": "code", "source": "df", "execution_count": 1,
            "outputs": [{"output_type": "execute_result", "execution_count": 1,
              "data": {"text/plain": "a b", "text/html": "<table><tr><td>a</td></tr></table>"}}]}],
            "nbformat": 4, "nbformat_minor": 4}"#;
        let html = render(nb, &ConversionConfig::default());
        assert!(html.contains("<table><tr><td>a</td></tr></table>"));
        assert!(!html.contains("<pre>a b</pre>"));
    }

    #[test]
    fn png_output_becomes_data_uri() {
        let nb = r#"{"cells": [{"cell_type": "code", "source": "plot()", "execution_count": 2,
            "outputs": [{"output_type": "display_data",
              "data": {"image/png": "iVBOR\nw0KGgo=\n", "text/plain": "<Figure>"}}]}],
            "nbformat": 4, "nbformat_minor": 4}"#;
        let html = render(nb, &ConversionConfig::default());
        assert!(html.contains("src=\"data:image/png;base64,iVBORw0KGgo=\""));
    }

    #[test]
    fn error_traceback_is_stripped_of_ansi() {
        let nb = r#"{"cells": [{"cell_type": "code", "source": "1/0", "execution_count": 1,
            "outputs": [{"output_type": "error", "ename": "ZeroDivisionError",
              "evalue": "division by zero",
              "traceback": ["\u001b[0;31mZeroDivisionError\u001b[0m: division by zero"]}]}],
            "nbformat": 4, "nbformat_minor": 4}"#;
        let html = render(nb, &ConversionConfig::default());
        assert!(html.contains("<pre>ZeroDivisionError: division by zero</pre>"));
        assert!(!html.contains('\u{1b}'));
    }

    #[test]
    fn metadata_title_is_used_and_escaped() {
        let nb = r#"{"cells": [], "metadata": {"title": "A & B"}, "nbformat": 4, "nbformat_minor": 4}"#;
        let html = render(nb, &ConversionConfig::default());
        assert!(html.contains("<title>A &amp; B</title>"));
    }

    #[test]
    fn strip_ansi_variants() {
        assert_eq!(strip_ansi("\x1b[1;32mok\x1b[0m"), "ok");
        assert_eq!(strip_ansi("plain"), "plain");
    }
}
