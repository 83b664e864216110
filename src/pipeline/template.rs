//! Stylesheet and page chrome for the HTML stage.
//!
//! Kept apart from [`crate::pipeline::html`] so the look can change without
//! touching cell rendering. The class names follow the classic notebook
//! markup (`input_prompt`, `output_stderr`, `rendered_html`, …) because the
//! layout reader and external engines both key off them.

/// Embedded stylesheet, tuned for print.
pub const CLASSIC_CSS: &str = r#"
body { font-family: "Helvetica Neue", Helvetica, Arial, sans-serif; font-size: 10.5pt; line-height: 1.4; color: #000; }
#notebook { max-width: 100%; }
.cell { margin: 0 0 8pt 0; page-break-inside: auto; }
.prompt { font-family: Menlo, Consolas, "DejaVu Sans Mono", monospace; font-size: 8.5pt; margin: 0 0 2pt 0; }
.input_prompt { color: #303f9f; }
.output_prompt { color: #d84315; }
.input_area { background: #f7f7f7; border: 1px solid #cfcfcf; border-radius: 2px; padding: 4pt 6pt; }
pre { font-family: Menlo, Consolas, "DejaVu Sans Mono", monospace; font-size: 9pt; margin: 0; white-space: pre-wrap; word-wrap: break-word; }
.output_area { margin: 4pt 0 0 0; }
.output_stderr { background: #fdd; }
.output_error pre { color: #b71c1c; }
.output_png img, .output_jpeg img, .output_svg img, .text_cell_render img { max-width: 100%; }
.rendered_html table, .text_cell_render table { border-collapse: collapse; margin: 4pt 0; }
.rendered_html th, .rendered_html td, .text_cell_render th, .text_cell_render td { border: 1px solid #ccc; padding: 2pt 6pt; }
.text_cell_render h1 { font-size: 18pt; }
.text_cell_render h2 { font-size: 15pt; }
.text_cell_render h3 { font-size: 13pt; }
.text_cell_render code { font-family: Menlo, Consolas, monospace; background: #eff0f1; padding: 0 2pt; }
.text_cell_render pre { background: #f7f7f7; padding: 4pt 6pt; }
blockquote { border-left: 3px solid #ddd; margin: 4pt 0; padding: 0 8pt; color: #555; }
"#;

/// Wrap rendered cells in a standalone document.
///
/// `page_size` is `(width_mm, height_mm)`; it becomes the `@page` rule so
/// external engines print on the same paper as the built-in one.
pub fn page(title: &str, page_size: (f32, f32), margin_mm: f32, body: &str) -> String {
    let (w, h) = page_size;
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n\
         <style>@page {{ size: {w}mm {h}mm; margin: {margin_mm}mm; }}{CLASSIC_CSS}</style>\n\
         </head>\n<body>\n\
         <div id=\"notebook\" class=\"container\">\n{body}</div>\n</body>\n</html>\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_wraps_body() {
        let html = page("T", (210.0, 297.0), 15.0, "<p>x</p>\n");
        assert!(html.contains("@page { size: 210mm 297mm; margin: 15mm; }"));
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>T</title>"));
        assert!(html.contains("<div id=\"notebook\" class=\"container\">\n<p>x</p>\n</div>"));
        assert!(html.trim_end().ends_with("</html>"));
    }
}
