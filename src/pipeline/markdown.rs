//! Markdown → HTML for notebook markdown cells.
//!
//! Covers the subset notebooks use in practice: ATX headings, paragraphs,
//! fenced code, flat ordered/unordered lists, block quotes, horizontal
//! rules, GFM pipe tables, and the inline forms (code spans, strong,
//! emphasis, links, images). Raw HTML in the source is escaped, never
//! passed through.
//!
//! ## Block pass, then inline pass
//!
//! Lines are grouped into blocks first. Each block's text then goes through
//! the inline rules in a fixed order: code spans are cut out before anything
//! else so `*` inside backticks stays literal, images run before links
//! because `![..](..)` contains a link, and strong runs before emphasis.

use crate::pipeline::notebook::{bundle_text, Attachments};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Render a markdown cell to an HTML fragment.
///
/// `attachments` resolves `attachment:<name>` image sources to `data:` URIs.
pub fn markdown_to_html(src: &str, attachments: &Attachments) -> String {
    let lines: Vec<&str> = src.lines().collect();
    let mut out = String::with_capacity(src.len() + 64);
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];

        if line.trim().is_empty() {
            i += 1;
            continue;
        }

        // ── Fenced code ──────────────────────────────────────────────────
        if let Some(caps) = RE_FENCE_OPEN.captures(line) {
            let fence = caps[1].to_string();
            let lang = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
            let mut body = Vec::new();
            i += 1;
            while i < lines.len() && !lines[i].trim_start().starts_with(&fence) {
                body.push(lines[i]);
                i += 1;
            }
            i += 1; // closing fence (or end of input)
            if lang.is_empty() {
                out.push_str("<pre><code>");
            } else {
                out.push_str(&format!(
                    "<pre><code class=\"language-{}\">",
                    escape_html(lang)
                ));
            }
            out.push_str(&escape_html(&body.join("\n")));
            out.push_str("</code></pre>\n");
            continue;
        }

        // ── Heading ──────────────────────────────────────────────────────
        if let Some(caps) = RE_HEADING.captures(line) {
            let level = caps[1].len();
            out.push_str(&format!(
                "<h{level}>{}</h{level}>\n",
                render_inline(caps[2].trim(), attachments)
            ));
            i += 1;
            continue;
        }

        // ── Horizontal rule ──────────────────────────────────────────────
        if RE_RULE.is_match(line) {
            out.push_str("<hr>\n");
            i += 1;
            continue;
        }

        // ── Block quote ──────────────────────────────────────────────────
        if line.trim_start().starts_with('>') {
            let mut inner = Vec::new();
            while i < lines.len() && lines[i].trim_start().starts_with('>') {
                let rest = &lines[i].trim_start()[1..];
                inner.push(rest.strip_prefix(' ').unwrap_or(rest));
                i += 1;
            }
            out.push_str("<blockquote>\n");
            out.push_str(&markdown_to_html(&inner.join("\n"), attachments));
            out.push_str("</blockquote>\n");
            continue;
        }

        // ── Table ────────────────────────────────────────────────────────
        if i + 1 < lines.len() && line.contains('|') && RE_TABLE_SEP.is_match(lines[i + 1]) {
            out.push_str("<table>\n<thead>\n");
            out.push_str(&table_row(line, "th", attachments));
            out.push_str("</thead>\n<tbody>\n");
            i += 2;
            while i < lines.len() && lines[i].contains('|') && !lines[i].trim().is_empty() {
                out.push_str(&table_row(lines[i], "td", attachments));
                i += 1;
            }
            out.push_str("</tbody>\n</table>\n");
            continue;
        }

        // ── Lists ────────────────────────────────────────────────────────
        if let Some(kind) = list_kind(line) {
            let tag = match kind {
                ListKind::Ordered => "ol",
                ListKind::Unordered => "ul",
            };
            out.push_str(&format!("<{tag}>\n"));
            while i < lines.len() && list_kind(lines[i]) == Some(kind) {
                let mut item = list_item_text(lines[i]).to_string();
                i += 1;
                // Lazy continuation: indented, non-blank, not a new item.
                while i < lines.len()
                    && !lines[i].trim().is_empty()
                    && list_kind(lines[i]).is_none()
                    && lines[i].starts_with([' ', '\t'])
                {
                    item.push(' ');
                    item.push_str(lines[i].trim());
                    i += 1;
                }
                out.push_str(&format!("<li>{}</li>\n", render_inline(&item, attachments)));
            }
            out.push_str(&format!("</{tag}>\n"));
            continue;
        }

        // ── Paragraph ────────────────────────────────────────────────────
        let mut para = Vec::new();
        while i < lines.len() && !lines[i].trim().is_empty() && !starts_block(lines[i]) {
            para.push(lines[i].trim());
            i += 1;
        }
        if para.is_empty() {
            // A line that looks like a block opener but matched nothing above.
            para.push(line.trim());
            i += 1;
        }
        out.push_str(&format!(
            "<p>{}</p>\n",
            render_inline(&para.join("\n"), attachments)
        ));
    }

    out
}

/// Escape text for an HTML body or attribute.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 16);
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

// ── Block helpers ────────────────────────────────────────────────────────

static RE_FENCE_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s{0,3}(`{3,}|~{3,})\s*([\w+#.-]*)").unwrap());

static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s{0,3}(#{1,6})\s+(.*?)\s*#*\s*$").unwrap());

static RE_RULE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s{0,3}(?:(?:-[ \t]*){3,}|(?:\*[ \t]*){3,}|(?:_[ \t]*){3,})$").unwrap()
});

static RE_TABLE_SEP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\|?\s*:?-{3,}:?\s*(\|\s*:?-{3,}:?\s*)*\|?\s*$").unwrap());

static RE_UL_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s{0,3}[-*+]\s+(.*)$").unwrap());

static RE_OL_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s{0,3}\d{1,9}[.)]\s+(.*)$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Ordered,
    Unordered,
}

fn list_kind(line: &str) -> Option<ListKind> {
    if RE_RULE.is_match(line) {
        None
    } else if RE_UL_ITEM.is_match(line) {
        Some(ListKind::Unordered)
    } else if RE_OL_ITEM.is_match(line) {
        Some(ListKind::Ordered)
    } else {
        None
    }
}

fn list_item_text(line: &str) -> &str {
    RE_UL_ITEM
        .captures(line)
        .or_else(|| RE_OL_ITEM.captures(line))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(line)
}

fn starts_block(line: &str) -> bool {
    RE_FENCE_OPEN.is_match(line)
        || RE_HEADING.is_match(line)
        || RE_RULE.is_match(line)
        || line.trim_start().starts_with('>')
        || list_kind(line).is_some()
}

fn table_row(line: &str, cell_tag: &str, attachments: &Attachments) -> String {
    let trimmed = line.trim().trim_start_matches('|').trim_end_matches('|');
    let mut row = String::from("<tr>");
    for cell in trimmed.split('|') {
        row.push_str(&format!(
            "<{cell_tag}>{}</{cell_tag}>",
            render_inline(cell.trim(), attachments)
        ));
    }
    row.push_str("</tr>\n");
    row
}

// ── Inline rules ─────────────────────────────────────────────────────────

static RE_CODE_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]+)`").unwrap());

// Applied to already-escaped text, so quotes in titles appear as &quot;.
static RE_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)\s]+)(?:\s+&quot;[^)]*&quot;)?\)").unwrap());

static RE_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)\s]+)(?:\s+&quot;[^)]*&quot;)?\)").unwrap());

static RE_STRONG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*([^*]+?)\*\*|__([^_]+?)__").unwrap());

static RE_EM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*([^*\s][^*]*?)\*|\b_([^_\s][^_]*?)_\b").unwrap());

/// Render inline markdown. Input is raw source text; output is HTML.
fn render_inline(text: &str, attachments: &Attachments) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut last = 0;
    for caps in RE_CODE_SPAN.captures_iter(text) {
        let m = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
        out.push_str(&render_spans(&text[last..m.0], attachments));
        out.push_str("<code>");
        out.push_str(&escape_html(&caps[1]));
        out.push_str("</code>");
        last = m.1;
    }
    out.push_str(&render_spans(&text[last..], attachments));
    out
}

fn render_spans(text: &str, attachments: &Attachments) -> String {
    let s = escape_html(text);
    let s = RE_IMAGE.replace_all(&s, |c: &Captures| {
        format!(
            "<img src=\"{}\" alt=\"{}\">",
            resolve_image_src(&c[2], attachments),
            &c[1]
        )
    });
    let s = RE_LINK.replace_all(&s, "<a href=\"$2\">$1</a>");
    let s = RE_STRONG.replace_all(&s, |c: &Captures| {
        let inner = c.get(1).or_else(|| c.get(2)).map(|m| m.as_str()).unwrap_or("");
        format!("<strong>{inner}</strong>")
    });
    let s = RE_EM.replace_all(&s, |c: &Captures| {
        let inner = c.get(1).or_else(|| c.get(2)).map(|m| m.as_str()).unwrap_or("");
        format!("<em>{inner}</em>")
    });
    s.into_owned()
}

/// Turn `attachment:name.png` into a `data:` URI when the cell carries it.
fn resolve_image_src(src: &str, attachments: &Attachments) -> String {
    let Some(name) = src.strip_prefix("attachment:") else {
        return src.to_string();
    };
    attachments
        .get(name)
        .and_then(|bundle| {
            bundle
                .iter()
                .find(|(mime, _)| mime.starts_with("image/") && *mime != "image/svg+xml")
        })
        .map(|(mime, payload)| {
            let b64: String = bundle_text(payload)
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            format!("data:{mime};base64,{b64}")
        })
        .unwrap_or_else(|| src.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn md(s: &str) -> String {
        markdown_to_html(s, &Attachments::new())
    }

    #[test]
    fn heading_levels() {
        assert_eq!(md("# Title"), "<h1>Title</h1>\n");
        assert_eq!(md("### Sub ###"), "<h3>Sub</h3>\n");
        assert_eq!(md("#NoSpace"), "<p>#NoSpace</p>\n");
    }

    #[test]
    fn paragraphs_split_on_blank_lines() {
        assert_eq!(md("one\ntwo\n\nthree"), "<p>one\ntwo</p>\n<p>three</p>\n");
    }

    #[test]
    fn inline_styles() {
        let html = md("a **bold** and *it* and `x*y*`");
        assert_eq!(
            html,
            "<p>a <strong>bold</strong> and <em>it</em> and <code>x*y*</code></p>\n"
        );
    }

    #[test]
    fn snake_case_is_not_emphasis() {
        assert_eq!(md("call my_var_name"), "<p>call my_var_name</p>\n");
    }

    #[test]
    fn raw_html_is_escaped() {
        assert_eq!(
            md("<script>alert(1)</script>"),
            "<p>&lt;script&gt;alert(1)&lt;/script&gt;</p>\n"
        );
    }

    #[test]
    fn fenced_code_keeps_content_verbatim() {
        let html = md("```python\nif a < b:\n    **x**\n```");
        assert_eq!(
            html,
            "<pre><code class=\"language-python\">if a &lt; b:\n    **x**</code></pre>\n"
        );
    }

    #[test]
    fn lists() {
        assert_eq!(
            md("- a\n- b\n  continued"),
            "<ul>\n<li>a</li>\n<li>b continued</li>\n</ul>\n"
        );
        assert_eq!(md("1. x\n2. y"), "<ol>\n<li>x</li>\n<li>y</li>\n</ol>\n");
    }

    #[test]
    fn rule_is_not_a_list() {
        assert_eq!(md("---"), "<hr>\n");
        assert_eq!(md("* * *"), "<hr>\n");
    }

    #[test]
    fn blockquote_recurses() {
        assert_eq!(
            md("> # Note\n> body"),
            "<blockquote>\n<h1>Note</h1>\n<p>body</p>\n</blockquote>\n"
        );
    }

    #[test]
    fn links_and_images() {
        assert_eq!(
            md("[site](https://example.com?a=1&b=2)"),
            "<p><a href=\"https://example.com?a=1&amp;b=2\">site</a></p>\n"
        );
        assert_eq!(
            md("![plot](plot.png)"),
            "<p><img src=\"plot.png\" alt=\"plot\"></p>\n"
        );
    }

    #[test]
    fn attachment_resolves_to_data_uri() {
        let mut attachments = Attachments::new();
        let mut bundle = serde_json::Map::new();
        bundle.insert("image/png".into(), serde_json::json!("iVBO\nRw0K"));
        attachments.insert("img.png".into(), bundle);
        let html = markdown_to_html("![x](attachment:img.png)", &attachments);
        assert_eq!(
            html,
            "<p><img src=\"data:image/png;base64,iVBORw0K\" alt=\"x\"></p>\n"
        );
    }

    #[test]
    fn tables() {
        let html = md("| a | b |\n|---|:---:|\n| 1 | 2 |");
        assert_eq!(
            html,
            "<table>\n<thead>\n<tr><th>a</th><th>b</th></tr>\n</thead>\n<tbody>\n\
             <tr><td>1</td><td>2</td></tr>\n</tbody>\n</table>\n"
        );
    }
}
