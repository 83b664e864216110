//! HTML → page blocks, and line wrapping for the built-in PDF engine.
//!
//! ## What the reader understands
//!
//! The reader walks the HTML token by token and produces a flat list of
//! [`Block`]s. It knows the markup [`crate::pipeline::html`] emits (cell
//! containers, prompts, `pre.source`, output classes) plus the common tags
//! found in `text/html` outputs such as pandas tables. Unknown tags are
//! ignored and their text kept, so arbitrary HTML degrades to readable text
//! rather than an error. `<head>`, `<style>` and `<script>` content is skipped.
//!
//! ## Why approximate metrics?
//!
//! The built-in PDF faces (Helvetica, Courier) are not embedded, so there is
//! no font file to measure. The standard Helvetica advance widths for ASCII
//! are tabulated below; everything else gets an average width. Courier is
//! fixed-pitch at 600/1000 em. That is precise enough for greedy wrapping
//! with a small safety margin.

use once_cell::sync::Lazy;
use regex::Regex;

/// Inline font style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Regular,
    Bold,
    Italic,
    BoldItalic,
    Mono,
}

/// A styled piece of text.
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub text: String,
    pub style: FontStyle,
}

impl Run {
    pub fn new(text: impl Into<String>, style: FontStyle) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }
}

/// Flavour of preformatted text, which picks its background and colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreKind {
    /// Code cell source.
    Source,
    /// Plain output (stdout, results).
    Output,
    /// stderr stream.
    Stderr,
    /// Exception traceback.
    Error,
    /// Fenced code inside a markdown cell.
    Code,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    In,
    Out,
}

/// One layout unit.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading { level: u8, runs: Vec<Run> },
    Paragraph { runs: Vec<Run>, indent: u8 },
    ListItem { marker: String, runs: Vec<Run>, indent: u8 },
    Preformatted { kind: PreKind, text: String },
    Prompt { kind: PromptKind, text: String },
    Image { src: String, alt: String },
    TableRow { cells: Vec<String>, header: bool },
    Rule,
    /// Gap between notebook cells.
    CellBreak,
}

// ── HTML reader ──────────────────────────────────────────────────────────

static RE_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<!--.*?-->|<!(?:[^>]*)>|<(/?)([a-zA-Z][a-zA-Z0-9]*)((?:[^>]|\n)*?)(/?)>").unwrap()
});

static RE_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([a-zA-Z_:][-a-zA-Z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#).unwrap()
});

static RE_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[xX][0-9a-fA-F]{1,6}|#[0-9]{1,7}|[a-zA-Z]{2,8});").unwrap());

static RE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Deepest indent a block reports; deeper quotes and lists stay at this level.
pub const MAX_INDENT: u8 = 8;

const SKIPPED: &[&str] = &["head", "style", "script", "title"];
const VOID: &[&str] = &["img", "br", "hr", "meta", "link", "input", "col", "source", "wbr"];

#[derive(Debug)]
struct Element {
    tag: String,
    class: String,
}

#[derive(Debug)]
struct ListCtx {
    ordered: bool,
    counter: u32,
}

#[derive(Default)]
struct Reader {
    blocks: Vec<Block>,
    stack: Vec<Element>,
    skip: usize,
    runs: Vec<Run>,
    heading: Option<u8>,
    item_marker: Option<String>,
    lists: Vec<ListCtx>,
    quote: usize,
    bold: u32,
    italic: u32,
    mono: u32,
    pre: Option<(PreKind, String)>,
    prompt: Option<(PromptKind, String)>,
    row: Option<(Vec<String>, bool)>,
    cell: Option<String>,
}

/// Read an HTML document into layout blocks.
pub fn read_html(html: &str) -> Vec<Block> {
    let mut r = Reader::default();
    let mut last = 0;
    for caps in RE_TOKEN.captures_iter(html) {
        let Some(whole) = caps.get(0) else { continue };
        r.text(&html[last..whole.start()]);
        last = whole.end();

        let Some(tag) = caps.get(2) else {
            continue; // comment or doctype
        };
        let tag = tag.as_str().to_ascii_lowercase();
        let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
        let attrs = caps.get(3).map(|m| m.as_str()).unwrap_or("");
        let self_closing = caps.get(4).is_some_and(|m| !m.as_str().is_empty());

        if closing {
            r.close(&tag);
        } else {
            r.open(&tag, attrs, self_closing);
        }
    }
    r.text(&html[last..]);
    r.flush();
    r.blocks
}

fn attr(attrs: &str, name: &str) -> Option<String> {
    RE_ATTR.captures_iter(attrs).find_map(|c| {
        if c[1].eq_ignore_ascii_case(name) {
            c.get(2)
                .or_else(|| c.get(3))
                .or_else(|| c.get(4))
                .map(|m| decode_entities(m.as_str()))
        } else {
            None
        }
    })
}

/// Decode named and numeric character references.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    RE_ENTITY
        .replace_all(s, |c: &regex::Captures| {
            let body = &c[1];
            let decoded = if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = body.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match body {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some('\u{a0}'),
                    "copy" => Some('©'),
                    "reg" => Some('®'),
                    "deg" => Some('°'),
                    "times" => Some('×'),
                    "hellip" => Some('…'),
                    "mdash" => Some('—'),
                    "ndash" => Some('–'),
                    _ => None,
                }
            };
            decoded.map_or_else(|| c[0].to_string(), |ch| ch.to_string())
        })
        .into_owned()
}

impl Reader {
    fn in_class(&self, needle: &str) -> bool {
        self.stack
            .iter()
            .any(|e| e.class.split_whitespace().any(|c| c == needle))
    }

    fn style(&self) -> FontStyle {
        if self.mono > 0 {
            FontStyle::Mono
        } else {
            match (self.bold > 0 || self.heading.is_some(), self.italic > 0) {
                (true, true) => FontStyle::BoldItalic,
                (true, false) => FontStyle::Bold,
                (false, true) => FontStyle::Italic,
                (false, false) => FontStyle::Regular,
            }
        }
    }

    fn indent(&self) -> u8 {
        self.quote.saturating_add(self.lists.len()).min(MAX_INDENT as usize) as u8
    }

    fn open(&mut self, tag: &str, attrs: &str, self_closing: bool) {
        if SKIPPED.contains(&tag) {
            if !self_closing {
                self.skip += 1;
            }
            return;
        }
        if self.skip > 0 {
            return;
        }

        let class = attr(attrs, "class").unwrap_or_default();
        match tag {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                self.flush();
                self.heading = tag[1..].parse().ok();
            }
            "p" | "blockquote" | "table" | "thead" | "tbody" | "section" | "article" => {
                self.flush();
                if tag == "blockquote" {
                    self.quote = self.quote.saturating_add(1);
                }
            }
            "div" => {
                self.flush();
                let classes: Vec<&str> = class.split_whitespace().collect();
                if classes.contains(&"cell") && !self.blocks.is_empty() {
                    self.blocks.push(Block::CellBreak);
                }
                if classes.contains(&"input_prompt") {
                    self.prompt = Some((PromptKind::In, String::new()));
                } else if classes.contains(&"output_prompt") {
                    self.prompt = Some((PromptKind::Out, String::new()));
                }
            }
            "ul" | "ol" => {
                self.flush();
                self.lists.push(ListCtx {
                    ordered: tag == "ol",
                    counter: 0,
                });
            }
            "li" => {
                self.flush();
                let marker = match self.lists.last_mut() {
                    Some(ctx) if ctx.ordered => {
                        ctx.counter += 1;
                        format!("{}.", ctx.counter)
                    }
                    _ => "-".to_string(),
                };
                self.item_marker = Some(marker);
            }
            "pre" => {
                self.flush();
                let own = class.split_whitespace().any(|c| c == "source");
                let kind = if own {
                    PreKind::Source
                } else if self.in_class("output_error") {
                    PreKind::Error
                } else if self.in_class("output_stderr") {
                    PreKind::Stderr
                } else if self.in_class("text_cell_render") || self.in_class("rendered_html") {
                    PreKind::Code
                } else {
                    PreKind::Output
                };
                self.pre = Some((kind, String::new()));
            }
            "tr" => {
                self.flush();
                self.row = Some((Vec::new(), false));
            }
            "td" | "th" => {
                if tag == "th" {
                    if let Some((_, header)) = self.row.as_mut() {
                        *header = true;
                    }
                }
                self.cell = Some(String::new());
            }
            "b" | "strong" => self.bold += 1,
            "i" | "em" => self.italic += 1,
            "code" | "tt" | "kbd" | "samp" => {
                if self.pre.is_none() {
                    self.mono += 1;
                }
            }
            "br" => {
                if let Some((_, text)) = self.pre.as_mut() {
                    text.push('\n');
                } else if let Some(cell) = self.cell.as_mut() {
                    cell.push(' ');
                } else {
                    self.runs.push(Run::new("\n", self.style()));
                }
            }
            "hr" => {
                self.flush();
                self.blocks.push(Block::Rule);
            }
            "img" => {
                self.flush();
                self.blocks.push(Block::Image {
                    src: attr(attrs, "src").unwrap_or_default(),
                    alt: attr(attrs, "alt").unwrap_or_default(),
                });
            }
            _ => {}
        }

        if !self_closing && !VOID.contains(&tag) {
            self.stack.push(Element {
                tag: tag.to_string(),
                class,
            });
        }
    }

    fn close(&mut self, tag: &str) {
        if SKIPPED.contains(&tag) {
            self.skip = self.skip.saturating_sub(1);
            return;
        }
        if self.skip > 0 {
            return;
        }

        // Pop up to and including the matching element; tolerate bad nesting.
        let popped = match self.stack.iter().rposition(|e| e.tag == tag) {
            Some(pos) => self.stack.drain(pos..).next(),
            None => None,
        };

        match tag {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                self.flush();
                self.heading = None;
            }
            "p" | "li" | "table" | "thead" | "tbody" | "section" | "article" => {
                self.flush();
                if tag == "li" {
                    self.item_marker = None;
                }
            }
            "blockquote" => {
                self.flush();
                self.quote = self.quote.saturating_sub(1);
            }
            "div" => {
                let was_prompt = popped
                    .as_ref()
                    .is_some_and(|e| e.class.split_whitespace().any(|c| c.ends_with("_prompt")));
                if was_prompt {
                    if let Some((kind, text)) = self.prompt.take() {
                        let text = collapse(&text).trim().to_string();
                        self.blocks.push(Block::Prompt { kind, text });
                    }
                } else {
                    self.flush();
                }
            }
            "ul" | "ol" => {
                self.flush();
                self.lists.pop();
            }
            "pre" => {
                if let Some((kind, text)) = self.pre.take() {
                    let text = text.trim_end_matches('\n').to_string();
                    if !text.is_empty() {
                        self.blocks.push(Block::Preformatted { kind, text });
                    }
                }
            }
            "td" | "th" => {
                if let (Some(cell), Some((cells, _))) = (self.cell.take(), self.row.as_mut()) {
                    cells.push(collapse(&cell).trim().to_string());
                }
            }
            "tr" => {
                if let Some((cells, header)) = self.row.take() {
                    if !cells.is_empty() {
                        self.blocks.push(Block::TableRow { cells, header });
                    }
                }
            }
            "b" | "strong" => self.bold = self.bold.saturating_sub(1),
            "i" | "em" => self.italic = self.italic.saturating_sub(1),
            "code" | "tt" | "kbd" | "samp" => {
                if self.pre.is_none() {
                    self.mono = self.mono.saturating_sub(1);
                }
            }
            _ => {}
        }
    }

    fn text(&mut self, raw: &str) {
        if self.skip > 0 || raw.is_empty() {
            return;
        }
        let text = decode_entities(raw);
        if let Some((_, buf)) = self.prompt.as_mut() {
            buf.push_str(&text);
        } else if let Some((_, buf)) = self.pre.as_mut() {
            buf.push_str(&text);
        } else if let Some(cell) = self.cell.as_mut() {
            cell.push_str(&text);
        } else {
            let collapsed = collapse(&text);
            if collapsed.is_empty() {
                return;
            }
            let style = self.style();
            match self.runs.last_mut() {
                Some(last) if last.style == style && last.text != "\n" => {
                    last.text.push_str(&collapsed)
                }
                _ => self.runs.push(Run::new(collapsed, style)),
            }
        }
    }

    /// Close the pending inline content into a block.
    fn flush(&mut self) {
        let mut runs = std::mem::take(&mut self.runs);
        trim_runs(&mut runs);
        if runs.is_empty() {
            return;
        }
        let block = if let Some(level) = self.heading {
            Block::Heading { level, runs }
        } else if let Some(marker) = self.item_marker.take() {
            Block::ListItem {
                marker,
                runs,
                indent: self.indent().saturating_sub(1),
            }
        } else {
            Block::Paragraph {
                runs,
                indent: self.indent(),
            }
        };
        self.blocks.push(block);
    }
}

/// Collapse whitespace runs (including non-breaking spaces) to one space.
fn collapse(s: &str) -> String {
    RE_SPACES.replace_all(&s.replace('\u{a0}', " "), " ").into_owned()
}

fn trim_runs(runs: &mut Vec<Run>) {
    while runs
        .first()
        .is_some_and(|r| r.text.trim().is_empty())
    {
        runs.remove(0);
    }
    while runs.last().is_some_and(|r| r.text.trim().is_empty()) {
        runs.pop();
    }
    if let Some(first) = runs.first_mut() {
        first.text = first.text.trim_start().to_string();
    }
    if let Some(last) = runs.last_mut() {
        last.text = last.text.trim_end().to_string();
    }
}

// ── Metrics ──────────────────────────────────────────────────────────────

/// Helvetica advance widths for ASCII 32..=126, in 1/1000 em.
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

/// Width of one character in 1/1000 em.
pub fn char_width(c: char, style: FontStyle) -> f32 {
    if style == FontStyle::Mono {
        return 600.0;
    }
    let base = match c as u32 {
        32..=126 => HELVETICA[(c as u32 - 32) as usize] as f32,
        _ => 556.0,
    };
    match style {
        // Bold Helvetica runs a few percent wider.
        FontStyle::Bold | FontStyle::BoldItalic => base * 1.06,
        _ => base,
    }
}

/// Width of `text` at `size` points.
pub fn text_width(text: &str, style: FontStyle, size: f32) -> f32 {
    text.chars().map(|c| char_width(c, style)).sum::<f32>() * size / 1000.0
}

/// Map text onto what the built-in PDF faces can show.
///
/// Typographic punctuation is folded to ASCII; anything else outside
/// Latin-1 becomes `?`. Control characters other than newline are dropped.
pub fn to_latin1(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\n' => out.push('\n'),
            '\t' => out.push_str("    "),
            c if c.is_control() => {}
            '\u{2018}' | '\u{2019}' | '\u{201a}' | '\u{2032}' => out.push('\''),
            '\u{201c}' | '\u{201d}' | '\u{201e}' | '\u{2033}' => out.push('"'),
            '\u{2013}' | '\u{2014}' | '\u{2212}' => out.push('-'),
            '\u{2026}' => out.push_str("..."),
            '\u{2022}' | '\u{00b7}' => out.push('*'),
            '\u{2192}' => out.push_str("->"),
            '\u{2190}' => out.push_str("<-"),
            '\u{2264}' => out.push_str("<="),
            '\u{2265}' => out.push_str(">="),
            '\u{a0}' => out.push(' '),
            c if (c as u32) <= 0xFF => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

// ── Wrapping ─────────────────────────────────────────────────────────────

enum Token {
    Word(String, FontStyle),
    Space(FontStyle),
    Break,
}

fn tokenize(runs: &[Run]) -> Vec<Token> {
    let mut tokens = Vec::new();
    for run in runs {
        if run.text == "\n" {
            tokens.push(Token::Break);
            continue;
        }
        let mut word = String::new();
        for c in run.text.chars() {
            if c == '\n' || c == ' ' {
                if !word.is_empty() {
                    tokens.push(Token::Word(std::mem::take(&mut word), run.style));
                }
                tokens.push(if c == '\n' {
                    Token::Break
                } else {
                    Token::Space(run.style)
                });
            } else {
                word.push(c);
            }
        }
        if !word.is_empty() {
            tokens.push(Token::Word(word, run.style));
        }
    }
    tokens
}

fn push_text(line: &mut Vec<Run>, text: &str, style: FontStyle) {
    match line.last_mut() {
        Some(last) if last.style == style => last.text.push_str(text),
        _ => line.push(Run::new(text, style)),
    }
}

/// Greedy word wrap of styled runs to `max_width` points at `size` points.
///
/// Words wider than a whole line are split by character. Spaces at line
/// starts are dropped. A `"\n"` run or embedded newline forces a break.
pub fn wrap_runs(runs: &[Run], max_width: f32, size: f32) -> Vec<Vec<Run>> {
    let mut lines: Vec<Vec<Run>> = Vec::new();
    let mut line: Vec<Run> = Vec::new();
    let mut width = 0.0f32;
    let mut pending_space: Option<FontStyle> = None;

    for token in tokenize(runs) {
        match token {
            Token::Break => {
                lines.push(std::mem::take(&mut line));
                width = 0.0;
                pending_space = None;
            }
            Token::Space(style) => {
                if !line.is_empty() {
                    pending_space = Some(style);
                }
            }
            Token::Word(word, style) => {
                let w = text_width(&word, style, size);
                let space_w = pending_space.map_or(0.0, |s| text_width(" ", s, size));

                if !line.is_empty() && width + space_w + w > max_width {
                    lines.push(std::mem::take(&mut line));
                    width = 0.0;
                } else if let Some(s) = pending_space {
                    push_text(&mut line, " ", s);
                    width += space_w;
                }
                pending_space = None;

                if w <= max_width {
                    push_text(&mut line, &word, style);
                    width += w;
                    continue;
                }

                // Hard-split an over-long word.
                for c in word.chars() {
                    let cw = char_width(c, style) * size / 1000.0;
                    if !line.is_empty() && width + cw > max_width {
                        lines.push(std::mem::take(&mut line));
                        width = 0.0;
                    }
                    push_text(&mut line, &c.to_string(), style);
                    width += cw;
                }
            }
        }
    }
    if !line.is_empty() || lines.is_empty() {
        lines.push(line);
    }
    lines
}

/// Hard wrap preformatted text at `max_cols` characters per line.
pub fn wrap_pre(text: &str, max_cols: usize) -> Vec<String> {
    let max_cols = max_cols.max(1);
    let mut out = Vec::new();
    for line in text.split('\n') {
        let chars: Vec<char> = line.trim_end_matches('\r').chars().collect();
        if chars.is_empty() {
            out.push(String::new());
            continue;
        }
        for chunk in chars.chunks(max_cols) {
            out.push(chunk.iter().collect());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(runs: &[Run]) -> String {
        runs.iter().map(|r| r.text.as_str()).collect()
    }

    #[test]
    fn reads_headings_and_paragraphs() {
        let blocks = read_html("<h2>Title <em>x</em></h2><p>Hello <strong>big</strong>\n world</p>");
        assert_eq!(blocks.len(), 2);
        match &blocks[0] {
            Block::Heading { level, runs } => {
                assert_eq!(*level, 2);
                assert_eq!(plain(runs), "Title x");
                assert_eq!(runs[1].style, FontStyle::BoldItalic);
            }
            other => panic!("unexpected {other:?}"),
        }
        match &blocks[1] {
            Block::Paragraph { runs, indent } => {
                assert_eq!(*indent, 0);
                assert_eq!(plain(runs), "Hello big world");
                assert_eq!(runs[1], Run::new("big", FontStyle::Bold));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn deep_nesting_caps_indent() {
        let html = format!(
            "{}<p>deep</p>{}",
            "<blockquote>".repeat(300),
            "</blockquote>".repeat(300)
        );
        match read_html(&html).as_slice() {
            [Block::Paragraph { runs, indent }] => {
                assert_eq!(plain(runs), "deep");
                assert_eq!(*indent, MAX_INDENT);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn skips_head_and_style() {
        let blocks = read_html(
            "<!DOCTYPE html><html><head><title>T</title><style>p { x: y }</style></head>\
             <body><p>only</p></body></html>",
        );
        assert_eq!(blocks.len(), 1);
        assert!(matches!(&blocks[0], Block::Paragraph { runs, .. } if plain(runs) == "only"));
    }

    #[test]
    fn reads_code_cell_markup() {
        let html = "<div class=\"cell code_cell\"><div class=\"input\">\
            <div class=\"prompt input_prompt\">In&nbsp;[1]:</div>\
            <div class=\"input_area\"><pre class=\"source\">a &lt; b\n  c</pre></div></div>\
            <div class=\"output_area\"><div class=\"output_subarea output_stream output_stderr\">\
            <pre>oops</pre></div></div>\
            <div class=\"output_area\"><div class=\"output_subarea output_text output_error\">\
            <pre>Traceback</pre></div></div></div>";
        let blocks = read_html(html);
        assert_eq!(
            blocks,
            vec![
                Block::Prompt {
                    kind: PromptKind::In,
                    text: "In [1]:".into()
                },
                Block::Preformatted {
                    kind: PreKind::Source,
                    text: "a < b\n  c".into()
                },
                Block::Preformatted {
                    kind: PreKind::Stderr,
                    text: "oops".into()
                },
                Block::Preformatted {
                    kind: PreKind::Error,
                    text: "Traceback".into()
                },
            ]
        );
    }

    #[test]
    fn cell_breaks_between_cells() {
        let blocks = read_html("<div class=\"cell\"><p>a</p></div><div class=\"cell\"><p>b</p></div>");
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[1], Block::CellBreak);
    }

    #[test]
    fn lists_number_items() {
        let blocks = read_html("<ol><li>one</li><li>two</li></ol><ul><li>dot</li></ul>");
        let markers: Vec<String> = blocks
            .iter()
            .filter_map(|b| match b {
                Block::ListItem { marker, .. } => Some(marker.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(markers, vec!["1.", "2.", "-"]);
    }

    #[test]
    fn tables_become_rows() {
        let blocks = read_html(
            "<table><thead><tr><th>a</th><th>b</th></tr></thead>\
             <tbody><tr><td>1</td><td> 2 </td></tr></tbody></table>",
        );
        assert_eq!(
            blocks,
            vec![
                Block::TableRow {
                    cells: vec!["a".into(), "b".into()],
                    header: true
                },
                Block::TableRow {
                    cells: vec!["1".into(), "2".into()],
                    header: false
                },
            ]
        );
    }

    #[test]
    fn images_and_rules() {
        let blocks = read_html("<p>x</p><hr><img src=\"data:image/png;base64,AAA\" alt=\"plot\"/>");
        assert_eq!(blocks[1], Block::Rule);
        assert_eq!(
            blocks[2],
            Block::Image {
                src: "data:image/png;base64,AAA".into(),
                alt: "plot".into()
            }
        );
    }

    #[test]
    fn entities() {
        assert_eq!(decode_entities("a &amp; b &#39;c&#x27; &bogus;"), "a & b 'c' &bogus;");
    }

    #[test]
    fn latin1_folding() {
        assert_eq!(to_latin1("“quote” – café → 漢"), "\"quote\" - café -> ?");
    }

    #[test]
    fn wrap_respects_width() {
        let runs = vec![Run::new("aaa bbb ccc", FontStyle::Mono)];
        // Mono at 10pt: 6pt per char. 7 chars = 42pt.
        let lines = wrap_runs(&runs, 45.0, 10.0);
        let texts: Vec<String> = lines.iter().map(|l| plain(l)).collect();
        assert_eq!(texts, vec!["aaa bbb", "ccc"]);
    }

    #[test]
    fn wrap_splits_long_words_and_breaks() {
        let runs = vec![
            Run::new("abcdefghij", FontStyle::Mono),
            Run::new("\n", FontStyle::Mono),
            Run::new("k", FontStyle::Mono),
        ];
        let lines = wrap_runs(&runs, 24.0, 10.0);
        let texts: Vec<String> = lines.iter().map(|l| plain(l)).collect();
        assert_eq!(texts, vec!["abcd", "efgh", "ij", "k"]);
    }

    #[test]
    fn wrap_keeps_styles_separate() {
        let runs = vec![
            Run::new("plain ", FontStyle::Regular),
            Run::new("bold", FontStyle::Bold),
        ];
        let lines = wrap_runs(&runs, 1000.0, 10.0);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].len(), 2);
        assert_eq!(lines[0][0].text, "plain ");
    }

    #[test]
    fn pre_wrap() {
        assert_eq!(wrap_pre("abcdef\n\nxy", 4), vec!["abcd", "ef", "", "xy"]);
    }

    #[test]
    fn helvetica_table_lookups() {
        assert_eq!(char_width(' ', FontStyle::Regular), 278.0);
        assert_eq!(char_width('~', FontStyle::Regular), 584.0);
        assert_eq!(char_width('W', FontStyle::Regular), 944.0);
        assert_eq!(char_width('W', FontStyle::Mono), 600.0);
    }
}
