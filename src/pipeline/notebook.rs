//! Typed nbformat v4 model and parsing.
//!
//! Only the fields the renderer needs are modelled; everything else in the
//! notebook JSON is ignored. Text fields in nbformat may be stored either as
//! one string or as a list of line strings, so [`MultilineString`] accepts
//! both and joins them.

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// A parsed notebook.
#[derive(Debug, Clone, Deserialize)]
pub struct Notebook {
    #[serde(default)]
    pub cells: Vec<Cell>,
    #[serde(default)]
    pub metadata: NotebookMetadata,
    pub nbformat: u32,
    #[serde(default)]
    pub nbformat_minor: u32,
}

/// Notebook-level metadata.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotebookMetadata {
    pub title: Option<String>,
    pub kernelspec: Option<KernelSpec>,
    pub language_info: Option<LanguageInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KernelSpec {
    pub display_name: Option<String>,
    pub language: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LanguageInfo {
    pub name: Option<String>,
}

/// A single notebook cell.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "cell_type", rename_all = "lowercase")]
pub enum Cell {
    Markdown {
        #[serde(default)]
        source: MultilineString,
        #[serde(default)]
        attachments: Attachments,
    },
    Code {
        #[serde(default)]
        source: MultilineString,
        #[serde(default)]
        execution_count: Option<u64>,
        #[serde(default)]
        outputs: Vec<Output>,
    },
    Raw {
        #[serde(default)]
        source: MultilineString,
        #[serde(default)]
        metadata: RawCellMetadata,
    },
}

/// Attachments keyed by file name, each a mime bundle.
pub type Attachments = BTreeMap<String, MimeBundle>;

/// `mime type → payload`. Payloads are multiline strings, or JSON for `application/json`.
pub type MimeBundle = Map<String, Value>;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCellMetadata {
    /// nbformat 4 spelling.
    pub raw_mimetype: Option<String>,
    /// Older spelling still found in the wild.
    pub format: Option<String>,
}

impl RawCellMetadata {
    pub fn mimetype(&self) -> Option<&str> {
        self.raw_mimetype.as_deref().or(self.format.as_deref())
    }
}

/// A code cell output.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "output_type", rename_all = "snake_case")]
pub enum Output {
    Stream {
        #[serde(default = "default_stream_name")]
        name: String,
        #[serde(default)]
        text: MultilineString,
    },
    ExecuteResult {
        #[serde(default)]
        execution_count: Option<u64>,
        #[serde(default)]
        data: MimeBundle,
    },
    DisplayData {
        #[serde(default)]
        data: MimeBundle,
    },
    Error {
        #[serde(default)]
        ename: String,
        #[serde(default)]
        evalue: String,
        #[serde(default)]
        traceback: Vec<String>,
    },
}

fn default_stream_name() -> String {
    "stdout".to_string()
}

/// Text stored as either `"a\nb"` or `["a\n", "b"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "MultilineRepr")]
pub struct MultilineString(pub String);

#[derive(Deserialize)]
#[serde(untagged)]
enum MultilineRepr {
    One(String),
    Many(Vec<String>),
}

impl From<MultilineRepr> for MultilineString {
    fn from(r: MultilineRepr) -> Self {
        match r {
            MultilineRepr::One(s) => MultilineString(s),
            MultilineRepr::Many(v) => MultilineString(v.concat()),
        }
    }
}

impl MultilineString {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Join a mime-bundle payload into one string.
///
/// Strings and string arrays are joined; anything else (JSON payloads) is
/// pretty-printed.
pub fn bundle_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) if items.iter().all(Value::is_string) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .concat(),
        other => serde_json::to_string_pretty(other).unwrap_or_default(),
    }
}

/// Decode notebook bytes.
///
/// # Errors
/// - [`ConvertError::InvalidNotebook`] for bad UTF-8, bad JSON, or JSON that
///   does not match the nbformat structure
/// - [`ConvertError::UnsupportedVersion`] when `nbformat` is not 4
pub fn parse_notebook(bytes: &[u8]) -> Result<Notebook, ConvertError> {
    let text = std::str::from_utf8(bytes).map_err(|e| ConvertError::InvalidNotebook {
        detail: format!("not valid UTF-8: {e}"),
    })?;
    let text = text.trim_start_matches('\u{FEFF}');

    // Check the version before the typed decode so a v3 notebook (which has
    // `worksheets` instead of `cells`) reports the version, not a shape error.
    let raw: Value = serde_json::from_str(text).map_err(|e| ConvertError::InvalidNotebook {
        detail: e.to_string(),
    })?;
    let version = raw
        .get("nbformat")
        .and_then(Value::as_u64)
        .ok_or_else(|| ConvertError::InvalidNotebook {
            detail: "missing integer field 'nbformat'".into(),
        })?;
    if version != 4 {
        return Err(ConvertError::UnsupportedVersion { found: version });
    }

    let notebook: Notebook =
        serde_json::from_value(raw).map_err(|e| ConvertError::InvalidNotebook {
            detail: e.to_string(),
        })?;
    debug!(
        "Parsed notebook v{}.{} with {} cells",
        notebook.nbformat,
        notebook.nbformat_minor,
        notebook.cells.len()
    );
    Ok(notebook)
}

/// Quick facts about a notebook, without rendering it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotebookSummary {
    pub nbformat: String,
    pub title: Option<String>,
    pub kernel: Option<String>,
    pub language: Option<String>,
    pub code_cells: usize,
    pub markdown_cells: usize,
    pub raw_cells: usize,
    pub outputs: usize,
    pub images: usize,
    pub errors: usize,
}

impl NotebookSummary {
    pub fn total_cells(&self) -> usize {
        self.code_cells + self.markdown_cells + self.raw_cells
    }
}

impl Notebook {
    /// Count cells, outputs and embedded images.
    pub fn summary(&self) -> NotebookSummary {
        let mut s = NotebookSummary {
            nbformat: format!("{}.{}", self.nbformat, self.nbformat_minor),
            title: self.metadata.title.clone(),
            kernel: self
                .metadata
                .kernelspec
                .as_ref()
                .and_then(|k| k.display_name.clone().or_else(|| k.name.clone())),
            language: self.language().map(str::to_string),
            ..Default::default()
        };
        for cell in &self.cells {
            match cell {
                Cell::Markdown { .. } => s.markdown_cells += 1,
                Cell::Raw { .. } => s.raw_cells += 1,
                Cell::Code { outputs, .. } => {
                    s.code_cells += 1;
                    s.outputs += outputs.len();
                    for out in outputs {
                        match out {
                            Output::ExecuteResult { data, .. } | Output::DisplayData { data } => {
                                if data.keys().any(|k| k.starts_with("image/")) {
                                    s.images += 1;
                                }
                            }
                            Output::Error { .. } => s.errors += 1,
                            Output::Stream { .. } => {}
                        }
                    }
                }
            }
        }
        s
    }

    /// Kernel language, from `language_info` then `kernelspec`.
    pub fn language(&self) -> Option<&str> {
        self.metadata
            .language_info
            .as_ref()
            .and_then(|l| l.name.as_deref())
            .or_else(|| {
                self.metadata
                    .kernelspec
                    .as_ref()
                    .and_then(|k| k.language.as_deref())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"{
        "cells": [
            {"cell_type": "markdown", "metadata": {}, "source": ["# Test Notebook"]},
            {"cell_type": "code", "execution_count": 1, "metadata": {},
             "outputs": [
                {"output_type": "stream", "name": "stdout", "text": ["Hello, ", "World!\n"]},
                {"output_type": "execute_result", "execution_count": 1, "metadata": {},
                 "data": {"text/plain": ["42"], "image/png": "iVBORw0KGgo="}},
                {"output_type": "error", "ename": "ValueError", "evalue": "bad", "traceback": []}
             ],
             "source": ["print('Hello, World!')"]},
            {"cell_type": "raw", "metadata": {"raw_mimetype": "text/html"}, "source": "<b>x</b>"}
        ],
        "metadata": {
            "kernelspec": {"display_name": "Python 3", "language": "python", "name": "python3"}
        },
        "nbformat": 4,
        "nbformat_minor": 4
    }"##;

    #[test]
    fn parses_cells_and_outputs() {
        let nb = parse_notebook(SAMPLE.as_bytes()).unwrap();
        assert_eq!(nb.cells.len(), 3);
        match &nb.cells[1] {
            Cell::Code {
                source,
                execution_count,
                outputs,
            } => {
                assert_eq!(source.as_str(), "print('Hello, World!')");
                assert_eq!(*execution_count, Some(1));
                assert_eq!(outputs.len(), 3);
                match &outputs[0] {
                    Output::Stream { name, text } => {
                        assert_eq!(name, "stdout");
                        assert_eq!(text.as_str(), "Hello, World!\n");
                    }
                    other => panic!("unexpected output {other:?}"),
                }
            }
            other => panic!("unexpected cell {other:?}"),
        }
    }

    #[test]
    fn summary_counts() {
        let s = parse_notebook(SAMPLE.as_bytes()).unwrap().summary();
        assert_eq!(s.nbformat, "4.4");
        assert_eq!(s.kernel.as_deref(), Some("Python 3"));
        assert_eq!(s.language.as_deref(), Some("python"));
        assert_eq!(s.markdown_cells, 1);
        assert_eq!(s.code_cells, 1);
        assert_eq!(s.raw_cells, 1);
        assert_eq!(s.total_cells(), 3);
        assert_eq!(s.outputs, 3);
        assert_eq!(s.images, 1);
        assert_eq!(s.errors, 1);
    }

    #[test]
    fn rejects_v3() {
        let err = parse_notebook(br#"{"nbformat": 3, "worksheets": []}"#).unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedVersion { found: 3 }));
    }

    #[test]
    fn reports_huge_version_unchanged() {
        let err = parse_notebook(br#"{"nbformat": 4294967300, "cells": []}"#).unwrap_err();
        assert!(matches!(
            err,
            ConvertError::UnsupportedVersion { found: 4_294_967_300 }
        ));
        assert!(err.to_string().contains("nbformat version 4294967300"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            parse_notebook(b"not json").unwrap_err(),
            ConvertError::InvalidNotebook { .. }
        ));
        assert!(matches!(
            parse_notebook(&[0xff, 0xfe, 0x00]).unwrap_err(),
            ConvertError::InvalidNotebook { .. }
        ));
        assert!(matches!(
            parse_notebook(br#"{"cells": []}"#).unwrap_err(),
            ConvertError::InvalidNotebook { .. }
        ));
    }

    #[test]
    fn rejects_unknown_cell_type() {
        let json = r#"{"cells": [{"cell_type": "heading", "source": "x"}], "nbformat": 4}"#;
        assert!(matches!(
            parse_notebook(json.as_bytes()).unwrap_err(),
            ConvertError::InvalidNotebook { .. }
        ));
    }

    #[test]
    fn raw_mimetype_falls_back_to_format() {
        let m = RawCellMetadata {
            raw_mimetype: None,
            format: Some("text/html".into()),
        };
        assert_eq!(m.mimetype(), Some("text/html"));
    }

    #[test]
    fn bundle_text_variants() {
        assert_eq!(bundle_text(&Value::String("a".into())), "a");
        assert_eq!(
            bundle_text(&serde_json::json!(["a\n", "b"])),
            "a\nb"
        );
        assert!(bundle_text(&serde_json::json!({"k": 1})).contains("\"k\": 1"));
    }
}
