//! Result types returned by the conversion entry points.

use crate::pipeline::notebook::NotebookSummary;
use serde::{Deserialize, Serialize};

/// Everything a conversion produced.
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    /// The finished PDF document.
    pub pdf: Vec<u8>,
    /// The intermediate standalone HTML the PDF was rendered from.
    pub html: String,
    /// What was in the notebook.
    pub summary: NotebookSummary,
    pub stats: ConversionStats,
}

/// Counters and timings for one conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Cells in the notebook (all kinds).
    pub cells: usize,
    /// Pages in the produced PDF. Zero when the page count of an externally
    /// rendered PDF could not be determined.
    pub pages: usize,
    pub pdf_bytes: usize,
    pub parse_duration_ms: u64,
    pub html_duration_ms: u64,
    pub pdf_duration_ms: u64,
    pub total_duration_ms: u64,
}
