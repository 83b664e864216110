//! Progress-callback trait for per-stage conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves a notebook through its stages.
//!
//! The callback is the least-invasive integration point: the CLI drives a
//! terminal progress bar with it, tests count events with it, and a host
//! application could forward events to a channel or a database record.
//!
//! # Example
//!
//! ```rust
//! use ipynb2pdf::{ConversionConfig, ConversionProgressCallback, Stage};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     stages: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_stage(&self, name: &str, stage: Stage) {
//!         self.stages.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{name}: {stage}");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { stages: AtomicUsize::new(0) });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// One step of the notebook → HTML → PDF pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Reading and decoding the notebook JSON.
    Parse,
    /// Rendering the notebook to a standalone HTML document.
    Html,
    /// Turning the HTML into PDF bytes.
    Pdf,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Parse => "parsing notebook",
            Stage::Html => "rendering HTML",
            Stage::Pdf => "rendering PDF",
        };
        f.write_str(s)
    }
}

/// Called by the conversion pipeline as it processes a notebook.
///
/// Implementations must be `Send + Sync`: the PDF stage runs on a blocking
/// thread and the same callback may serve several conversions at once.
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before the notebook is read.
    ///
    /// # Arguments
    /// * `name` - the input path, URL, or upload name
    fn on_conversion_start(&self, name: &str) {
        let _ = name;
    }

    /// Called when the pipeline enters a stage.
    fn on_stage(&self, name: &str, stage: Stage) {
        let _ = (name, stage);
    }

    /// Called once after the PDF has been produced.
    ///
    /// # Arguments
    /// * `name`      - same value passed to `on_conversion_start`
    /// * `pages`     - number of PDF pages (0 when an external engine ran)
    /// * `pdf_bytes` - size of the produced PDF
    fn on_conversion_complete(&self, name: &str, pages: usize, pdf_bytes: usize) {
        let _ = (name, pages, pdf_bytes);
    }

    /// Called when a stage fails. No further events follow for this input.
    fn on_conversion_error(&self, name: &str, error: &str) {
        let _ = (name, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        stages: Mutex<Vec<Stage>>,
        completes: AtomicUsize,
        errors: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_conversion_start(&self, _name: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_stage(&self, _name: &str, stage: Stage) {
            self.stages.lock().unwrap().push(stage);
        }

        fn on_conversion_complete(&self, _name: &str, _pages: usize, _pdf_bytes: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_conversion_error(&self, _name: &str, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_conversion_start("a.ipynb");
        cb.on_stage("a.ipynb", Stage::Parse);
        cb.on_conversion_complete("a.ipynb", 3, 1024);
        cb.on_conversion_error("a.ipynb", "boom");
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_conversion_start("nb.ipynb");
        tracker.on_stage("nb.ipynb", Stage::Parse);
        tracker.on_stage("nb.ipynb", Stage::Html);
        tracker.on_stage("nb.ipynb", Stage::Pdf);
        tracker.on_conversion_complete("nb.ipynb", 2, 4096);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 1);
        assert_eq!(
            *tracker.stages.lock().unwrap(),
            vec![Stage::Parse, Stage::Html, Stage::Pdf]
        );
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn stage_display() {
        assert_eq!(Stage::Html.to_string(), "rendering HTML");
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn ConversionProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_conversion_start("x");
        cb.on_stage("x", Stage::Pdf);
    }
}
