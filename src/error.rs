//! Error types for the ipynb2pdf library.
//!
//! Two error types cover the two layers of the crate:
//!
//! * [`ConvertError`]: the notebook → HTML → PDF pipeline failed. Bad input
//!   file, malformed notebook JSON, an external engine that crashed. Returned
//!   from the `convert*` functions and carried inside [`ServiceError`].
//!
//! * [`ServiceError`]: the upload/record layer failed. A record that does not
//!   exist, an upload that fails validation, an illegal status move, or a
//!   storage problem. The HTTP layer maps each variant to a status code.

use crate::store::ConversionStatus;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the conversion pipeline.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Notebook file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists but does not start with a JSON object.
    #[error("File is not a Jupyter notebook: '{path}'\nFirst byte: {first_byte:?}")]
    NotANotebook { path: PathBuf, first_byte: Option<u8> },

    // ── Notebook errors ───────────────────────────────────────────────────
    /// The notebook JSON is malformed or does not match nbformat.
    #[error("Invalid notebook: {detail}")]
    InvalidNotebook { detail: String },

    /// nbformat major version other than 4.
    #[error("Unsupported nbformat version {found}; only version 4 notebooks are supported")]
    UnsupportedVersion { found: u64 },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// The PDF stage could not produce a document.
    #[error("PDF rendering failed: {detail}")]
    PdfRenderFailed { detail: String },

    /// The external HTML → PDF program exited unsuccessfully.
    #[error("PDF engine '{program}' failed ({status}): {stderr}")]
    EngineFailed {
        program: String,
        status: String,
        stderr: String,
    },

    /// The external HTML → PDF program could not be started.
    #[error("Could not start PDF engine '{program}': {source}\nIs it installed and on PATH?")]
    EngineNotFound {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The external HTML → PDF program ran past its timeout and was killed.
    #[error("PDF engine '{program}' timed out after {secs}s")]
    EngineTimeout { program: String, secs: u64 },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors from the record store, media storage and upload service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No record with this id.
    #[error("Notebook with ID {id} does not exist")]
    NotFound { id: u64 },

    /// Upload rejected before anything was stored.
    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// The status machine does not allow this move.
    #[error("Cannot move notebook {id} from '{from}' to '{to}'")]
    InvalidTransition {
        id: u64,
        from: ConversionStatus,
        to: ConversionStatus,
    },

    /// The pipeline failed for this record.
    #[error(transparent)]
    Conversion(#[from] ConvertError),

    /// An upload was recorded but its inline conversion did not finish.
    #[error("Failed to start conversion: {0}")]
    ConversionStart(#[source] Box<ServiceError>),

    /// Reading or writing the media directory or state file failed.
    #[error("Storage error at '{path}': {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The persisted state file could not be decoded or encoded.
    #[error("Corrupt state file '{path}': {source}")]
    State {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ServiceError::Storage {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        ServiceError::Validation {
            field,
            message: message.into(),
        }
    }
}
