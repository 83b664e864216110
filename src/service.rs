//! Upload handling and record-level conversion.
//!
//! [`ConversionService`] ties the three stateful pieces together: the
//! [`RecordStore`], the [`MediaStorage`] directory and the conversion
//! settings. There is no queue. An upload is validated, stored, recorded as
//! `pending` and converted before the call returns, so by the time a client
//! sees the response the record is already `completed` or `failed`.

use crate::config::{ConversionConfig, ServerConfig};
use crate::convert::convert_from_bytes;
use crate::error::ServiceError;
use crate::media::MediaStorage;
use crate::pipeline::input::file_stem;
use crate::store::{NotebookRecord, RecordStore};
use std::path::Path;
use tracing::{error, info, warn};

/// Longest accepted `original_filename`.
pub const MAX_FILENAME_CHARS: usize = 255;

pub const FIELD_FILE: &str = "notebook_file";
pub const FIELD_NAME: &str = "original_filename";

/// Check an upload before anything touches the disk.
///
/// `original_filename` is the user-facing name stored on the record;
/// `file_name` is the name the file arrived under, which decides the type.
pub fn validate_upload(
    original_filename: &str,
    file_name: &str,
    size: u64,
    max_size: u64,
) -> Result<(), ServiceError> {
    if original_filename.is_empty() {
        return Err(ServiceError::validation(FIELD_NAME, "This field is required."));
    }
    if original_filename.chars().count() > MAX_FILENAME_CHARS {
        return Err(ServiceError::validation(
            FIELD_NAME,
            format!("Ensure this field has no more than {MAX_FILENAME_CHARS} characters."),
        ));
    }
    if size == 0 {
        return Err(ServiceError::validation(FIELD_FILE, "The submitted file is empty."));
    }
    if !file_name.ends_with(".ipynb") {
        return Err(ServiceError::validation(
            FIELD_FILE,
            "Only Jupyter Notebook files (.ipynb) are allowed.",
        ));
    }
    if size > max_size {
        return Err(ServiceError::validation(
            FIELD_FILE,
            format!(
                "File size exceeds the limit of {:.0}MB.",
                max_size as f64 / (1024.0 * 1024.0)
            ),
        ));
    }
    Ok(())
}

pub struct ConversionService {
    store: RecordStore,
    media: MediaStorage,
    config: ConversionConfig,
    max_upload_bytes: u64,
}

impl ConversionService {
    pub fn new(
        store: RecordStore,
        media: MediaStorage,
        config: ConversionConfig,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            store,
            media,
            config,
            max_upload_bytes,
        }
    }

    /// Build from server settings, loading the state file if one is set.
    pub async fn from_config(config: &ServerConfig) -> Result<Self, ServiceError> {
        let store = match &config.state_file {
            Some(path) => RecordStore::open(path).await?,
            None => RecordStore::in_memory(),
        };
        let media = MediaStorage::new(&config.media_root, config.media_url.clone());
        Ok(Self::new(
            store,
            media,
            config.conversion.clone(),
            config.max_upload_bytes(),
        ))
    }

    pub fn media(&self) -> &MediaStorage {
        &self.media
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    /// Validate, store, record and convert an uploaded notebook.
    ///
    /// On conversion failure the record is kept, marked `failed` with a
    /// `"Failed to start conversion: …"` message, and the error is returned
    /// wrapped in [`ServiceError::ConversionStart`].
    pub async fn upload(
        &self,
        original_filename: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<NotebookRecord, ServiceError> {
        validate_upload(
            original_filename,
            file_name,
            bytes.len() as u64,
            self.max_upload_bytes,
        )?;

        let stored = self.media.save_notebook(bytes, file_name).await?;
        let record = match self.store.create(original_filename, &stored).await {
            Ok(r) => r,
            Err(e) => {
                let _ = self.media.delete(&stored).await;
                return Err(e);
            }
        };
        info!(
            "Accepted upload '{}' as record {} ({} bytes)",
            original_filename,
            record.id,
            bytes.len()
        );

        match self.run(record.id, "Failed to start conversion: ").await {
            Ok(record) => Ok(record),
            Err(e) => {
                error!("Error starting conversion: {}", e);
                Err(ServiceError::ConversionStart(Box::new(e)))
            }
        }
    }

    /// Convert a stored `pending` record.
    pub async fn convert_record(&self, id: u64) -> Result<NotebookRecord, ServiceError> {
        self.run(id, "").await
    }

    async fn run(&self, id: u64, failure_prefix: &str) -> Result<NotebookRecord, ServiceError> {
        let record = self.store.mark_processing(id).await?;

        match self.convert_stored(&record).await {
            Ok(pdf_file) => {
                let done = self.store.mark_completed(id, pdf_file).await?;
                info!("Successfully converted notebook ID {} to PDF", id);
                Ok(done)
            }
            Err(e) => {
                error!("Error converting notebook ID {}: {}", id, e);
                if let Err(mark) = self
                    .store
                    .mark_failed(id, format!("{failure_prefix}{e}"))
                    .await
                {
                    warn!("Could not mark record {} failed: {}", id, mark);
                }
                Err(e)
            }
        }
    }

    /// Read the stored notebook, convert it and store the PDF.
    async fn convert_stored(&self, record: &NotebookRecord) -> Result<String, ServiceError> {
        let bytes = self.media.read(&record.notebook_file).await?;
        let name = file_stem(Path::new(&record.original_filename));
        let output = convert_from_bytes(&bytes, &name, &self.config).await?;
        self.media.save_pdf(&output.pdf).await
    }

    pub async fn get(&self, id: u64) -> Result<NotebookRecord, ServiceError> {
        self.store.get(id).await
    }

    /// Same lookup as [`get`](Self::get); the HTTP layer renders less of it.
    pub async fn status(&self, id: u64) -> Result<NotebookRecord, ServiceError> {
        self.store.get(id).await
    }

    pub async fn list(&self) -> Vec<NotebookRecord> {
        self.store.list().await
    }

    /// Delete a record and its stored notebook and PDF.
    pub async fn delete(&self, id: u64) -> Result<(), ServiceError> {
        let record = self.store.delete(id).await?;
        self.media.delete(&record.notebook_file).await?;
        if let Some(pdf) = &record.pdf_file {
            self.media.delete(pdf).await?;
        }
        info!("Deleted notebook ID {}", id);
        Ok(())
    }
}
