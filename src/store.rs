//! Upload records and the conversion status machine.
//!
//! ```text
//!            ┌────────────┐  mark_processing  ┌────────────┐  mark_completed  ┌───────────┐
//!  create ──▶│  pending   │──────────────────▶│ processing │─────────────────▶│ completed │
//!            └─────┬──────┘                   └─────┬──────┘                  └───────────┘
//!                  │ mark_failed                    │ mark_failed
//!                  ▼                                ▼
//!            ┌────────────────────────────────────────┐
//!            │                 failed                 │
//!            └────────────────────────────────────────┘
//! ```
//!
//! `completed` and `failed` are terminal. The store is an in-process table
//! behind a `tokio::sync::RwLock`; give it a state file and every change is
//! written through as JSON so records survive a restart.

use crate::error::ServiceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Where a record is in its conversion lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ConversionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversionStatus::Pending => "pending",
            ConversionStatus::Processing => "processing",
            ConversionStatus::Completed => "completed",
            ConversionStatus::Failed => "failed",
        }
    }

    pub fn can_transition_to(&self, next: ConversionStatus) -> bool {
        use ConversionStatus::*;
        matches!(
            (self, next),
            (Pending, Processing) | (Pending, Failed) | (Processing, Completed) | (Processing, Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ConversionStatus::Completed | ConversionStatus::Failed)
    }
}

impl fmt::Display for ConversionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One uploaded notebook and what became of it.
///
/// `notebook_file` and `pdf_file` are paths relative to the media root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotebookRecord {
    pub id: u64,
    pub original_filename: String,
    pub notebook_file: String,
    pub pdf_file: Option<String>,
    pub created_at: DateTime<Utc>,
    pub converted_at: Option<DateTime<Utc>>,
    pub status: ConversionStatus,
    pub error_message: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Table {
    next_id: u64,
    records: BTreeMap<u64, NotebookRecord>,
}

/// The record table.
#[derive(Debug)]
pub struct RecordStore {
    table: RwLock<Table>,
    state_file: Option<PathBuf>,
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl RecordStore {
    /// A store that forgets everything on drop.
    pub fn in_memory() -> Self {
        Self {
            table: RwLock::new(Table {
                next_id: 1,
                records: BTreeMap::new(),
            }),
            state_file: None,
        }
    }

    /// Open a store backed by `path`, loading it if it exists.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, ServiceError> {
        let path = path.into();
        let mut table = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Table>(&bytes).map_err(|source| {
                ServiceError::State {
                    path: path.clone(),
                    source,
                }
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Table::default(),
            Err(e) => return Err(ServiceError::storage(&path, e)),
        };

        // Never reuse an id, even if the counter in the file is stale.
        let highest = table.records.keys().next_back().copied().unwrap_or(0);
        table.next_id = table.next_id.max(highest + 1).max(1);
        info!(
            "Loaded {} record(s) from {}",
            table.records.len(),
            path.display()
        );

        Ok(Self {
            table: RwLock::new(table),
            state_file: Some(path),
        })
    }

    /// Insert a new `pending` record.
    pub async fn create(
        &self,
        original_filename: impl Into<String>,
        notebook_file: impl Into<String>,
    ) -> Result<NotebookRecord, ServiceError> {
        let mut table = self.table.write().await;
        let id = table.next_id;
        let record = NotebookRecord {
            id,
            original_filename: original_filename.into(),
            notebook_file: notebook_file.into(),
            pdf_file: None,
            created_at: Utc::now(),
            converted_at: None,
            status: ConversionStatus::Pending,
            error_message: None,
        };
        table.next_id += 1;
        table.records.insert(id, record.clone());
        if let Err(e) = self.persist(&table).await {
            table.records.remove(&id);
            table.next_id = id;
            return Err(e);
        }
        debug!("Created record {}", id);
        Ok(record)
    }

    pub async fn get(&self, id: u64) -> Result<NotebookRecord, ServiceError> {
        self.table
            .read()
            .await
            .records
            .get(&id)
            .cloned()
            .ok_or(ServiceError::NotFound { id })
    }

    /// All records in id order.
    pub async fn list(&self) -> Vec<NotebookRecord> {
        self.table.read().await.records.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn mark_processing(&self, id: u64) -> Result<NotebookRecord, ServiceError> {
        self.transition(id, ConversionStatus::Processing, |_| {}).await
    }

    /// Record a finished PDF and stamp `converted_at`.
    pub async fn mark_completed(
        &self,
        id: u64,
        pdf_file: impl Into<String>,
    ) -> Result<NotebookRecord, ServiceError> {
        let pdf_file = pdf_file.into();
        self.transition(id, ConversionStatus::Completed, move |r| {
            r.pdf_file = Some(pdf_file);
            r.converted_at = Some(Utc::now());
            r.error_message = None;
        })
        .await
    }

    pub async fn mark_failed(
        &self,
        id: u64,
        message: impl Into<String>,
    ) -> Result<NotebookRecord, ServiceError> {
        let message = message.into();
        self.transition(id, ConversionStatus::Failed, move |r| {
            r.error_message = Some(message);
        })
        .await
    }

    /// Remove a record and return it so the caller can clean up its files.
    pub async fn delete(&self, id: u64) -> Result<NotebookRecord, ServiceError> {
        let mut table = self.table.write().await;
        let record = table
            .records
            .remove(&id)
            .ok_or(ServiceError::NotFound { id })?;
        if let Err(e) = self.persist(&table).await {
            table.records.insert(id, record);
            return Err(e);
        }
        debug!("Deleted record {}", id);
        Ok(record)
    }

    async fn transition(
        &self,
        id: u64,
        to: ConversionStatus,
        apply: impl FnOnce(&mut NotebookRecord),
    ) -> Result<NotebookRecord, ServiceError> {
        let mut table = self.table.write().await;
        let record = table
            .records
            .get_mut(&id)
            .ok_or(ServiceError::NotFound { id })?;
        if !record.status.can_transition_to(to) {
            return Err(ServiceError::InvalidTransition {
                id,
                from: record.status,
                to,
            });
        }
        let previous = record.clone();
        record.status = to;
        apply(record);
        let updated = record.clone();
        if let Err(e) = self.persist(&table).await {
            table.records.insert(id, previous);
            return Err(e);
        }
        debug!("Record {} is now {}", id, to);
        Ok(updated)
    }

    /// Write the table through to the state file, if there is one.
    ///
    /// Callers change the table first and undo the change when this fails,
    /// so memory never holds a record the file does not.
    async fn persist(&self, table: &Table) -> Result<(), ServiceError> {
        let Some(path) = &self.state_file else {
            return Ok(());
        };
        let json = serde_json::to_vec_pretty(table).map_err(|source| ServiceError::State {
            path: path.clone(),
            source,
        })?;
        write_atomic(path, &json).await
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ServiceError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ServiceError::storage(parent, e))?;
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| ServiceError::storage(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| ServiceError::storage(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::block_on;

    #[test]
    fn transitions() {
        use ConversionStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Pending.can_transition_to(Failed));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Processing));
        assert!(!Failed.can_transition_to(Processing));
        assert!(!Processing.can_transition_to(Pending));
        assert!(Completed.is_terminal() && Failed.is_terminal());
        assert!(!Pending.is_terminal());
    }

    #[test]
    fn status_serialises_lowercase() {
        assert_eq!(
            serde_json::to_string(&ConversionStatus::Processing).unwrap(),
            "\"processing\""
        );
        assert_eq!(ConversionStatus::default(), ConversionStatus::Pending);
        assert_eq!(ConversionStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn lifecycle_in_memory() {
        block_on(async {
            let store = RecordStore::in_memory();
            let a = store.create("a.ipynb", "notebooks/a.ipynb").await.unwrap();
            let b = store.create("b.ipynb", "notebooks/b.ipynb").await.unwrap();
            assert_eq!((a.id, b.id), (1, 2));
            assert_eq!(a.status, ConversionStatus::Pending);
            assert!(a.converted_at.is_none());

            store.mark_processing(a.id).await.unwrap();
            let done = store.mark_completed(a.id, "pdfs/x.pdf").await.unwrap();
            assert_eq!(done.status, ConversionStatus::Completed);
            assert_eq!(done.pdf_file.as_deref(), Some("pdfs/x.pdf"));
            assert!(done.converted_at.is_some());

            let failed = store.mark_failed(b.id, "boom").await.unwrap();
            assert_eq!(failed.error_message.as_deref(), Some("boom"));

            let ids: Vec<u64> = store.list().await.iter().map(|r| r.id).collect();
            assert_eq!(ids, vec![1, 2]);
        });
    }

    #[test]
    fn illegal_moves_are_rejected() {
        block_on(async {
            let store = RecordStore::in_memory();
            let r = store.create("a.ipynb", "notebooks/a.ipynb").await.unwrap();
            let err = store.mark_completed(r.id, "pdfs/a.pdf").await.unwrap_err();
            assert!(matches!(
                err,
                ServiceError::InvalidTransition {
                    from: ConversionStatus::Pending,
                    to: ConversionStatus::Completed,
                    ..
                }
            ));
            // The failed move left the record untouched.
            assert_eq!(store.get(r.id).await.unwrap().status, ConversionStatus::Pending);
        });
    }

    #[test]
    fn unknown_ids() {
        block_on(async {
            let store = RecordStore::in_memory();
            assert!(matches!(
                store.get(9).await,
                Err(ServiceError::NotFound { id: 9 })
            ));
            assert!(matches!(
                store.delete(9).await,
                Err(ServiceError::NotFound { id: 9 })
            ));
            assert!(store.is_empty().await);
        });
    }

    #[tokio::test]
    async fn state_file_round_trip_resumes_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state/records.json");

        {
            let store = RecordStore::open(&path).await.unwrap();
            store.create("a.ipynb", "notebooks/a.ipynb").await.unwrap();
            let b = store.create("b.ipynb", "notebooks/b.ipynb").await.unwrap();
            store.mark_processing(b.id).await.unwrap();
            store.delete(1).await.unwrap();
        }

        let store = RecordStore::open(&path).await.unwrap();
        let records = store.list().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, 2);
        assert_eq!(records[0].status, ConversionStatus::Processing);

        let c = store.create("c.ipynb", "notebooks/c.ipynb").await.unwrap();
        assert_eq!(c.id, 3);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn failed_write_leaves_table_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        let store = RecordStore::open(&path).await.unwrap();
        let a = store.create("a.ipynb", "notebooks/a.ipynb").await.unwrap();

        // A directory where the temp file goes makes every write fail.
        let blocker = path.with_extension("json.tmp");
        std::fs::create_dir(&blocker).unwrap();

        assert!(matches!(
            store.create("b.ipynb", "notebooks/b.ipynb").await,
            Err(ServiceError::Storage { .. })
        ));
        assert!(store.mark_processing(a.id).await.is_err());
        assert!(store.delete(a.id).await.is_err());

        let records = store.list().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, ConversionStatus::Pending);

        std::fs::remove_dir(&blocker).unwrap();
        let b = store.create("b.ipynb", "notebooks/b.ipynb").await.unwrap();
        assert_eq!(b.id, 2);

        // The file agrees with memory.
        let reopened = RecordStore::open(&path).await.unwrap();
        assert_eq!(reopened.list().await, store.list().await);
    }

    #[tokio::test]
    async fn corrupt_state_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        std::fs::write(&path, b"{ not json").unwrap();
        let err = RecordStore::open(&path).await.unwrap_err();
        assert!(matches!(err, ServiceError::State { .. }));
    }
}
