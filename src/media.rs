//! On-disk storage for uploaded notebooks and rendered PDFs.
//!
//! Files live under one media root and are referred to by paths relative to
//! it (`notebooks/<random>.ipynb`, `pdfs/<random>.pdf`). Random names keep two
//! uploads of `analysis.ipynb` from colliding; the user-facing name stays in
//! the record's `original_filename`.

use crate::error::ServiceError;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

pub const NOTEBOOK_DIR: &str = "notebooks";
pub const PDF_DIR: &str = "pdfs";

/// Random characters in a stored file name.
const NAME_CHARS: usize = 24;

#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
    url_prefix: String,
}

impl MediaStorage {
    /// `url_prefix` is where the HTTP layer serves `root`, e.g. `/media`.
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        let url_prefix = url_prefix.into();
        Self {
            root: root.into(),
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    /// Store an uploaded notebook under a fresh name, keeping its extension.
    pub async fn save_notebook(
        &self,
        bytes: &[u8],
        original_name: &str,
    ) -> Result<String, ServiceError> {
        let suffix = extension(original_name)
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();
        self.save(NOTEBOOK_DIR, suffix, bytes).await
    }

    pub async fn save_pdf(&self, bytes: &[u8]) -> Result<String, ServiceError> {
        self.save(PDF_DIR, ".pdf".to_string(), bytes).await
    }

    async fn save(&self, dir: &str, suffix: String, bytes: &[u8]) -> Result<String, ServiceError> {
        let abs_dir = self.root.join(dir);
        tokio::fs::create_dir_all(&abs_dir)
            .await
            .map_err(|e| ServiceError::storage(&abs_dir, e))?;

        let target = abs_dir.clone();
        let data = bytes.to_vec();
        let abs = tokio::task::spawn_blocking(move || -> std::io::Result<PathBuf> {
            let mut file = tempfile::Builder::new()
                .prefix("")
                .suffix(&suffix)
                .rand_bytes(NAME_CHARS)
                .tempfile_in(&target)?;
            file.write_all(&data)?;
            let (_, path) = file.keep().map_err(|e| e.error)?;
            Ok(path)
        })
        .await
        .map_err(|e| ServiceError::Internal(format!("Storage task panicked: {e}")))?
        .map_err(|e| ServiceError::storage(&abs_dir, e))?;

        let name = abs
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        debug!("Stored {} bytes at {}", bytes.len(), abs.display());
        Ok(format!("{dir}/{name}"))
    }

    /// Absolute path of a stored file.
    ///
    /// Rejects anything that could escape the media root.
    pub fn path(&self, relative: &str) -> Result<PathBuf, ServiceError> {
        let rel = Path::new(relative);
        let safe = rel
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if relative.is_empty() || !safe {
            return Err(ServiceError::Internal(format!(
                "Refusing media path outside the media root: '{relative}'"
            )));
        }
        Ok(self.root.join(rel))
    }

    /// Public URL of a stored file.
    pub fn url(&self, relative: &str) -> String {
        format!("{}/{}", self.url_prefix, relative.trim_start_matches('/'))
    }

    pub async fn read(&self, relative: &str) -> Result<Vec<u8>, ServiceError> {
        let path = self.path(relative)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| ServiceError::storage(&path, e))
    }

    /// Remove a stored file. A file that is already gone is not an error.
    pub async fn delete(&self, relative: &str) -> Result<(), ServiceError> {
        let path = self.path(relative)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Media file already missing: {}", path.display());
                Ok(())
            }
            Err(e) => Err(ServiceError::storage(&path, e)),
        }
    }
}

/// Text after the last `.`, if the name has one.
fn extension(name: &str) -> Option<&str> {
    let (stem, ext) = name.rsplit_once('.')?;
    let ok = !ext.is_empty()
        && ext.len() <= 16
        && ext.chars().all(|c| c.is_ascii_alphanumeric());
    (ok && !stem.is_empty()).then_some(ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_read_delete() {
        let dir = tempfile::tempdir().unwrap();
        let media = MediaStorage::new(dir.path(), "/media/");

        let rel = media.save_notebook(b"{}", "my notebook.ipynb").await.unwrap();
        assert!(rel.starts_with("notebooks/"));
        assert!(rel.ends_with(".ipynb"));
        assert_eq!(media.read(&rel).await.unwrap(), b"{}");
        assert_eq!(media.url(&rel), format!("/media/{rel}"));

        let pdf = media.save_pdf(b"%PDF").await.unwrap();
        assert!(pdf.starts_with("pdfs/") && pdf.ends_with(".pdf"));

        media.delete(&rel).await.unwrap();
        assert!(!media.path(&rel).unwrap().exists());
        // Second delete is a no-op.
        media.delete(&rel).await.unwrap();
    }

    #[tokio::test]
    async fn names_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let media = MediaStorage::new(dir.path(), "/media");
        let a = media.save_notebook(b"{}", "a.ipynb").await.unwrap();
        let b = media.save_notebook(b"{}", "a.ipynb").await.unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_escaping_paths() {
        let media = MediaStorage::new("/srv/media", "/media");
        assert!(media.path("../etc/passwd").is_err());
        assert!(media.path("/etc/passwd").is_err());
        assert!(media.path("").is_err());
        assert_eq!(
            media.path("pdfs/a.pdf").unwrap(),
            PathBuf::from("/srv/media/pdfs/a.pdf")
        );
    }

    #[test]
    fn extension_rules() {
        assert_eq!(extension("a.ipynb"), Some("ipynb"));
        assert_eq!(extension("archive.tar.gz"), Some("gz"));
        assert_eq!(extension("noext"), None);
        assert_eq!(extension(".hidden"), None);
        assert_eq!(extension("x.we ird"), None);
    }
}
