//! Input resolution: normalise a user-supplied path or URL to a local file.
//!
//! ## Why download to a temp file?
//!
//! Every later stage works from a path: the record layer copies it into
//! media storage and the CLI derives output names from it. Downloading to a
//! `TempDir` gives URL inputs a path too, and the directory is removed
//! automatically when [`ResolvedInput`] is dropped. A cheap sniff of the
//! first non-blank byte rejects obviously wrong files (a PDF, an HTML error
//! page) before the JSON parser produces a confusing message.

use crate::error::ConvertError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// The resolved input: either a local path or a downloaded temp file.
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; notebook downloaded to a temp directory.
    /// The `TempDir` is kept alive until processing completes.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    /// Path to the notebook file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }

    /// File stem used for titles and default output names.
    pub fn stem(&self) -> String {
        file_stem(self.path())
    }
}

/// `"analysis"` for `/tmp/analysis.ipynb`; `"notebook"` when there is none.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "notebook".to_string())
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local notebook file.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, ConvertError> {
    if input.trim().is_empty() {
        return Err(ConvertError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

/// First byte that is not whitespace or a UTF-8 BOM.
pub fn first_significant_byte(bytes: &[u8]) -> Option<u8> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    bytes.iter().copied().find(|b| !b.is_ascii_whitespace())
}

/// Cheap content sniff: a notebook is a JSON object.
pub fn looks_like_notebook(bytes: &[u8]) -> bool {
    first_significant_byte(bytes) == Some(b'{')
}

fn resolve_local(path_str: &str) -> Result<ResolvedInput, ConvertError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(ConvertError::FileNotFound { path });
    }
    if path.is_dir() {
        return Err(ConvertError::InvalidInput {
            input: path_str.to_string(),
        });
    }

    // A notebook can start with a long run of whitespace; read a small prefix.
    match std::fs::File::open(&path) {
        Ok(f) => {
            use std::io::Read;
            let mut head = Vec::with_capacity(512);
            let _ = f.take(512).read_to_end(&mut head);
            if !looks_like_notebook(&head) {
                let first_byte = first_significant_byte(&head);
                return Err(ConvertError::NotANotebook { path, first_byte });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ConvertError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(ConvertError::FileNotFound { path });
        }
    }

    debug!("Resolved local notebook: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, ConvertError> {
    info!("Downloading notebook from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ConvertError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ConvertError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ConvertError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(ConvertError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let filename = filename_from_url(url);
    let temp_dir = TempDir::new().map_err(|e| ConvertError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);

    let bytes = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            ConvertError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ConvertError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !looks_like_notebook(&bytes) {
        return Err(ConvertError::NotANotebook {
            path: file_path,
            first_byte: first_significant_byte(&bytes),
        });
    }

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| ConvertError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded {} bytes to: {}", bytes.len(), file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Last URL path segment with an extension, else `downloaded.ipynb`.
///
/// GitHub "raw" links and Jupyter server `/files/` URLs both end in the
/// notebook's own name, which makes a better title than a generic one.
pub fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.ipynb".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/nb.ipynb"));
        assert!(is_url("http://example.com/nb.ipynb"));
        assert!(!is_url("/tmp/nb.ipynb"));
        assert!(!is_url("nb.ipynb"));
        assert!(!is_url(""));
    }

    #[test]
    fn test_filename_from_url() {
        assert_eq!(
            filename_from_url("https://raw.githubusercontent.com/u/r/main/demo.ipynb"),
            "demo.ipynb"
        );
        assert_eq!(filename_from_url("https://example.com/api/get"), "downloaded.ipynb");
        assert_eq!(filename_from_url("not a url"), "downloaded.ipynb");
    }

    #[test]
    fn test_sniff() {
        assert!(looks_like_notebook(b"  \n{\"cells\": []}"));
        assert!(looks_like_notebook(b"\xEF\xBB\xBF{}"));
        assert!(!looks_like_notebook(b"%PDF-1.7"));
        assert!(!looks_like_notebook(b""));
        assert_eq!(first_significant_byte(b"\t<html>"), Some(b'<'));
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem(Path::new("/a/b/report.ipynb")), "report");
        assert_eq!(file_stem(Path::new("/")), "notebook");
    }

    #[tokio::test]
    async fn test_resolve_local() {
        let mut good = tempfile::Builder::new().suffix(".ipynb").tempfile().unwrap();
        good.write_all(b"{\"cells\": []}").unwrap();
        let resolved = resolve_input(good.path().to_str().unwrap(), 5).await.unwrap();
        assert_eq!(resolved.path(), good.path());

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        bad.write_all(b"%PDF-1.4").unwrap();
        let err = resolve_input(bad.path().to_str().unwrap(), 5)
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ConvertError::NotANotebook {
                first_byte: Some(b'%'),
                ..
            }
        ));

        let err = resolve_input("/definitely/not/here.ipynb", 5)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ConvertError::FileNotFound { .. }));

        let dir = tempfile::tempdir().unwrap();
        let err = resolve_input(dir.path().to_str().unwrap(), 5)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ConvertError::InvalidInput { .. }));
    }
}
