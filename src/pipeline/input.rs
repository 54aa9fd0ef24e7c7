//! Input resolution: normalise a user-supplied path or URL to a local file
//! and classify it as a PDF or a raster image.
//!
//! pdfium needs a file-system path, so URLs are downloaded into a `TempDir`
//! that lives as long as the [`ResolvedInput`]. The magic bytes are checked
//! up front so callers get a meaningful error rather than a decoder crash.

use crate::error::DocTagsError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// What kind of document a file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Pdf,
    /// A PNG or JPEG page scan; always a single page.
    Image,
}

impl InputKind {
    /// Classify by the first bytes of the file.
    pub fn sniff(magic: &[u8]) -> Option<InputKind> {
        if magic.starts_with(b"%PDF") {
            Some(InputKind::Pdf)
        } else if magic.starts_with(b"\x89PNG") || magic.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(InputKind::Image)
        } else {
            None
        }
    }
}

/// The resolved input: either a local path or a downloaded temp file.
pub enum ResolvedInput {
    Local { path: PathBuf, kind: InputKind },
    /// The `TempDir` is kept alive until processing completes.
    Downloaded {
        path: PathBuf,
        kind: InputKind,
        _temp_dir: TempDir,
    },
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local { path, .. } | ResolvedInput::Downloaded { path, .. } => path,
        }
    }

    pub fn kind(&self) -> InputKind {
        match self {
            ResolvedInput::Local { kind, .. } | ResolvedInput::Downloaded { kind, .. } => *kind,
        }
    }

    /// File stem used to name output artifacts.
    pub fn stem(&self) -> String {
        self.path()
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string())
    }
}

pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local, classified file.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, DocTagsError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

fn resolve_local(path_str: &str) -> Result<ResolvedInput, DocTagsError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(DocTagsError::FileNotFound { path });
    }

    let mut magic = [0u8; 4];
    match std::fs::File::open(&path) {
        Ok(mut f) => {
            use std::io::Read;
            // A file shorter than 4 bytes keeps zeros and fails the sniff.
            let _ = f.read(&mut magic);
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(DocTagsError::PermissionDenied { path });
        }
        Err(_) => return Err(DocTagsError::FileNotFound { path }),
    }

    let kind = InputKind::sniff(&magic).ok_or_else(|| DocTagsError::UnsupportedInput {
        path: path.clone(),
        magic,
    })?;

    debug!("Resolved local {:?}: {}", kind, path.display());
    Ok(ResolvedInput::Local { path, kind })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, DocTagsError> {
    info!("Downloading: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| DocTagsError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            DocTagsError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            DocTagsError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(DocTagsError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| DocTagsError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let mut magic = [0u8; 4];
    let n = bytes.len().min(4);
    magic[..n].copy_from_slice(&bytes[..n]);
    let kind = InputKind::sniff(&magic);

    let temp_dir = TempDir::new().map_err(|e| DocTagsError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(filename_from_url(url, kind));

    let Some(kind) = kind else {
        return Err(DocTagsError::UnsupportedInput {
            path: file_path,
            magic,
        });
    };

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| DocTagsError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded to: {}", file_path.display());
    Ok(ResolvedInput::Downloaded {
        path: file_path,
        kind,
        _temp_dir: temp_dir,
    })
}

/// Last path segment of the URL when it looks like a file name.
fn filename_from_url(url: &str, kind: Option<InputKind>) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }
    match kind {
        Some(InputKind::Image) => "downloaded.png".to_string(),
        _ => "downloaded.pdf".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn test_sniff() {
        assert_eq!(InputKind::sniff(b"%PDF-1.7"), Some(InputKind::Pdf));
        assert_eq!(InputKind::sniff(b"\x89PNG\r\n"), Some(InputKind::Image));
        assert_eq!(InputKind::sniff(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(InputKind::Image));
        assert_eq!(InputKind::sniff(b"GIF8"), None);
    }

    #[test]
    fn test_filename_from_url() {
        assert_eq!(
            filename_from_url("https://example.com/a/scan.png", Some(InputKind::Image)),
            "scan.png"
        );
        assert_eq!(
            filename_from_url("https://example.com/download", Some(InputKind::Pdf)),
            "downloaded.pdf"
        );
    }

    #[test]
    fn test_missing_file() {
        let err = resolve_local("/definitely/not/here.pdf");
        assert!(matches!(err, Err(DocTagsError::FileNotFound { .. })));
    }

    #[test]
    fn test_unsupported_file() {
        let mut tmp = tempfile::NamedTempFile::new().expect("tempfile");
        tmp.write_all(b"hello world").expect("write");
        let err = resolve_local(tmp.path().to_str().expect("utf-8 path"));
        assert!(matches!(err, Err(DocTagsError::UnsupportedInput { .. })));
    }

    #[test]
    fn test_local_png_is_image() {
        let mut tmp = tempfile::NamedTempFile::new().expect("tempfile");
        tmp.write_all(b"\x89PNG\r\n\x1a\n").expect("write");
        let resolved = resolve_local(tmp.path().to_str().expect("utf-8 path")).expect("resolve");
        assert_eq!(resolved.kind(), InputKind::Image);
    }
}
