//! Input resolution: read a user-supplied path or URL into memory.
//!
//! The model receives the whole PDF as one attachment, and retries and
//! archival need the same bytes again, so the document is loaded once into
//! a buffer that the session shares. Content checks (`%PDF` magic, size
//! limit) happen in [`crate::request::TranslationRequest::validate`]; this
//! module only reports what went wrong while *getting* the bytes.

use crate::error::{TranslateError, ValidationError};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load the document from a local path or an HTTP(S) URL.
///
/// Downloads larger than `max_bytes` (by their `Content-Length`) are refused
/// before the body is read.
pub async fn load_input(
    input: &str,
    timeout_secs: u64,
    max_bytes: usize,
) -> Result<Vec<u8>, TranslateError> {
    if is_url(input) {
        download_url(input, timeout_secs, max_bytes).await
    } else if input.contains("://") || input.trim().is_empty() {
        Err(TranslateError::InvalidInput {
            input: input.to_string(),
        })
    } else {
        read_local(input).await
    }
}

async fn read_local(path_str: &str) -> Result<Vec<u8>, TranslateError> {
    let path = PathBuf::from(path_str);
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            debug!("Read {} bytes from {}", bytes.len(), path.display());
            Ok(bytes)
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(TranslateError::PermissionDenied { path })
        }
        Err(_) => Err(TranslateError::FileNotFound { path }),
    }
}

async fn download_url(
    url: &str,
    timeout_secs: u64,
    max_bytes: usize,
) -> Result<Vec<u8>, TranslateError> {
    info!("Downloading PDF from: {}", url);

    let failed = |reason: String| TranslateError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            TranslateError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    if let Some(len) = response.content_length() {
        if len > max_bytes as u64 {
            return Err(ValidationError::InputTooLarge {
                size: len as usize,
                limit: max_bytes,
            }
            .into());
        }
    }

    let bytes = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            TranslateError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    info!("Downloaded {} bytes", bytes.len());
    Ok(bytes.to_vec())
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
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[tokio::test]
    async fn reads_local_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"%PDF-1.7 body").unwrap();
        let bytes = load_input(file.path().to_str().unwrap(), 5, 1024)
            .await
            .unwrap();
        assert_eq!(bytes, b"%PDF-1.7 body");
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = load_input("/definitely/not/here.pdf", 5, 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, TranslateError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn unsupported_scheme_is_invalid_input() {
        let err = load_input("ftp://example.com/doc.pdf", 5, 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, TranslateError::InvalidInput { .. }));
    }
}
