//! Best-effort archival of finished sessions.
//!
//! After a session's `Final` event is ready, its input bytes and final text
//! are handed to the configured [`Archive`] on a detached task. The session
//! never waits for it and never learns whether it worked: a failure is
//! logged with the document id and dropped.

use crate::error::ArchiveError;
use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Storage for finished sessions.
pub trait Archive: Send + Sync {
    /// Store the raw input and the final text under `document_id`.
    fn store<'a>(
        &'a self,
        document_id: &'a str,
        input: Arc<[u8]>,
        final_text: &'a str,
    ) -> BoxFuture<'a, Result<(), ArchiveError>>;
}

/// Archives into a directory: `<root>/<document_id>/input.pdf` and
/// `<root>/<document_id>/output.md`.
///
/// Each file is written to a `.tmp` sibling first and renamed into place, so
/// a reader never sees a half-written entry.
#[derive(Debug, Clone)]
pub struct FsArchive {
    root: PathBuf,
}

impl FsArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of one entry.
    pub fn entry_dir(&self, document_id: &str) -> PathBuf {
        self.root.join(document_id)
    }
}

impl Archive for FsArchive {
    fn store<'a>(
        &'a self,
        document_id: &'a str,
        input: Arc<[u8]>,
        final_text: &'a str,
    ) -> BoxFuture<'a, Result<(), ArchiveError>> {
        Box::pin(async move {
            if document_id.is_empty()
                || document_id.contains(['/', '\\'])
                || document_id.starts_with('.')
            {
                return Err(ArchiveError::Backend(format!(
                    "refusing unsafe document id '{document_id}'"
                )));
            }

            let dir = self.entry_dir(document_id);
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|source| ArchiveError::Write {
                    path: dir.clone(),
                    source,
                })?;

            write_atomic(&dir.join("input.pdf"), &input).await?;
            write_atomic(&dir.join("output.md"), final_text.as_bytes()).await?;

            debug!("Archived {} to {}", document_id, dir.display());
            Ok(())
        })
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ArchiveError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|source| ArchiveError::Write {
            path: tmp.clone(),
            source,
        })?;
    if let Err(source) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(ArchiveError::Write {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_input_and_output() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FsArchive::new(dir.path());
        let input: Arc<[u8]> = Arc::from(&b"%PDF-1.7"[..]);

        archive
            .store("req_1_0", input, "# अनुवाद\n")
            .await
            .unwrap();

        let entry = archive.entry_dir("req_1_0");
        assert_eq!(std::fs::read(entry.join("input.pdf")).unwrap(), b"%PDF-1.7");
        assert_eq!(
            std::fs::read_to_string(entry.join("output.md")).unwrap(),
            "# अनुवाद\n"
        );
        assert!(!entry.join("output.md.tmp").exists());
    }

    #[tokio::test]
    async fn failed_rename_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FsArchive::new(dir.path());
        // A non-empty directory where the output file should go.
        let blocker = archive.entry_dir("req_2_0").join("output.md");
        std::fs::create_dir_all(blocker.join("occupied")).unwrap();

        let err = archive
            .store("req_2_0", Arc::from(&b"%PDF"[..]), "text")
            .await
            .unwrap_err();

        assert!(matches!(err, ArchiveError::Write { .. }));
        assert!(!archive.entry_dir("req_2_0").join("output.md.tmp").exists());
    }

    #[tokio::test]
    async fn rejects_path_like_ids() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FsArchive::new(dir.path());
        for id in ["../escape", "a/b", ".hidden", ""] {
            let err = archive
                .store(id, Arc::from(&b"x"[..]), "y")
                .await
                .unwrap_err();
            assert!(matches!(err, ArchiveError::Backend(_)), "id {id:?}");
        }
    }

    #[tokio::test]
    async fn unwritable_root_is_an_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        // A regular file cannot hold entry directories.
        let archive = FsArchive::new(file.path());
        let err = archive
            .store("req_1_0", Arc::from(&b"x"[..]), "y")
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::Write { .. }));
    }
}
