//! Local filesystem cover store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use uuid::Uuid;

use quill_core::domain::CoverUpload;
use quill_core::ports::{CoverStore, StorageError};

/// Public URL segment covers are served under.
pub const UPLOADS_PREFIX: &str = "uploads";

/// Writes covers into a directory that is also served statically.
///
/// A cover is written under a bare generated name and then renamed to carry
/// its extension. A crash between the two steps leaves an orphaned file; no
/// post references it.
pub struct LocalCoverStore {
    root: PathBuf,
}

impl LocalCoverStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the upload directory if it does not exist yet.
    pub async fn ensure_root(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Map a public path back to a file inside the root, refusing anything
    /// that is not a plain file name under the uploads prefix.
    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let name = path
            .strip_prefix(UPLOADS_PREFIX)
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|name| {
                !name.is_empty()
                    && !name.contains(['/', '\\'])
                    && !name.starts_with('.')
            })
            .ok_or_else(|| StorageError::UnknownPath(path.to_string()))?;

        Ok(self.root.join(name))
    }
}

#[async_trait]
impl CoverStore for LocalCoverStore {
    async fn store(&self, cover: &CoverUpload) -> Result<String, StorageError> {
        self.ensure_root().await?;

        let stem = Uuid::new_v4().simple().to_string();
        let staging = self.root.join(&stem);
        tokio::fs::write(&staging, &cover.bytes).await?;

        let file_name = format!("{stem}.{}", cover.extension());
        if let Err(e) = tokio::fs::rename(&staging, self.root.join(&file_name)).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }

        tracing::debug!(file = %file_name, bytes = cover.bytes.len(), "Cover stored");
        Ok(format!("{UPLOADS_PREFIX}/{file_name}"))
    }

    async fn remove(&self, path: &str) -> Result<(), StorageError> {
        let file = self.resolve(path)?;
        tokio::fs::remove_file(file).await?;
        Ok(())
    }
}
