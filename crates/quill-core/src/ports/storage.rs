//! Cover file storage port.

use async_trait::async_trait;

use crate::domain::CoverUpload;

/// Stores uploaded cover images and hands back the path they are served under.
#[async_trait]
pub trait CoverStore: Send + Sync {
    /// Persist a validated upload. Returns its public path, e.g. `uploads/<name>.jpg`.
    async fn store(&self, cover: &CoverUpload) -> Result<String, StorageError>;

    /// Delete a cover previously returned by [`CoverStore::store`].
    async fn remove(&self, path: &str) -> Result<(), StorageError>;
}

/// Storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown cover path: {0}")]
    UnknownPath(String),
}
