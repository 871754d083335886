use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::domain::StoragePath;

/// Staging and artifact storage for uploads and rendered spreadsheets.
#[async_trait::async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn store(&self, path: &StoragePath, data: Bytes) -> Result<u64, ArtifactStoreError>;

    async fn fetch(&self, path: &StoragePath) -> Result<Vec<u8>, ArtifactStoreError>;

    async fn delete(&self, path: &StoragePath) -> Result<(), ArtifactStoreError>;

    async fn head(&self, path: &StoragePath) -> Result<u64, ArtifactStoreError>;

    /// All stored objects with their last-modified timestamps, for the
    /// stale-file sweeper.
    async fn list(&self) -> Result<Vec<(StoragePath, DateTime<Utc>)>, ArtifactStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ArtifactStoreError {
    #[error("write failed: {0}")]
    WriteFailed(String),
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("read failed: {0}")]
    ReadFailed(String),
    #[error("delete failed: {0}")]
    DeleteFailed(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
