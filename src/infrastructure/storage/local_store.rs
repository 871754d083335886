use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use object_store::local::LocalFileSystem;
use object_store::path::Path as StorePath;
use object_store::{ObjectStore, PutPayload};

use crate::application::ports::{ArtifactStore, ArtifactStoreError};
use crate::domain::StoragePath;

/// Filesystem-backed staging and artifact storage rooted at a single base
/// directory (`staging/` for uploads, `converted/` for rendered workbooks).
pub struct LocalArtifactStore {
    inner: Arc<LocalFileSystem>,
}

impl LocalArtifactStore {
    pub fn new(base_path: PathBuf) -> Result<Self, ArtifactStoreError> {
        std::fs::create_dir_all(&base_path).map_err(ArtifactStoreError::Io)?;
        let fs = LocalFileSystem::new_with_prefix(base_path)
            .map_err(|e| ArtifactStoreError::WriteFailed(e.to_string()))?;
        Ok(Self {
            inner: Arc::new(fs),
        })
    }
}

#[async_trait::async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn store(&self, path: &StoragePath, data: Bytes) -> Result<u64, ArtifactStoreError> {
        let store_path = StorePath::from(path.as_str());
        let size = data.len() as u64;
        self.inner
            .put(&store_path, PutPayload::from(data))
            .await
            .map_err(|e| ArtifactStoreError::WriteFailed(e.to_string()))?;
        Ok(size)
    }

    async fn fetch(&self, path: &StoragePath) -> Result<Vec<u8>, ArtifactStoreError> {
        let store_path = StorePath::from(path.as_str());
        let result = self
            .inner
            .get(&store_path)
            .await
            .map_err(|e| ArtifactStoreError::NotFound(e.to_string()))?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| ArtifactStoreError::ReadFailed(e.to_string()))?;

        Ok(bytes.to_vec())
    }

    async fn delete(&self, path: &StoragePath) -> Result<(), ArtifactStoreError> {
        let store_path = StorePath::from(path.as_str());
        self.inner.delete(&store_path).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => ArtifactStoreError::NotFound(path.to_string()),
            other => ArtifactStoreError::DeleteFailed(other.to_string()),
        })
    }

    async fn head(&self, path: &StoragePath) -> Result<u64, ArtifactStoreError> {
        let store_path = StorePath::from(path.as_str());
        let meta = self
            .inner
            .head(&store_path)
            .await
            .map_err(|e| ArtifactStoreError::NotFound(e.to_string()))?;
        Ok(meta.size as u64)
    }

    async fn list(&self) -> Result<Vec<(StoragePath, DateTime<Utc>)>, ArtifactStoreError> {
        let mut entries = Vec::new();
        let mut stream = self.inner.list(None);
        while let Some(meta) = stream.next().await {
            let meta = meta.map_err(|e| ArtifactStoreError::ReadFailed(e.to_string()))?;
            entries.push((
                StoragePath::from_raw(meta.location.as_ref()),
                meta.last_modified,
            ));
        }
        Ok(entries)
    }
}
