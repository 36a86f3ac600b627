//! Artifact storage for downloaded recordings
//!
//! Wraps the object_store crate: local filesystem in production, in-memory
//! for tests. Keys are content-addressed by recording id, and `exists` is
//! the idempotence primitive the fetcher relies on.

use bytes::Bytes;
use object_store::{ObjectStore, path::Path as StoragePath};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Object store error: {0}")]
    ObjectStoreError(#[from] object_store::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Metadata returned after upload
#[derive(Debug, Clone)]
pub struct UploadMetadata {
    pub key: String,
    pub size: usize,
}

/// Storage client wrapping object_store
#[derive(Clone)]
pub struct StorageClient {
    store: Arc<dyn ObjectStore>,
    pub label: String,
}

impl StorageClient {
    /// Create a storage client with any object_store backend
    pub fn new(store: Arc<dyn ObjectStore>, label: String) -> Self {
        Self { store, label }
    }

    /// Local-filesystem storage rooted at the given directory
    pub fn local(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        let store = object_store::local::LocalFileSystem::new_with_prefix(root)?;
        Ok(Self {
            store: Arc::new(store),
            label: root.display().to_string(),
        })
    }

    /// In-memory storage for testing/development
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(object_store::memory::InMemory::new()),
            label: "memory".to_string(),
        }
    }

    /// Upload bytes to storage
    pub async fn upload(&self, key: &str, data: Bytes) -> Result<UploadMetadata> {
        let path = StoragePath::from(key);
        let size = data.len();

        self.store.put(&path, data.into()).await?;

        tracing::info!(key, size, "Uploaded to storage");

        Ok(UploadMetadata {
            key: key.to_string(),
            size,
        })
    }

    /// Download from storage
    pub async fn download(&self, key: &str) -> Result<Vec<u8>> {
        let path = StoragePath::from(key);

        let result = self.store.get(&path).await?;
        let bytes = result.bytes().await?;

        Ok(bytes.to_vec())
    }

    /// Check if key exists
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let path = StoragePath::from(key);

        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove an object; missing keys are not an error
    pub async fn delete(&self, key: &str) -> Result<()> {
        let path = StoragePath::from(key);

        match self.store.delete(&path).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_exists_download_roundtrip() {
        let storage = StorageClient::in_memory();

        assert!(!storage.exists("recordings/audio_only/rec-1.m4a").await.unwrap());

        storage
            .upload("recordings/audio_only/rec-1.m4a", Bytes::from_static(b"audio"))
            .await
            .unwrap();

        assert!(storage.exists("recordings/audio_only/rec-1.m4a").await.unwrap());
        let data = storage.download("recordings/audio_only/rec-1.m4a").await.unwrap();
        assert_eq!(data, b"audio");
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let storage = StorageClient::in_memory();

        storage
            .upload("recordings/chat_file/rec-2.txt", Bytes::from_static(b"chat"))
            .await
            .unwrap();

        storage.delete("recordings/chat_file/rec-2.txt").await.unwrap();
        assert!(!storage.exists("recordings/chat_file/rec-2.txt").await.unwrap());

        // Second delete of a missing key is fine
        storage.delete("recordings/chat_file/rec-2.txt").await.unwrap();
    }
}
