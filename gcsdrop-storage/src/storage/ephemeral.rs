//! In-memory ephemeral storage backend

use super::traits::{ensure_bucket, ObjectStore, ObjectStream, StorageError};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use futures::stream::{self, StreamExt};

/// Default size of the chunks an object is emitted in
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Ephemeral (in-memory) storage backend for a single bucket
pub struct EphemeralStore {
    bucket: String,
    objects: DashMap<String, Bytes>,
    chunk_size: usize,
}

impl EphemeralStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self::with_chunk_size(bucket, DEFAULT_CHUNK_SIZE)
    }

    /// Create a store that streams objects in chunks of `chunk_size` bytes
    pub fn with_chunk_size(bucket: impl Into<String>, chunk_size: usize) -> Self {
        Self {
            bucket: bucket.into(),
            objects: DashMap::new(),
            chunk_size: chunk_size.max(1),
        }
    }

    /// Store an object, replacing any previous content
    pub fn put(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        self.objects.insert(key.into(), data.into());
    }

    /// Remove an object, returning whether it was present
    pub fn remove(&self, key: &str) -> bool {
        self.objects.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn chunks(data: &Bytes, chunk_size: usize) -> Vec<Bytes> {
        let mut chunks = Vec::with_capacity(data.len() / chunk_size + 1);
        let mut offset = 0;
        while offset < data.len() {
            let end = (offset + chunk_size).min(data.len());
            chunks.push(data.slice(offset..end));
            offset = end;
        }
        chunks
    }
}

#[async_trait]
impl ObjectStore for EphemeralStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        ensure_bucket(&self.bucket)?;
        Ok(self.objects.contains_key(key))
    }

    async fn open(&self, key: &str) -> Result<ObjectStream, StorageError> {
        ensure_bucket(&self.bucket)?;

        // Clone out of the map so no shard lock is held while streaming
        let data = self
            .objects
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StorageError::ObjectNotFound {
                bucket: self.bucket.clone(),
                key: key.to_string(),
            })?;

        let chunks = Self::chunks(&data, self.chunk_size);
        Ok(stream::iter(chunks.into_iter().map(Ok)).boxed())
    }
}
