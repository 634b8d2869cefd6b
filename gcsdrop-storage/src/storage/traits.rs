//! Storage backend traits

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use gcsdrop_core::ErrorCode;
use thiserror::Error;

/// Errors from storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {bucket}/{key}")]
    ObjectNotFound { bucket: String, key: String },

    #[error("Invalid bucket name: {0:?}")]
    InvalidBucketName(String),

    #[error("Access denied to {bucket}/{key} (HTTP {status})")]
    AccessDenied {
        bucket: String,
        key: String,
        status: u16,
    },

    #[error("Could not obtain access token: {0}")]
    Auth(String),

    #[error("Storage backend returned HTTP {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StorageError {
    /// Client-facing classification of this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ObjectNotFound { .. } => ErrorCode::FileNotFound,
            Self::InvalidBucketName(_) => ErrorCode::InvalidBucketName,
            Self::AccessDenied { .. } => ErrorCode::AccessDenied,
            Self::Auth(_) => ErrorCode::AuthenticationFailed,
            Self::Backend { .. } | Self::Transport(_) => ErrorCode::BackendUnavailable,
            Self::Internal(_) => ErrorCode::InternalError,
        }
    }
}

/// Lazily produced object content. Dropping it releases the upstream read.
pub type ObjectStream = BoxStream<'static, Result<Bytes, StorageError>>;

/// A single bucket, addressed by object key
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Name of the bucket this store reads from
    fn bucket(&self) -> &str;

    /// Short backend identifier (`gcs`, `memory`)
    fn backend(&self) -> &'static str;

    /// Check whether an object exists
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Open a read stream over an object's bytes
    async fn open(&self, key: &str) -> Result<ObjectStream, StorageError>;
}

/// Reject the empty bucket name before touching the backend.
pub(crate) fn ensure_bucket(bucket: &str) -> Result<(), StorageError> {
    if bucket.is_empty() {
        return Err(StorageError::InvalidBucketName(bucket.to_string()));
    }
    Ok(())
}
