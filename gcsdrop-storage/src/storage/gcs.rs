//! Google Cloud Storage backend over the JSON API

use super::auth::TokenSource;
use super::traits::{ensure_bucket, ObjectStore, ObjectStream, StorageError};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

/// Production Cloud Storage endpoint
pub const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

/// Everything outside RFC 3986 `unreserved` is encoded, `/` included
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

const MISSING_BUCKET_MESSAGE: &str = "specified bucket does not exist";

/// `.` and `..` are not valid object names. In a URL path they are dot-segments
/// that resolve to the object listing or the bucket resource.
fn is_dot_segment(key: &str) -> bool {
    key == "." || key == ".."
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Cloud Storage backend bound to one bucket
pub struct GcsStore {
    bucket: String,
    endpoint: String,
    client: reqwest::Client,
    auth: TokenSource,
}

impl GcsStore {
    /// Create a store against the production endpoint
    pub fn new(bucket: impl Into<String>, auth: TokenSource) -> Self {
        Self::with_endpoint(bucket, DEFAULT_ENDPOINT, auth)
    }

    /// Create a store against a custom endpoint (emulators, tests)
    pub fn with_endpoint(
        bucket: impl Into<String>,
        endpoint: impl Into<String>,
        auth: TokenSource,
    ) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Self {
            bucket: bucket.into(),
            endpoint,
            client: reqwest::Client::new(),
            auth,
        }
    }

    /// Create an anonymous store for a `STORAGE_EMULATOR_HOST` value.
    ///
    /// The value may be `host:port` or a full URL.
    pub fn emulator(bucket: impl Into<String>, host: &str) -> Self {
        let endpoint = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{}", host)
        };
        Self::with_endpoint(bucket, endpoint, TokenSource::Anonymous)
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn auth(&self) -> &TokenSource {
        &self.auth
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}",
            self.endpoint,
            utf8_percent_encode(&self.bucket, PATH_SEGMENT),
            utf8_percent_encode(key, PATH_SEGMENT)
        )
    }

    async fn get(&self, key: &str, query: &[(&str, &str)]) -> Result<reqwest::Response, StorageError> {
        let mut request = self.client.get(self.object_url(key)).query(query);
        if let Some(token) = self.auth.token(&self.client).await? {
            request = request.bearer_auth(token);
        }
        Ok(request.send().await?)
    }

    /// Classify a non-success response
    async fn error_for(&self, key: &str, response: reqwest::Response) -> StorageError {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&text)
            .map(|envelope| envelope.error.message)
            .unwrap_or(text);

        match status {
            StatusCode::NOT_FOUND if message.to_lowercase().contains(MISSING_BUCKET_MESSAGE) => {
                StorageError::InvalidBucketName(self.bucket.clone())
            }
            StatusCode::NOT_FOUND => StorageError::ObjectNotFound {
                bucket: self.bucket.clone(),
                key: key.to_string(),
            },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StorageError::AccessDenied {
                bucket: self.bucket.clone(),
                key: key.to_string(),
                status: status.as_u16(),
            },
            _ => StorageError::Backend {
                status: status.as_u16(),
                message,
            },
        }
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn backend(&self) -> &'static str {
        "gcs"
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        ensure_bucket(&self.bucket)?;
        if is_dot_segment(key) {
            debug!(key = %key, "Rejected dot-segment key");
            return Ok(false);
        }

        let response = self.get(key, &[("fields", "name")]).await?;
        if response.status().is_success() {
            return Ok(true);
        }

        match self.error_for(key, response).await {
            StorageError::ObjectNotFound { .. } => Ok(false),
            e => Err(e),
        }
    }

    async fn open(&self, key: &str) -> Result<ObjectStream, StorageError> {
        ensure_bucket(&self.bucket)?;
        if is_dot_segment(key) {
            return Err(StorageError::ObjectNotFound {
                bucket: self.bucket.clone(),
                key: key.to_string(),
            });
        }

        let response = self.get(key, &[("alt", "media")]).await?;
        if !response.status().is_success() {
            return Err(self.error_for(key, response).await);
        }

        debug!(
            bucket = %self.bucket,
            key = %key,
            content_length = ?response.content_length(),
            "Opened object stream"
        );

        Ok(response.bytes_stream().map_err(StorageError::from).boxed())
    }
}
