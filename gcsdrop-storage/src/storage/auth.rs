//! Access tokens for outbound Cloud Storage requests

use super::traits::StorageError;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::Deserialize;
use std::fmt;
use tokio::sync::Mutex;
use tracing::debug;

/// Default metadata server host on Cloud Run and GCE
pub const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";

const TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

/// Tokens are refreshed this long before the server-reported expiry
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Where the bearer token for storage requests comes from
pub enum TokenSource {
    /// No `Authorization` header (emulators, public buckets)
    Anonymous,
    /// A fixed bearer token
    Static(String),
    /// The instance metadata server's default service account
    MetadataServer(MetadataServer),
}

impl TokenSource {
    pub fn metadata_server(host: impl Into<String>) -> Self {
        Self::MetadataServer(MetadataServer::new(host))
    }

    /// Current bearer token, if this source provides one
    pub async fn token(&self, client: &reqwest::Client) -> Result<Option<String>, StorageError> {
        match self {
            Self::Anonymous => Ok(None),
            Self::Static(token) => Ok(Some(token.clone())),
            Self::MetadataServer(server) => server.token(client).await.map(Some),
        }
    }
}

impl fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str("Anonymous"),
            Self::Static(_) => f.write_str("Static(<redacted>)"),
            Self::MetadataServer(server) => f
                .debug_tuple("MetadataServer")
                .field(&server.host)
                .finish(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    #[serde(default)]
    token_type: String,
}

struct CachedToken {
    access_token: String,
    refresh_at: DateTime<Utc>,
}

/// Token fetched from the metadata server and cached until shortly before expiry
pub struct MetadataServer {
    host: String,
    cached: RwLock<Option<CachedToken>>,
    /// Held while a fetch is in flight so concurrent callers wait for it
    refresh: Mutex<()>,
}

impl MetadataServer {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            cached: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn cached_token(&self) -> Option<String> {
        self.cached
            .read()
            .as_ref()
            .filter(|cached| Utc::now() < cached.refresh_at)
            .map(|cached| cached.access_token.clone())
    }

    async fn token(&self, client: &reqwest::Client) -> Result<String, StorageError> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        let _refresh = self.refresh.lock().await;
        // Another caller may have refreshed while this one waited
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        let fetched = self.fetch(client).await?;
        let refresh_at =
            Utc::now() + Duration::seconds(fetched.expires_in - EXPIRY_MARGIN_SECS);
        debug!(
            host = %self.host,
            token_type = %fetched.token_type,
            expires_in = fetched.expires_in,
            "Fetched access token from metadata server"
        );

        let token = fetched.access_token;
        *self.cached.write() = Some(CachedToken {
            access_token: token.clone(),
            refresh_at,
        });
        Ok(token)
    }

    async fn fetch(&self, client: &reqwest::Client) -> Result<TokenResponse, StorageError> {
        let url = format!("http://{}{}", self.host, TOKEN_PATH);

        let response = client
            .get(&url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| StorageError::Auth(format!("metadata server unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Auth(format!(
                "metadata server returned HTTP {}",
                status.as_u16()
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| StorageError::Auth(format!("malformed token response: {}", e)))
    }
}
