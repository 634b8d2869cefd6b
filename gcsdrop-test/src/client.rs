//! Client for interacting with a gcsdrop server

use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{header, Client};

const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Client for interacting with gcsdrop
pub struct GcsDropClient {
    base_url: String,
    client: Client,
}

/// A completed download request
#[derive(Debug)]
pub struct Download {
    pub status: u16,
    pub content_disposition: Option<String>,
    pub content_type: Option<String>,
    pub request_id: Option<String>,
    pub body: Bytes,
}

impl Download {
    /// Body as UTF-8 text
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl GcsDropClient {
    /// Create a new client
    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self { base_url, client }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Download an object; `filename` is percent-encoded into a single path segment
    pub async fn download(&self, filename: &str) -> Result<Download, ClientError> {
        let url = format!(
            "{}/download/{}",
            self.base_url,
            utf8_percent_encode(filename, PATH_SEGMENT)
        );
        self.get_raw(&url).await
    }

    /// GET an arbitrary URL and capture the parts tests look at
    pub async fn get_raw(&self, url: &str) -> Result<Download, ClientError> {
        let response = self.client.get(url).send().await?;

        let header_value = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let status = response.status().as_u16();
        let content_disposition = header_value(header::CONTENT_DISPOSITION.as_str());
        let content_type = header_value(header::CONTENT_TYPE.as_str());
        let request_id = header_value("x-request-id");

        Ok(Download {
            status,
            content_disposition,
            content_type,
            request_id,
            body: response.bytes().await?,
        })
    }

    /// Fetch the health document
    pub async fn health(&self) -> Result<serde_json::Value, ClientError> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ClientError::ParseError(e.to_string()))
    }
}

/// Client errors
#[derive(Debug)]
pub enum ClientError {
    RequestError(reqwest::Error),
    ParseError(String),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::RequestError(e) => write!(f, "Request error: {}", e),
            ClientError::ParseError(e) => write!(f, "Parse error: {}", e),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::RequestError(e)
    }
}
