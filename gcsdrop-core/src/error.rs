//! Download error types and their client-facing rendering

use std::fmt;
use thiserror::Error;

/// Body returned when the requested object does not exist.
pub const NOT_FOUND_BODY: &str = "Arquivo não encontrado";

/// Body returned for any failure of the storage backend.
pub const BACKEND_ERROR_BODY: &str = "Erro ao acessar o armazenamento";

/// Error codes surfaced by the download path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// The object is absent from the bucket.
    FileNotFound,
    /// The configured bucket name is empty or rejected by the backend.
    InvalidBucketName,
    /// The backend refused the service's credentials.
    AccessDenied,
    /// Access token could not be obtained.
    AuthenticationFailed,
    /// The backend answered with an unexpected status or could not be reached.
    BackendUnavailable,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FileNotFound => "FileNotFound",
            Self::InvalidBucketName => "InvalidBucketName",
            Self::AccessDenied => "AccessDenied",
            Self::AuthenticationFailed => "AuthenticationFailed",
            Self::BackendUnavailable => "BackendUnavailable",
            Self::InternalError => "InternalError",
        }
    }

    /// Status code sent to the client.
    ///
    /// Every backend failure collapses to 500: callers never learn whether the
    /// storage layer denied access or was simply unreachable.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::FileNotFound => 404,
            Self::InvalidBucketName
            | Self::AccessDenied
            | Self::AuthenticationFailed
            | Self::BackendUnavailable
            | Self::InternalError => 500,
        }
    }

    /// Plain-text body sent to the client.
    pub fn message(&self) -> &'static str {
        match self {
            Self::FileNotFound => NOT_FOUND_BODY,
            _ => BACKEND_ERROR_BODY,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::FileNotFound)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed download, carrying the internal detail for logs
#[derive(Debug, Error)]
#[error("{code}: {detail}")]
pub struct DownloadError {
    pub code: ErrorCode,
    /// Internal description. Logged, never sent to the client.
    pub detail: String,
    pub resource: Option<String>,
    pub request_id: Option<String>,
}

impl DownloadError {
    pub fn new(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
            resource: None,
            request_id: None,
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(ErrorCode::FileNotFound, "The specified object does not exist")
            .with_resource(resource)
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn status(&self) -> u16 {
        self.code.http_status()
    }

    /// The client-facing body
    pub fn body(&self) -> &'static str {
        self.code.message()
    }
}
