//! Core types for gcsdrop
//!
//! This crate provides the error taxonomy and request identifiers shared by
//! the storage layer and the server binary.

pub mod error;
pub mod request_id;

pub use error::{DownloadError, ErrorCode, BACKEND_ERROR_BODY, NOT_FOUND_BODY};
pub use request_id::{RequestId, REQUEST_ID_HEADER};
