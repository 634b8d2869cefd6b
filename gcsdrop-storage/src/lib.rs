//! Object storage for gcsdrop
//!
//! This crate provides the bucket abstraction ([`storage::ObjectStore`]), a
//! Cloud Storage backend, an in-memory backend and the download handler that
//! streams objects to HTTP clients.

pub mod disposition;
pub mod handlers;
pub mod storage;

pub use handlers::DownloadState;
pub use storage::{EphemeralStore, GcsStore, ObjectStore, StorageError, TokenSource};
