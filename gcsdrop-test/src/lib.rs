//! Test utilities for gcsdrop
//!
//! Provides utilities for end-to-end testing:
//! - Start the server in-process on a random port, backed by a memory bucket
//! - Seed objects into that bucket
//! - Client helpers for downloading
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gcsdrop_test::TestServer;
//!
//! #[tokio::test]
//! async fn test_download() {
//!     let server = TestServer::start().await.unwrap();
//!     server.put("hello.txt", "hello");
//!
//!     let download = server.client().download("hello.txt").await.unwrap();
//!     assert_eq!(download.status, 200);
//! }
//! ```

pub mod client;
pub mod server;

pub use client::{ClientError, Download, GcsDropClient};
pub use server::{TestError, TestServer};

/// Bucket name used by [`TestServer::start`]
pub const DEFAULT_BUCKET: &str = "test-bucket";

/// Timeout for waiting on the server
pub const STARTUP_TIMEOUT_SECS: u64 = 10;
