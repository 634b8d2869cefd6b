//! gcsdrop - Cloud Storage download server
//!
//! Serves `GET /download/:filename` by streaming the named object out of a
//! single configured bucket. The binary in `main.rs` wires configuration,
//! tracing and graceful shutdown around [`router::create_router`].

pub mod config;
pub mod router;

pub use config::{Args, Config, StorageBackend};
pub use router::{create_router, AppState};
