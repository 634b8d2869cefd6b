//! Object storage backends

mod auth;
mod ephemeral;
mod gcs;
mod lookup;
mod traits;


pub use auth::{MetadataServer, TokenSource, DEFAULT_METADATA_HOST};
pub use ephemeral::{EphemeralStore, DEFAULT_CHUNK_SIZE};
pub use gcs::{GcsStore, DEFAULT_ENDPOINT};
pub use lookup::{locate, Lookup};
pub use traits::{ObjectStore, ObjectStream, StorageError};
