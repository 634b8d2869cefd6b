//! Existence check followed by stream open

use super::traits::{ObjectStore, ObjectStream, StorageError};
use std::fmt;
use tracing::debug;

/// Outcome of locating an object. Backend failures are the `Err` side.
pub enum Lookup {
    Found(ObjectStream),
    NotFound,
}

impl fmt::Debug for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found(_) => f.write_str("Found(..)"),
            Self::NotFound => f.write_str("NotFound"),
        }
    }
}

/// Check that `key` exists, then open it.
///
/// The stream is only opened once existence is confirmed. An object deleted
/// between the two calls is reported as `NotFound`.
pub async fn locate(store: &dyn ObjectStore, key: &str) -> Result<Lookup, StorageError> {
    if !store.exists(key).await? {
        return Ok(Lookup::NotFound);
    }

    match store.open(key).await {
        Ok(stream) => Ok(Lookup::Found(stream)),
        Err(StorageError::ObjectNotFound { .. }) => {
            debug!(bucket = %store.bucket(), key = %key, "Object vanished after existence check");
            Ok(Lookup::NotFound)
        }
        Err(e) => Err(e),
    }
}
