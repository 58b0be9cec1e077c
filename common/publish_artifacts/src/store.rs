use std::{fmt, path::Path};

use crate::errors::StorageError;

/// A bucket and key pair addressing one remote object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Metadata returned by a head-check. Its presence means the key holds an object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteObjectMeta {
    pub content_length: Option<i64>,
    pub e_tag: Option<String>,
    pub last_modified: Option<String>,
}

impl fmt::Display for RemoteObjectMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "content-length: {}, etag: {}, last-modified: {}",
            self.content_length
                .map_or("unknown".to_string(), |l| l.to_string()),
            self.e_tag.as_deref().unwrap_or("unknown"),
            self.last_modified.as_deref().unwrap_or("unknown"),
        )
    }
}

/// The three object-storage calls publishing needs.
///
/// `head` returns `Ok(None)` for a key that holds nothing; every other
/// failure comes back as an error. `put` must stream `source` rather than
/// read it into memory.
#[allow(async_fn_in_trait)]
pub trait ObjectStore {
    async fn head(&self, location: &ObjectLocation)
        -> Result<Option<RemoteObjectMeta>, StorageError>;

    async fn put(
        &self,
        location: &ObjectLocation,
        source: &Path,
        acl: &str,
    ) -> Result<(), StorageError>;

    async fn delete(&self, location: &ObjectLocation) -> Result<(), StorageError>;
}
