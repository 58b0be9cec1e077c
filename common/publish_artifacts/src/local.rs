use std::path::{Path, PathBuf};

use tokio::fs::{self, File};

use crate::{
    errors::StorageError,
    store::{ObjectLocation, ObjectStore, RemoteObjectMeta},
};

/// Object store backed by a local directory, laid out as `{root}/{bucket}/{key}`.
///
/// Stands in for S3 in offline runs. The ACL is accepted and ignored.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalStore { root: root.into() }
    }

    fn object_path(&self, location: &ObjectLocation) -> PathBuf {
        self.root.join(&location.bucket).join(&location.key)
    }
}

impl ObjectStore for LocalStore {
    async fn head(
        &self,
        location: &ObjectLocation,
    ) -> Result<Option<RemoteObjectMeta>, StorageError> {
        match fs::metadata(self.object_path(location)).await {
            Ok(metadata) if metadata.is_file() => Ok(Some(RemoteObjectMeta {
                content_length: i64::try_from(metadata.len()).ok(),
                e_tag: None,
                last_modified: None,
            })),
            Ok(_) => Ok(None),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(StorageError::Io(error)),
        }
    }

    async fn put(
        &self,
        location: &ObjectLocation,
        source: &Path,
        _acl: &str,
    ) -> Result<(), StorageError> {
        let destination = self.object_path(location);
        let mut reader = File::open(source).await.map_err(StorageError::Io)?;
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await.map_err(StorageError::Io)?;
        }
        let mut writer = File::create(&destination)
            .await
            .map_err(StorageError::Io)?;
        tokio::io::copy(&mut reader, &mut writer)
            .await
            .map_err(StorageError::Io)?;
        Ok(())
    }

    async fn delete(&self, location: &ObjectLocation) -> Result<(), StorageError> {
        fs::remove_file(self.object_path(location))
            .await
            .map_err(|error| {
                if error.kind() == std::io::ErrorKind::NotFound {
                    StorageError::NotFound
                } else {
                    StorageError::Io(error)
                }
            })
    }
}
