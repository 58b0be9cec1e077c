mod errors;
mod local;
mod s3;
mod store;
mod target;

use std::{
    fmt,
    future::Future,
    path::{Path, PathBuf},
};

use libherokubuildpack::log::log_info;

pub use crate::errors::{PublishError, StorageError};
pub use crate::local::LocalStore;
pub use crate::s3::{CredentialSource, S3Settings, S3Store};
pub use crate::store::{ObjectLocation, ObjectStore, RemoteObjectMeta};
pub use crate::target::{public_url, resolve_key};

/// Everything one publish or unpublish invocation needs, fixed up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    pub package_name: String,
    pub artifact_path: PathBuf,
    pub package_file: String,
    pub prefix: String,
    pub bucket: String,
    pub acl: String,
    pub endpoint: Option<String>,
}

impl PublishRequest {
    fn location(&self) -> Result<ObjectLocation, PublishError> {
        Ok(ObjectLocation {
            bucket: self.bucket.clone(),
            key: resolve_key(&self.prefix, &self.package_file)?,
        })
    }

    fn public_url(&self, location: &ObjectLocation) -> String {
        public_url(&location.bucket, &location.key, self.endpoint.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub package_name: String,
    pub url: String,
}

impl fmt::Display for Published {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] published to {}", self.package_name, self.url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unpublished {
    Removed(String),
    NotFound(String),
}

impl fmt::Display for Unpublished {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unpublished::Removed(url) => write!(f, "Success: removed {url}"),
            Unpublished::NotFound(url) => write!(f, "Not found: {url}"),
        }
    }
}

/// How to reach storage: S3 (or an S3-compatible endpoint), or a local mock directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageSettings {
    S3(S3Settings),
    Mock(PathBuf),
}

pub enum Storage {
    S3(S3Store),
    Local(LocalStore),
}

impl Storage {
    pub async fn connect(settings: &StorageSettings) -> Result<Storage, PublishError> {
        match settings {
            StorageSettings::S3(s3_settings) => {
                log_info("Detecting S3 credentials");
                Ok(Storage::S3(S3Store::connect(s3_settings).await?))
            }
            StorageSettings::Mock(root) => {
                log_info(format!("Using mock S3 storage at {}", root.display()));
                Ok(Storage::Local(LocalStore::new(root)))
            }
        }
    }
}

impl ObjectStore for Storage {
    async fn head(
        &self,
        location: &ObjectLocation,
    ) -> Result<Option<RemoteObjectMeta>, StorageError> {
        match self {
            Storage::S3(store) => store.head(location).await,
            Storage::Local(store) => store.head(location).await,
        }
    }

    async fn put(
        &self,
        location: &ObjectLocation,
        source: &Path,
        acl: &str,
    ) -> Result<(), StorageError> {
        match self {
            Storage::S3(store) => store.put(location, source, acl).await,
            Storage::Local(store) => store.put(location, source, acl).await,
        }
    }

    async fn delete(&self, location: &ObjectLocation) -> Result<(), StorageError> {
        match self {
            Storage::S3(store) => store.delete(location).await,
            Storage::Local(store) => store.delete(location).await,
        }
    }
}

/// Uploads the staged artifact unless the target key already holds an object.
///
/// Steps run strictly in order: local artifact check, `connect` (credential
/// resolution), key resolution, head-check, upload. The head-check and the
/// upload are separate calls, so two publishers racing on one key can both
/// pass the check; the last upload wins.
pub async fn publish<S, F, Fut>(
    request: &PublishRequest,
    connect: F,
) -> Result<Published, PublishError>
where
    S: ObjectStore,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<S, PublishError>>,
{
    if !request.artifact_path.is_file() {
        return Err(PublishError::MissingArtifact(request.artifact_path.clone()));
    }

    let store = connect().await?;
    let location = request.location()?;
    let url = request.public_url(&location);

    log_info(format!("Checking for existing binary at {url}"));
    match store.head(&location).await {
        Ok(None) => {
            log_info("No existing binary, preparing to put object");
        }
        Ok(Some(meta)) => {
            log_info(format!("Found existing object, {meta}"));
            return Err(PublishError::AlreadyPublished(url));
        }
        Err(error) => {
            log_info(format!("Head-check error: \"{error}\""));
            return Err(PublishError::RemoteCheckFailed(error));
        }
    }

    log_info(format!(
        "Putting object {location} (acl: {})",
        request.acl
    ));
    store
        .put(&location, &request.artifact_path, &request.acl)
        .await
        .map_err(|error| {
            log_info(format!("Put-object error: \"{error}\""));
            PublishError::UploadFailed(error)
        })?;
    log_info("Successfully put object");

    Ok(Published {
        package_name: request.package_name.clone(),
        url,
    })
}

/// Removes a previously published artifact. An absent key is not an error.
pub async fn unpublish<S, F, Fut>(
    request: &PublishRequest,
    connect: F,
) -> Result<Unpublished, PublishError>
where
    S: ObjectStore,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<S, PublishError>>,
{
    let store = connect().await?;
    let location = request.location()?;
    let url = request.public_url(&location);

    log_info(format!("Checking for existing binary at {url}"));
    if store
        .head(&location)
        .await
        .map_err(PublishError::RemoteCheckFailed)?
        .is_none()
    {
        return Ok(Unpublished::NotFound(url));
    }

    log_info(format!("Deleting object {location}"));
    store
        .delete(&location)
        .await
        .map_err(PublishError::DeleteFailed)?;
    Ok(Unpublished::Removed(url))
}

#[cfg(test)]
mod tests {
    use std::{
        cell::{Cell, RefCell},
        fs,
        path::{Path, PathBuf},
    };

    use tokio::sync::Barrier;

    use crate::{
        publish, unpublish, ObjectLocation, ObjectStore, PublishError, PublishRequest,
        RemoteObjectMeta, StorageError, Unpublished,
    };

    const URL: &str = "https://my-bucket.s3.amazonaws.com/pkg/v1/addon.tar.gz";

    enum Head {
        Absent,
        Present,
        Fails,
    }

    struct FakeStore {
        head: Head,
        put_fails: bool,
        stored: Cell<bool>,
        head_barrier: Option<Barrier>,
        heads: Cell<u32>,
        puts: RefCell<Vec<(ObjectLocation, String)>>,
        deletes: Cell<u32>,
    }

    impl FakeStore {
        fn new(head: Head) -> Self {
            FakeStore {
                head,
                put_fails: false,
                stored: Cell::new(false),
                head_barrier: None,
                heads: Cell::new(0),
                puts: RefCell::new(vec![]),
                deletes: Cell::new(0),
            }
        }

        fn failing_put() -> Self {
            FakeStore {
                put_fails: true,
                ..FakeStore::new(Head::Absent)
            }
        }

        // Holds every head-check until `publishers` of them are in flight.
        fn with_head_barrier(publishers: usize) -> Self {
            FakeStore {
                head_barrier: Some(Barrier::new(publishers)),
                ..FakeStore::new(Head::Absent)
            }
        }
    }

    impl ObjectStore for &FakeStore {
        async fn head(
            &self,
            _location: &ObjectLocation,
        ) -> Result<Option<RemoteObjectMeta>, StorageError> {
            self.heads.set(self.heads.get() + 1);
            let result = match self.head {
                Head::Absent if !self.stored.get() => Ok(None),
                Head::Absent | Head::Present => Ok(Some(RemoteObjectMeta {
                    content_length: Some(10),
                    ..RemoteObjectMeta::default()
                })),
                Head::Fails => Err(StorageError::Service {
                    code: "AccessDenied".to_string(),
                    message: "Access Denied".to_string(),
                }),
            };
            if let Some(barrier) = &self.head_barrier {
                barrier.wait().await;
            }
            result
        }

        async fn put(
            &self,
            location: &ObjectLocation,
            _source: &Path,
            acl: &str,
        ) -> Result<(), StorageError> {
            self.puts
                .borrow_mut()
                .push((location.clone(), acl.to_string()));
            if self.put_fails {
                Err(StorageError::Transport("connection reset".to_string()))
            } else {
                self.stored.set(true);
                Ok(())
            }
        }

        async fn delete(&self, _location: &ObjectLocation) -> Result<(), StorageError> {
            self.deletes.set(self.deletes.get() + 1);
            Ok(())
        }
    }

    fn staged_artifact(dir: &Path) -> PathBuf {
        let path = dir.join("addon.tar.gz");
        fs::write(&path, b"tarball bytes").unwrap();
        path
    }

    fn request(artifact_path: PathBuf) -> PublishRequest {
        PublishRequest {
            package_name: "addon".to_string(),
            artifact_path,
            package_file: "addon.tar.gz".to_string(),
            prefix: "pkg/v1/".to_string(),
            bucket: "my-bucket".to_string(),
            acl: "public-read".to_string(),
            endpoint: None,
        }
    }

    #[tokio::test]
    async fn missing_artifact_makes_no_remote_calls() {
        let store = FakeStore::new(Head::Absent);
        let connects = Cell::new(0);
        let result = publish(&request(PathBuf::from("non-existent-path")), || async {
            connects.set(connects.get() + 1);
            Ok(&store)
        })
        .await;

        assert!(matches!(result, Err(PublishError::MissingArtifact(p)) if p == Path::new("non-existent-path")));
        assert_eq!(connects.get(), 0);
        assert_eq!(store.heads.get(), 0);
        assert!(store.puts.borrow().is_empty());
    }

    #[tokio::test]
    async fn existing_object_is_a_conflict_and_never_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let store = FakeStore::new(Head::Present);
        let result = publish(&request(staged_artifact(dir.path())), || async { Ok(&store) }).await;

        match result {
            Err(PublishError::AlreadyPublished(url)) => assert_eq!(url, URL),
            other => panic!("unexpected result {other:?}"),
        }
        assert_eq!(store.heads.get(), 1);
        assert!(store.puts.borrow().is_empty());
    }

    #[tokio::test]
    async fn not_found_uploads_once_to_the_resolved_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FakeStore::new(Head::Absent);
        let published = publish(&request(staged_artifact(dir.path())), || async { Ok(&store) })
            .await
            .unwrap();

        assert_eq!(
            *store.puts.borrow(),
            vec![(
                ObjectLocation {
                    bucket: "my-bucket".to_string(),
                    key: "pkg/v1/addon.tar.gz".to_string(),
                },
                "public-read".to_string()
            )]
        );
        assert_eq!(published.url, URL);
        assert_eq!(
            published.to_string(),
            format!("[addon] published to {URL}")
        );
    }

    #[tokio::test]
    async fn upload_failure_is_propagated() {
        let dir = tempfile::tempdir().unwrap();
        let store = FakeStore::failing_put();
        let result = publish(&request(staged_artifact(dir.path())), || async { Ok(&store) }).await;

        match result {
            Err(PublishError::UploadFailed(StorageError::Transport(message))) => {
                assert_eq!(message, "connection reset");
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert_eq!(store.puts.borrow().len(), 1);
    }

    #[tokio::test]
    async fn other_head_errors_pass_through_without_upload() {
        let dir = tempfile::tempdir().unwrap();
        let store = FakeStore::new(Head::Fails);
        let result = publish(&request(staged_artifact(dir.path())), || async { Ok(&store) }).await;

        match result {
            Err(PublishError::RemoteCheckFailed(StorageError::Service { code, .. })) => {
                assert_eq!(code, "AccessDenied");
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert!(store.puts.borrow().is_empty());
    }

    #[tokio::test]
    async fn credential_failure_stops_before_head_check() {
        let dir = tempfile::tempdir().unwrap();
        let store = FakeStore::new(Head::Absent);
        let result = publish(&request(staged_artifact(dir.path())), || async {
            Err::<&FakeStore, _>(PublishError::CredentialResolutionFailed(
                "no credentials".to_string(),
            ))
        })
        .await;

        assert!(matches!(
            result,
            Err(PublishError::CredentialResolutionFailed(_))
        ));
        assert_eq!(store.heads.get(), 0);
    }

    #[tokio::test]
    async fn invalid_package_file_is_rejected_before_head_check() {
        let dir = tempfile::tempdir().unwrap();
        let store = FakeStore::new(Head::Absent);
        let mut invalid = request(staged_artifact(dir.path()));
        invalid.package_file = "nested/".to_string();
        let result = publish(&invalid, || async { Ok(&store) }).await;

        assert!(matches!(result, Err(PublishError::TargetKeyInvalid(_))));
        assert_eq!(store.heads.get(), 0);
    }

    #[tokio::test]
    async fn second_publish_of_same_key_is_already_published() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = staged_artifact(dir.path());
        let store = FakeStore::new(Head::Absent);

        let first = publish(&request(artifact.clone()), || async { Ok(&store) }).await;
        let second = publish(&request(artifact), || async { Ok(&store) }).await;

        assert!(first.is_ok());
        assert!(matches!(second, Err(PublishError::AlreadyPublished(url)) if url == URL));
        assert_eq!(store.puts.borrow().len(), 1);
    }

    // Head-check and put are separate calls: two publishers whose head-checks
    // both finish before either put both upload, and the last one wins.
    #[tokio::test]
    async fn check_then_put_race_is_not_guarded() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = staged_artifact(dir.path());
        let store = FakeStore::with_head_barrier(2);
        let first_request = request(artifact.clone());
        let second_request = request(artifact);

        let (first, second) = tokio::join!(
            publish(&first_request, || async { Ok(&store) }),
            publish(&second_request, || async { Ok(&store) }),
        );

        assert!(first.is_ok());
        assert!(second.is_ok());
        assert_eq!(store.heads.get(), 2);
        assert_eq!(store.puts.borrow().len(), 2);
    }

    #[tokio::test]
    async fn unpublish_absent_key_deletes_nothing() {
        let store = FakeStore::new(Head::Absent);
        let result = unpublish(&request(PathBuf::from("non-existent-path")), || async {
            Ok(&store)
        })
        .await
        .unwrap();

        assert_eq!(result, Unpublished::NotFound(URL.to_string()));
        assert_eq!(store.deletes.get(), 0);
    }

    #[tokio::test]
    async fn unpublish_present_key_deletes_once() {
        let store = FakeStore::new(Head::Present);
        let result = unpublish(&request(PathBuf::from("non-existent-path")), || async {
            Ok(&store)
        })
        .await
        .unwrap();

        assert_eq!(result, Unpublished::Removed(URL.to_string()));
        assert_eq!(store.deletes.get(), 1);
    }

    #[tokio::test]
    async fn unpublish_passes_through_head_errors() {
        let store = FakeStore::new(Head::Fails);
        let result = unpublish(&request(PathBuf::from("non-existent-path")), || async {
            Ok(&store)
        })
        .await;

        assert!(matches!(result, Err(PublishError::RemoteCheckFailed(_))));
        assert_eq!(store.deletes.get(), 0);
    }
}
