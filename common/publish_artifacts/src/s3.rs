use std::{fmt, path::Path};

use aws_config::{BehaviorVersion, Region};
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_sdk_s3::{
    config::Credentials,
    operation::head_object::HeadObjectError,
    primitives::ByteStream,
    types::ObjectCannedAcl,
    Client,
};
use libherokubuildpack::log::log_info;

use crate::{
    errors::{PublishError, StorageError},
    store::{ObjectLocation, ObjectStore, RemoteObjectMeta},
};

const CREDENTIALS_PROVIDER_NAME: &str = "binary-publish";

/// Where storage credentials come from.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Static {
        access_key_id: String,
        secret_access_key: String,
        session_token: Option<String>,
    },
    /// Environment, shared profile, then container or instance role.
    DefaultChain,
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Static { access_key_id, .. } => f
                .debug_struct("Static")
                .field("access_key_id", access_key_id)
                .field("secret_access_key", &"** redacted **")
                .finish_non_exhaustive(),
            CredentialSource::DefaultChain => write!(f, "DefaultChain"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Settings {
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub credentials: CredentialSource,
}

pub struct S3Store {
    client: Client,
}

impl S3Store {
    #[must_use]
    pub fn new(client: Client) -> Self {
        S3Store { client }
    }

    /// Builds a client from the settings and resolves credentials up front,
    /// so a missing credential fails here rather than at the first request.
    pub async fn connect(settings: &S3Settings) -> Result<S3Store, PublishError> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &settings.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let CredentialSource::Static {
            access_key_id,
            secret_access_key,
            session_token,
        } = &settings.credentials
        {
            log_info("Using access key from configuration");
            loader = loader.credentials_provider(Credentials::new(
                access_key_id,
                secret_access_key,
                session_token.clone(),
                None,
                CREDENTIALS_PROVIDER_NAME,
            ));
        } else {
            log_info("Using default AWS credential chain");
        }
        let sdk_config = loader.load().await;

        let provider: SharedCredentialsProvider =
            sdk_config.credentials_provider().ok_or_else(|| {
                PublishError::CredentialResolutionFailed(
                    "no credentials provider is configured".to_string(),
                )
            })?;
        provider
            .provide_credentials()
            .await
            .map_err(|e| PublishError::CredentialResolutionFailed(e.to_string()))?;
        if sdk_config.region().is_none() {
            return Err(PublishError::CredentialResolutionFailed(
                "no region is configured or detected".to_string(),
            ));
        }

        let mut s3_config = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &settings.endpoint {
            s3_config = s3_config.endpoint_url(endpoint).force_path_style(true);
        }
        Ok(S3Store::new(Client::from_conf(s3_config.build())))
    }
}

impl ObjectStore for S3Store {
    async fn head(
        &self,
        location: &ObjectLocation,
    ) -> Result<Option<RemoteObjectMeta>, StorageError> {
        let result = self
            .client
            .head_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .send()
            .await;
        match result {
            Ok(output) => Ok(Some(RemoteObjectMeta {
                content_length: output.content_length(),
                e_tag: output.e_tag().map(String::from),
                last_modified: output.last_modified().map(ToString::to_string),
            })),
            Err(error)
                if error
                    .as_service_error()
                    .is_some_and(HeadObjectError::is_not_found) =>
            {
                Ok(None)
            }
            Err(error) => match StorageError::from(error) {
                StorageError::NotFound => Ok(None),
                other => Err(other),
            },
        }
    }

    async fn put(
        &self,
        location: &ObjectLocation,
        source: &Path,
        acl: &str,
    ) -> Result<(), StorageError> {
        let body = ByteStream::from_path(source)
            .await
            .map_err(StorageError::ArtifactStream)?;
        self.client
            .put_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .acl(ObjectCannedAcl::from(acl))
            .body(body)
            .send()
            .await?;
        Ok(())
    }

    async fn delete(&self, location: &ObjectLocation) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .send()
            .await?;
        Ok(())
    }
}
