use std::{fmt, path::PathBuf};

#[derive(Debug)]
pub enum PublishError {
    MissingArtifact(PathBuf),
    CredentialResolutionFailed(String),
    TargetKeyInvalid(String),
    RemoteCheckFailed(StorageError),
    AlreadyPublished(String),
    UploadFailed(StorageError),
    DeleteFailed(StorageError),
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::MissingArtifact(path) => write!(
                f,
                "Cannot publish because {} missing: run `binary-publish package` first",
                path.display()
            ),
            PublishError::CredentialResolutionFailed(message) => {
                write!(f, "Could not resolve storage credentials, {message}")
            }
            PublishError::TargetKeyInvalid(message) => {
                write!(f, "Could not resolve the remote key, {message}")
            }
            PublishError::RemoteCheckFailed(error) => {
                write!(f, "Checking for an existing binary failed, {error}")
            }
            PublishError::AlreadyPublished(url) => write!(
                f,
                "Failed publishing to {url}: cannot publish over existing version. \
                Update the `version` in the project config and try again. \
                If the previous version was published in error, run `binary-publish unpublish`."
            ),
            PublishError::UploadFailed(error) => write!(f, "Putting object failed, {error}"),
            PublishError::DeleteFailed(error) => write!(f, "Deleting object failed, {error}"),
        }
    }
}

impl std::error::Error for PublishError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PublishError::RemoteCheckFailed(error)
            | PublishError::UploadFailed(error)
            | PublishError::DeleteFailed(error) => Some(error),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum StorageError {
    NotFound,
    Service { code: String, message: String },
    Transport(String),
    Io(std::io::Error),
    ArtifactStream(aws_sdk_s3::primitives::ByteStreamError),
}

impl StorageError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound)
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotFound => write!(f, "Not Found"),
            StorageError::Service { code, message } => write!(f, "{code}: {message}"),
            StorageError::Transport(message) => write!(f, "{message}"),
            StorageError::Io(error) => write!(f, "{error}"),
            StorageError::ArtifactStream(error) => {
                write!(f, "could not stream artifact, {error}")
            }
        }
    }
}

impl std::error::Error for StorageError {}

impl<T: std::error::Error + aws_sdk_s3::error::ProvideErrorMetadata> From<T> for StorageError {
    fn from(value: T) -> Self {
        match value.code() {
            Some(code) => match code {
                "NotFound" | "NoSuchKey" => StorageError::NotFound,
                _ => StorageError::Service {
                    code: code.to_string(),
                    message: value.message().map_or("(no message)".into(), String::from),
                },
            },
            _ => StorageError::Transport(format!(
                "{}",
                aws_smithy_types::error::display::DisplayErrorContext(value)
            )),
        }
    }
}
