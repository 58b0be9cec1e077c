mod hosted;

use std::{
    collections::HashMap,
    env,
    fmt,
    path::{Path, PathBuf},
};

use libcnb::{read_toml_file, TomlFileError};
use libherokubuildpack::toml::toml_select_value;
use publish_artifacts::{CredentialSource, PublishRequest, S3Settings, StorageSettings};
use serde::Deserialize;

pub use crate::hosted::{detect_hosted_location, HostedLocation};

pub const DEFAULT_CONFIG_FILE: &str = "binary-publish.toml";
pub const ENV_PREFIX: &str = "BINARY_PUBLISH_";
pub const DEFAULT_ACL: &str = "public-read";
const DEFAULT_STAGING_DIR: &str = "build/stage";

#[derive(Deserialize, Eq, PartialEq, Debug, Default, Clone)]
pub struct PackageMetadata {
    pub name: Option<String>,
    pub version: Option<String>,
}

/// The `[binary]` table of the project config.
#[derive(Deserialize, Eq, PartialEq, Debug, Default, Clone)]
pub struct BinaryConfig {
    pub host: Option<String>,
    pub remote_path: Option<String>,
    pub package_name: Option<String>,
    pub staged_tarball: Option<PathBuf>,
    pub bucket: Option<String>,
    pub prefix: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub acl: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Default, Clone)]
pub struct PublishConfig {
    pub package: PackageMetadata,
    pub binary: BinaryConfig,
    /// Directory that relative paths in the config file are resolved against.
    pub root: PathBuf,
}

/// Values given on the command line; they win over the file and the environment.
#[derive(Eq, PartialEq, Debug, Default, Clone)]
pub struct Overrides {
    pub tarball: Option<PathBuf>,
    pub package_file: Option<String>,
}

#[derive(Debug)]
pub enum Error {
    ConfigFileError(PathBuf, TomlFileError),
    ConfigDeserializeError(toml::de::Error),
    ConfigMissing(String),
    HostUrlInvalid(url::ParseError),
    HostBucketMissing(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ConfigFileError(path, error) => {
                write!(f, "Failure reading `{}`, {error}", path.display())
            }
            Error::ConfigDeserializeError(error) => {
                write!(f, "Configuration error, {error}")
            }
            Error::ConfigMissing(field) => {
                write!(f, "Configuration of `{field}` is required")
            }
            Error::HostUrlInvalid(error) => {
                write!(f, "Configuration of `binary.host` is not a valid URL, {error}")
            }
            Error::HostBucketMissing(host) => write!(
                f,
                "Could not detect a bucket from host `{host}`; set `binary.bucket` or {ENV_PREFIX}BUCKET"
            ),
        }
    }
}

impl std::error::Error for Error {}

/// Reads `[package]` and `[binary]` from the project config file. A missing
/// file yields an empty config, so everything may come from the environment.
pub fn read_project_config(config_path: &Path) -> Result<PublishConfig, Error> {
    let config_toml = if config_path.is_file() {
        read_toml_file::<toml::Value>(config_path)
            .map_err(|error| Error::ConfigFileError(config_path.to_path_buf(), error))?
    } else {
        toml::Table::new().into()
    };

    let package = match toml_select_value(vec!["package"], &config_toml).cloned() {
        Some(value) => value
            .try_into::<PackageMetadata>()
            .map_err(Error::ConfigDeserializeError)?,
        None => PackageMetadata::default(),
    };
    let binary = match toml_select_value(vec!["binary"], &config_toml).cloned() {
        Some(value) => value
            .try_into::<BinaryConfig>()
            .map_err(Error::ConfigDeserializeError)?,
        None => BinaryConfig::default(),
    };

    Ok(PublishConfig {
        package,
        binary,
        root: config_path
            .parent()
            .map_or_else(PathBuf::new, Path::to_path_buf),
    })
}

/// Collects the `BINARY_PUBLISH_*` variables of this process.
#[must_use]
pub fn capture_env() -> HashMap<String, String> {
    let mut captured = HashMap::new();
    for (key, value) in env::vars() {
        if key.starts_with(ENV_PREFIX) {
            captured.insert(key, value);
        }
    }
    captured
}

fn env_value(env: &HashMap<String, String>, name: &str) -> Option<String> {
    env.get(&format!("{ENV_PREFIX}{name}"))
        .filter(|v| !v.is_empty())
        .cloned()
}

impl PublishConfig {
    /// Settles every value: command line, then environment, then config file,
    /// then what the hosted URL reveals, then defaults.
    pub fn resolve(
        &self,
        env: &HashMap<String, String>,
        overrides: &Overrides,
    ) -> Result<(PublishRequest, StorageSettings), Error> {
        let name = self
            .package
            .name
            .clone()
            .ok_or_else(|| Error::ConfigMissing("package.name".to_string()))?;

        let package_file = match overrides
            .package_file
            .clone()
            .or_else(|| self.binary.package_name.clone())
        {
            Some(package_file) => package_file,
            None => {
                let version = self
                    .package
                    .version
                    .clone()
                    .ok_or_else(|| Error::ConfigMissing("package.version".to_string()))?;
                format!("{name}-v{version}.tar.gz")
            }
        };

        let artifact_path = match &overrides.tarball {
            Some(tarball) => tarball.clone(),
            None => self.root.join(
                self.binary
                    .staged_tarball
                    .clone()
                    .unwrap_or_else(|| Path::new(DEFAULT_STAGING_DIR).join(&package_file)),
            ),
        };

        let host = env_value(env, "HOST").or_else(|| self.binary.host.clone());
        let detected = match &host {
            Some(host) => detect_hosted_location(host, self.binary.remote_path.as_deref())?,
            None => HostedLocation::default(),
        };

        let bucket = env_value(env, "BUCKET")
            .or_else(|| self.binary.bucket.clone())
            .or(detected.bucket)
            .ok_or_else(|| match &host {
                Some(host) => Error::HostBucketMissing(host.clone()),
                None => Error::ConfigMissing("binary.host".to_string()),
            })?;
        let prefix = env_value(env, "PREFIX")
            .or_else(|| self.binary.prefix.clone())
            .unwrap_or(detected.prefix);
        let region = env_value(env, "REGION")
            .or_else(|| self.binary.region.clone())
            .or(detected.region);
        let endpoint = env_value(env, "ENDPOINT").or_else(|| self.binary.endpoint.clone());
        let acl = env_value(env, "ACL")
            .or_else(|| self.binary.acl.clone())
            .unwrap_or_else(|| DEFAULT_ACL.to_string());

        let storage = match env_value(env, "MOCK_S3") {
            Some(mock_root) => StorageSettings::Mock(PathBuf::from(mock_root)),
            None => StorageSettings::S3(S3Settings {
                region,
                endpoint: endpoint.clone(),
                credentials: match (
                    env_value(env, "ACCESS_KEY_ID"),
                    env_value(env, "SECRET_ACCESS_KEY"),
                ) {
                    (Some(access_key_id), Some(secret_access_key)) => CredentialSource::Static {
                        access_key_id,
                        secret_access_key,
                        session_token: env_value(env, "SESSION_TOKEN"),
                    },
                    _ => CredentialSource::DefaultChain,
                },
            }),
        };

        Ok((
            PublishRequest {
                package_name: name,
                artifact_path,
                package_file,
                prefix,
                bucket,
                acl,
                endpoint,
            },
            storage,
        ))
    }
}
