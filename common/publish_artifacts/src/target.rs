use url::Url;

use crate::errors::PublishError;

pub const S3_PUBLIC_DOMAIN: &str = "s3.amazonaws.com";
const KEY_BASE: &str = "s3://bucket/";

/// Resolves a package file name against a key prefix the way a relative URL
/// resolves against a base: everything after the prefix's last `/` is
/// replaced, and `.`/`..` segments are collapsed.
pub fn resolve_key(prefix: &str, package_file: &str) -> Result<String, PublishError> {
    if package_file.is_empty() {
        return Err(PublishError::TargetKeyInvalid(
            "the package file name is empty".to_string(),
        ));
    }
    let base =
        Url::parse(KEY_BASE).map_err(|e| PublishError::TargetKeyInvalid(e.to_string()))?;
    let resolved = base
        .join(prefix)
        .and_then(|prefixed| prefixed.join(package_file))
        .map_err(|e| PublishError::TargetKeyInvalid(e.to_string()))?;
    if resolved.scheme() != base.scheme() || resolved.host_str() != base.host_str() {
        return Err(PublishError::TargetKeyInvalid(format!(
            "`{package_file}` points outside the bucket"
        )));
    }

    let key = resolved.path().strip_prefix('/').unwrap_or(resolved.path());
    if key.is_empty() || key.ends_with('/') {
        return Err(PublishError::TargetKeyInvalid(format!(
            "`{key}` does not name an object"
        )));
    }
    Ok(key.to_string())
}

/// Public URL of an object. Virtual-hosted AWS style unless a custom
/// endpoint is configured, in which case the path-style form is used.
#[must_use]
pub fn public_url(bucket: &str, key: &str, endpoint: Option<&str>) -> String {
    match endpoint {
        Some(endpoint) => format!("{}/{bucket}/{key}", endpoint.trim_end_matches('/')),
        None => format!("https://{bucket}.{S3_PUBLIC_DOMAIN}/{key}"),
    }
}
