use url::Url;

use crate::Error;

const DEFAULT_REGION: &str = "us-east-1";

/// What a hosted path reveals about where binaries live.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostedLocation {
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub prefix: String,
}

/// Detects bucket, region and key prefix from a host URL joined with a remote path.
///
/// `https://{bucket}.s3.amazonaws.com` is `us-east-1`; `s3-{region}` and
/// `s3.{region}` host forms carry their region; `s3://{bucket}/{prefix}`
/// names a bucket only. Hosts that are not S3 yield no bucket.
pub fn detect_hosted_location(
    host: &str,
    remote_path: Option<&str>,
) -> Result<HostedLocation, Error> {
    let mut base = Url::parse(host).map_err(Error::HostUrlInvalid)?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    let hosted = match remote_path.filter(|p| !p.is_empty()) {
        Some(remote_path) if remote_path.ends_with('/') => base.join(remote_path),
        Some(remote_path) => base.join(&format!("{remote_path}/")),
        None => Ok(base),
    }
    .map_err(Error::HostUrlInvalid)?;

    let prefix = hosted.path().trim_start_matches('/').to_string();
    let hostname = hosted.host_str().unwrap_or_default();

    if hosted.scheme() == "s3" {
        return Ok(HostedLocation {
            bucket: Some(hostname.to_string()).filter(|b| !b.is_empty()),
            region: None,
            prefix,
        });
    }

    let (bucket, region) = match hostname.split_once(".s3") {
        Some((bucket, rest)) if !bucket.is_empty() => {
            let region = rest
                .get(1..)
                .and_then(|r| r.split('.').next())
                .filter(|r| !r.is_empty())
                .map(|r| {
                    if r == "amazonaws" {
                        DEFAULT_REGION.to_string()
                    } else {
                        r.to_string()
                    }
                });
            (Some(bucket.to_string()), region)
        }
        _ => (None, None),
    };

    Ok(HostedLocation {
        bucket,
        region,
        prefix,
    })
}
