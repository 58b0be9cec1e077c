// This module is only used for testing, where using unwrap() is acceptable.
#![allow(clippy::unwrap_used)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

pub const CONFIG_FILE: &str = "binary-publish.toml";
pub const MOCK_S3_DIR: &str = "mock-s3";

pub const DEFAULT_CONFIG: &str = r#"
[package]
name = "addon"
version = "1.2.3"

[binary]
host = "https://my-bucket.s3.amazonaws.com"
remote_path = "pkg/v1"
"#;

/// A throwaway project directory holding a config file and a mock S3 root.
pub struct Project {
    pub dir: TempDir,
}

impl Project {
    #[must_use]
    pub fn new(config: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), config).unwrap();
        fs::create_dir_all(dir.path().join(MOCK_S3_DIR)).unwrap();
        Project { dir }
    }

    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join(CONFIG_FILE)
    }

    #[must_use]
    pub fn mock_s3_root(&self) -> PathBuf {
        self.dir.path().join(MOCK_S3_DIR)
    }

    /// Writes a tarball stand-in at `relative` under the project directory.
    pub fn stage_tarball(&self, relative: impl AsRef<Path>, contents: &[u8]) -> PathBuf {
        let path = self.dir.path().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    /// Path of an object inside the mock S3 root.
    #[must_use]
    pub fn mock_object(&self, bucket: &str, key: &str) -> PathBuf {
        self.mock_s3_root().join(bucket).join(key)
    }
}

#[must_use]
pub fn count_lines_containing(output: &[u8], needle: &str) -> usize {
    String::from_utf8_lossy(output)
        .lines()
        .filter(|line| line.contains(needle))
        .count()
}
