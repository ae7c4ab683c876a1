use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::config::StorageConfig;

const MAX_ID_LEN: usize = 128;
const FILE_SUFFIX: &str = "_futebol.mp4";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid video id {0:?}: expected 1-128 characters of [A-Za-z0-9_-]")]
pub struct InvalidVideoId(pub String);

/**
    Identifier of a processed video.

    Ids end up in file names, so only a conservative character set is
    accepted.
*/
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    pub fn parse(id: &str) -> Result<Self, InvalidVideoId> {
        let valid = !id.is_empty()
            && id.len() <= MAX_ID_LEN
            && id
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if valid {
            Ok(Self(id.to_string()))
        } else {
            Err(InvalidVideoId(id.to_string()))
        }
    }

    /// File name of the processed output, e.g. `abc_futebol.mp4`.
    pub fn output_file_name(&self) -> String {
        format!("{}{}", self.0, FILE_SUFFIX)
    }

    pub fn temp_file_name(&self) -> String {
        format!("temp_{}{}", self.0, FILE_SUFFIX)
    }

    pub fn tiktok_file_name(&self) -> String {
        format!("tiktok_{}{}", self.0, FILE_SUFFIX)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/**
    On-disk layout for temporary downloads, processed output and
    externally produced tiktok variants.
*/
#[derive(Debug, Clone)]
pub struct VideoStore {
    downloads_dir: PathBuf,
    temp_dir: PathBuf,
    tiktok_dir: PathBuf,
}

impl VideoStore {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            downloads_dir: config.downloads_dir.clone(),
            temp_dir: config.temp_dir.clone(),
            tiktok_dir: config.tiktok_dir.clone(),
        }
    }

    pub fn output_path(&self, id: &VideoId) -> PathBuf {
        self.downloads_dir.join(id.output_file_name())
    }

    pub fn temp_path(&self, id: &VideoId) -> PathBuf {
        self.temp_dir.join(id.temp_file_name())
    }

    pub fn tiktok_path(&self, id: &VideoId) -> PathBuf {
        self.tiktok_dir.join(id.tiktok_file_name())
    }

    pub async fn ensure_dirs(&self) -> io::Result<()> {
        for dir in [&self.downloads_dir, &self.temp_dir, &self.tiktok_dir] {
            tokio::fs::create_dir_all(dir).await?;
        }
        Ok(())
    }
}

/// Remove a file, treating "not found" as success.
pub async fn remove_if_exists(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Size of a file in mebibytes.
pub async fn file_size_mb(path: &Path) -> io::Result<f64> {
    let meta = tokio::fs::metadata(path).await?;
    Ok(meta.len() as f64 / (1024.0 * 1024.0))
}
