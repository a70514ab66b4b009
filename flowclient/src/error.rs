use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("image reference must include a tag or digest, e.g. ghcr.io/user/repo:tag or @sha256:<hash>: {0}")]
    InvalidReference(String),

    #[error("invalid digest format: {0}")]
    InvalidDigest(String),

    #[error("file {file} is not under the artifact root {root}")]
    InvalidPath { file: PathBuf, root: PathBuf },

    #[error("remote copy failed: {0}")]
    RemoteCopy(String),

    #[error("failed to download {url}: status {status}")]
    Download { url: String, status: u16 },

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("blob {0} not present in store")]
    BlobNotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
