use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of the fetch capability for a single URL.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {0}")]
    Status(u16),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

/// Per-URL failures. None of these stop the crawl; they are collected and
/// summarized once the frontier is drained.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("local parse error: {}: {source}", path.display())]
    LocalRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("local path {local_path} already holds {claimed_by}")]
    PathCollision {
        local_path: String,
        claimed_by: String,
    },
}

impl MirrorError {
    /// Short machine-readable name used in the JSON report.
    pub fn kind(&self) -> &'static str {
        match self {
            MirrorError::InvalidUrl { .. } => "invalid_url",
            MirrorError::Fetch(_) => "fetch",
            MirrorError::LocalRead { .. } => "local_read",
            MirrorError::Write { .. } => "write",
            MirrorError::PathCollision { .. } => "path_collision",
        }
    }
}
