//! Error types shared by the fetcher and the HTTP surface.

use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a single fetch after the retry policy gave up.
///
/// Callers inside the pipeline never propagate this: a fetch error means
/// "no data" for that page, host or probe.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("transport error for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: StatusCode },
}

impl FetchError {
    /// Status code carried by the error, if the server answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport { source, .. } => source.status(),
            Self::Client(_) => None,
        }
    }
}

pub type FetchResult<T> = std::result::Result<T, FetchError>;
