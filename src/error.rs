//! Error types shared by the slideshow library.

use std::time::Duration;

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level slideshow error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration was missing or violated an invariant.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// The authentication round trip failed.
    #[error("authentication failed: {0}")]
    Auth(#[source] FetchError),
    /// A page or uploader request failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// Loading finished without a single gallery page.
    #[error("no gallery pages could be loaded")]
    NoPages,
    /// A template failed to compile or render.
    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("slideshow task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    /// The slideshow task result was already taken by an earlier `wait`.
    #[error("slideshow task already finished")]
    AlreadyJoined,
    /// The slideshow was stopped or superseded by a newer instance.
    #[error("slideshow was cancelled")]
    Cancelled,
}

impl Error {
    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Config(msg.into())
    }
}

/// Failure of a single remote request.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("unexpected payload from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{what} timed out after {after:?}")]
    Timeout { what: String, after: Duration },
    /// Transport-level failure without an underlying HTTP error.
    #[error("{url} is unavailable: {message}")]
    Unavailable { url: String, message: String },
}
