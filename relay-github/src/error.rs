//! Error types for GitHub operations

use relay_core::tool::HostError;
use thiserror::Error;

/// Result type for GitHub operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during GitHub operations
#[derive(Error, Debug)]
pub enum Error {
    /// GitHub API error
    #[error("GitHub API error: {0}")]
    Api(#[from] octocrab::Error),

    /// Authentication error
    #[error("GitHub authentication error: {0}")]
    Auth(String),

    /// Pull request not found
    #[error("Pull request #{0} not found")]
    PrNotFound(u64),

    /// Commit not found
    #[error("Commit {0} not found")]
    CommitNotFound(String),

    /// Rate limit exceeded
    #[error("GitHub rate limit exceeded: {0}")]
    RateLimited(String),

    /// Network failure or GitHub server error
    #[error("GitHub unavailable: {0}")]
    Unavailable(String),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Classify an octocrab error, using `not_found` for 404s
    pub(crate) fn from_api(err: octocrab::Error, not_found: impl FnOnce() -> Error) -> Error {
        match &err {
            octocrab::Error::GitHub { source, .. } => {
                let message = source.message.to_lowercase();
                if message.contains("not found") {
                    not_found()
                } else if message.contains("rate limit") {
                    Error::RateLimited(source.message.clone())
                } else if message.contains("bad credentials") {
                    Error::Auth("Invalid GitHub token".to_string())
                } else if message.contains("server error") || message.contains("bad gateway") {
                    Error::Unavailable(source.message.clone())
                } else {
                    Error::Api(err)
                }
            }
            octocrab::Error::Hyper { .. } | octocrab::Error::Service { .. } => {
                Error::Unavailable(err.to_string())
            }
            _ => Error::Api(err),
        }
    }
}

impl From<Error> for HostError {
    fn from(err: Error) -> Self {
        match err {
            Error::PrNotFound(_) | Error::CommitNotFound(_) => HostError::NotFound(err.to_string()),
            Error::RateLimited(msg) => HostError::RateLimited(msg),
            Error::Unavailable(msg) => HostError::Unavailable(msg),
            other => HostError::Other(other.to_string()),
        }
    }
}
