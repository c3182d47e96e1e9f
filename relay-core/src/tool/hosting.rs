//! Code-hosting collaborator interface
//!
//! The read and posting tools talk to the hosting service through
//! [`CodeHost`]; `relay-github` provides the GitHub implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Pull request metadata needed for a review
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrDetails {
    pub number: u64,
    /// Author handle
    pub author: String,
    pub title: String,
    pub body: String,
    /// Where the unified diff can be fetched
    pub diff_url: String,
    /// open / closed
    pub state: String,
    pub head_sha: String,
    /// Commit identifiers in the PR, oldest first
    pub commit_shas: Vec<String>,
}

/// One file touched by a commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub filename: String,
    /// added / modified / removed / renamed
    pub status: String,
    pub additions: u64,
    pub deletions: u64,
    pub changes: u64,
    /// Unified patch text; binary files have none
    pub patch: Option<String>,
}

/// Confirmation of a review created on the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedReview {
    pub status: String,
    pub review_id: u64,
}

/// Failure reported by the code host
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Network hiccup or 5xx
    #[error("temporary failure: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Other(String),
}

impl HostError {
    /// Whether a retry might succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, HostError::RateLimited(_) | HostError::Unavailable(_))
    }
}

/// Operations the review workflow needs from a code-hosting service
#[async_trait]
pub trait CodeHost: Send + Sync {
    /// Fetch pull request metadata
    async fn pull_request(&self, number: u64) -> Result<PrDetails, HostError>;

    /// List the files changed by a commit
    async fn commit_files(&self, sha: &str) -> Result<Vec<ChangedFile>, HostError>;

    /// Find an existing review on the PR with exactly this body
    async fn find_review(&self, pr_number: u64, body: &str) -> Result<Option<u64>, HostError>;

    /// Attach a comment review to the PR
    async fn create_review(&self, pr_number: u64, body: &str) -> Result<PostedReview, HostError>;
}
