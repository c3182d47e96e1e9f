//! [`CodeHost`] backed by the GitHub REST API

use async_trait::async_trait;
use relay_core::tool::{ChangedFile, CodeHost, HostError, PostedReview, PrDetails};

use crate::GitHubClient;

#[async_trait]
impl CodeHost for GitHubClient {
    async fn pull_request(&self, number: u64) -> Result<PrDetails, HostError> {
        self.get_pr_details(number).await.map_err(HostError::from)
    }

    async fn commit_files(&self, sha: &str) -> Result<Vec<ChangedFile>, HostError> {
        self.get_commit_files(sha).await.map_err(HostError::from)
    }

    async fn find_review(&self, pr_number: u64, body: &str) -> Result<Option<u64>, HostError> {
        self.find_review_with_body(pr_number, body).await.map_err(HostError::from)
    }

    async fn create_review(&self, pr_number: u64, body: &str) -> Result<PostedReview, HostError> {
        self.create_comment_review(pr_number, body).await.map_err(HostError::from)
    }
}
