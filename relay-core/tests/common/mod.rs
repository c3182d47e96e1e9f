//! In-memory code host shared by the integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use relay_core::tool::{ChangedFile, CodeHost, HostError, PostedReview, PrDetails};

/// A review created on the fake host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredReview {
    pub pr_number: u64,
    pub body: String,
    pub review_id: u64,
}

#[derive(Default)]
pub struct FakeHost {
    prs: HashMap<u64, PrDetails>,
    files: HashMap<String, Vec<ChangedFile>>,
    reviews: Mutex<Vec<StoredReview>>,
    /// Transient failures `pull_request` returns before succeeding
    flaky_pr_reads: Mutex<u32>,
    pr_reads: Mutex<u32>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// The "Fix typo" PR: one commit touching the README
    pub fn with_typo_pr() -> Self {
        let pr = PrDetails {
            number: 1,
            author: "octocat".to_string(),
            title: "Fix typo".to_string(),
            body: String::new(),
            diff_url: "https://github.com/acme/widgets/pull/1.diff".to_string(),
            state: "open".to_string(),
            head_sha: "abc123".to_string(),
            commit_shas: vec!["abc123".to_string()],
        };
        let readme = ChangedFile {
            filename: "README.md".to_string(),
            status: "modified".to_string(),
            additions: 1,
            deletions: 1,
            changes: 2,
            patch: Some("@@ -1 +1 @@\n-The quikc fox\n+The quick fox".to_string()),
        };
        Self::new().with_pr(pr, vec![readme])
    }

    pub fn with_pr(mut self, pr: PrDetails, files: Vec<ChangedFile>) -> Self {
        self.files.insert(pr.head_sha.clone(), files);
        self.prs.insert(pr.number, pr);
        self
    }

    pub fn with_flaky_pr_reads(self, failures: u32) -> Self {
        *self.flaky_pr_reads.lock().unwrap() = failures;
        self
    }

    pub fn pr(&self, number: u64) -> Option<PrDetails> {
        self.prs.get(&number).cloned()
    }

    pub fn files(&self, sha: &str) -> Vec<ChangedFile> {
        self.files.get(sha).cloned().unwrap_or_default()
    }

    pub fn reviews(&self) -> Vec<StoredReview> {
        self.reviews.lock().unwrap().clone()
    }

    pub fn pr_reads(&self) -> u32 {
        *self.pr_reads.lock().unwrap()
    }
}

#[async_trait]
impl CodeHost for FakeHost {
    async fn pull_request(&self, number: u64) -> Result<PrDetails, HostError> {
        *self.pr_reads.lock().unwrap() += 1;
        {
            let mut flaky = self.flaky_pr_reads.lock().unwrap();
            if *flaky > 0 {
                *flaky -= 1;
                return Err(HostError::Unavailable("502 Bad Gateway".to_string()));
            }
        }
        self.prs
            .get(&number)
            .cloned()
            .ok_or_else(|| HostError::NotFound(format!("pull request #{}", number)))
    }

    async fn commit_files(&self, sha: &str) -> Result<Vec<ChangedFile>, HostError> {
        self.files
            .get(sha)
            .cloned()
            .ok_or_else(|| HostError::NotFound(format!("commit {}", sha)))
    }

    async fn find_review(&self, pr_number: u64, body: &str) -> Result<Option<u64>, HostError> {
        Ok(self
            .reviews
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.pr_number == pr_number && r.body == body)
            .map(|r| r.review_id))
    }

    async fn create_review(&self, pr_number: u64, body: &str) -> Result<PostedReview, HostError> {
        if !self.prs.contains_key(&pr_number) {
            return Err(HostError::NotFound(format!("pull request #{}", pr_number)));
        }
        let mut reviews = self.reviews.lock().unwrap();
        let review_id = 1000 + reviews.len() as u64 + 1;
        reviews.push(StoredReview {
            pr_number,
            body: body.to_string(),
            review_id,
        });
        Ok(PostedReview {
            status: "success".to_string(),
            review_id,
        })
    }
}
