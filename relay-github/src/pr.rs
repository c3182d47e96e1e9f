//! Pull request details and commit diffs

use octocrab::models::pulls::PullRequest as OctocrabPR;
use octocrab::models::IssueState;
use relay_core::tool::{ChangedFile, PrDetails};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::client::{is_last_page, PER_PAGE};
use crate::{Error, GitHubClient, Result};

#[derive(Debug, Serialize)]
struct PageParams {
    per_page: u8,
    page: u32,
}

#[derive(Debug, Deserialize)]
struct CommitRef {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    #[serde(default)]
    files: Vec<CommitFile>,
}

#[derive(Debug, Deserialize)]
struct CommitFile {
    filename: String,
    status: String,
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
    #[serde(default)]
    changes: u64,
    patch: Option<String>,
}

impl From<CommitFile> for ChangedFile {
    fn from(file: CommitFile) -> Self {
        ChangedFile {
            filename: file.filename,
            status: file.status,
            additions: file.additions,
            deletions: file.deletions,
            changes: file.changes,
            patch: file.patch,
        }
    }
}

fn pr_details(pr: OctocrabPR, commit_shas: Vec<String>) -> PrDetails {
    let state = match pr.state {
        Some(IssueState::Closed) => "closed",
        _ => "open",
    };
    PrDetails {
        number: pr.number,
        author: pr.user.map(|u| u.login).unwrap_or_default(),
        title: pr.title.unwrap_or_default(),
        body: pr.body.unwrap_or_default(),
        diff_url: pr.diff_url.map(|u| u.to_string()).unwrap_or_default(),
        state: state.to_string(),
        head_sha: pr.head.sha,
        commit_shas,
    }
}

impl GitHubClient {
    /// Fetch a pull request with its commit SHAs, oldest first
    pub async fn get_pr_details(&self, number: u64) -> Result<PrDetails> {
        debug!(number, "Fetching pull request");

        let pr = self
            .client()
            .pulls(self.owner(), self.repo())
            .get(number)
            .await
            .map_err(|e| Error::from_api(e, || Error::PrNotFound(number)))?;
        let commits = self.pr_commit_shas(number).await?;

        info!(number, commits = commits.len(), "Fetched pull request");
        Ok(pr_details(pr, commits))
    }

    /// Commit SHAs of a pull request, oldest first (paginating through all pages)
    pub async fn pr_commit_shas(&self, number: u64) -> Result<Vec<String>> {
        let route = self.route(&format!("pulls/{}/commits", number));
        let mut shas = Vec::new();

        let mut page_num = 1u32;
        loop {
            let params = PageParams {
                per_page: PER_PAGE,
                page: page_num,
            };
            let commits: Vec<CommitRef> = self
                .client()
                .get(&route, Some(&params))
                .await
                .map_err(|e| Error::from_api(e, || Error::PrNotFound(number)))?;

            let count = commits.len();
            shas.extend(commits.into_iter().map(|c| c.sha));
            if is_last_page(count) {
                break;
            }
            page_num += 1;
        }

        debug!(number, commits = shas.len(), pages = page_num, "Fetched commit SHAs");
        Ok(shas)
    }

    /// Files changed by one commit, with their patches
    pub async fn get_commit_files(&self, sha: &str) -> Result<Vec<ChangedFile>> {
        debug!(sha, "Fetching commit");

        let commit: CommitDetail = self
            .client()
            .get(self.route(&format!("commits/{}", sha)), None::<&()>)
            .await
            .map_err(|e| Error::from_api(e, || Error::CommitNotFound(sha.to_string())))?;

        Ok(commit.files.into_iter().map(ChangedFile::from).collect())
    }
}
