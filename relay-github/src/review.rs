//! Pull request reviews

use chrono::{DateTime, Utc};
use relay_core::tool::PostedReview;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::client::{is_last_page, PER_PAGE};
use crate::{Error, GitHubClient, Result};

/// A pull request review
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    /// Review ID
    pub id: u64,
    /// APPROVED, CHANGES_REQUESTED, COMMENTED, ...
    pub state: String,
    pub body: Option<String>,
    /// Author username
    pub author: String,
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct CreatedReview {
    id: u64,
    #[serde(default)]
    state: String,
}

/// Compare review bodies the way GitHub stores them
fn same_body(stored: &str, body: &str) -> bool {
    stored.replace("\r\n", "\n").trim() == body.replace("\r\n", "\n").trim()
}

impl GitHubClient {
    /// Get all reviews for a pull request (paginating through all pages)
    pub async fn get_pr_reviews(&self, pr_number: u64) -> Result<Vec<Review>> {
        let mut all_reviews = Vec::new();

        let mut page_num = 1u32;
        loop {
            let page = self
                .client()
                .pulls(self.owner(), self.repo())
                .list_reviews(pr_number)
                .per_page(PER_PAGE)
                .page(page_num)
                .send()
                .await
                .map_err(|e| Error::from_api(e, || Error::PrNotFound(pr_number)))?;

            let count = page.items.len();
            all_reviews.extend(page.items.into_iter().map(|r| Review {
                id: r.id.0,
                state: r
                    .state
                    .map(|s| format!("{:?}", s))
                    .unwrap_or_else(|| "UNKNOWN".to_string()),
                body: r.body,
                author: r.user.map(|u| u.login).unwrap_or_default(),
                submitted_at: r.submitted_at,
            }));
            if is_last_page(count) {
                break;
            }
            page_num += 1;
        }

        debug!(pr_number, count = all_reviews.len(), "Fetched reviews");
        Ok(all_reviews)
    }

    /// ID of an existing review whose body matches `body`
    pub async fn find_review_with_body(&self, pr_number: u64, body: &str) -> Result<Option<u64>> {
        let reviews = self.get_pr_reviews(pr_number).await?;
        debug!(pr_number, reviews = reviews.len(), "Checking for an identical review");
        Ok(reviews
            .into_iter()
            .find(|r| r.body.as_deref().is_some_and(|b| same_body(b, body)))
            .map(|r| r.id))
    }

    /// Create a COMMENT review on a pull request
    pub async fn create_comment_review(&self, pr_number: u64, body: &str) -> Result<PostedReview> {
        let payload = json!({ "body": body, "event": "COMMENT" });
        let created: CreatedReview = self
            .client()
            .post(self.route(&format!("pulls/{}/reviews", pr_number)), Some(&payload))
            .await
            .map_err(|e| Error::from_api(e, || Error::PrNotFound(pr_number)))?;

        info!(pr_number, review_id = created.id, state = %created.state, "Created review");
        Ok(PostedReview {
            status: "success".to_string(),
            review_id: created.id,
        })
    }
}
