//! Tools backed by the code host: PR reads and review posting

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{CodeHost, PostedReview, ToolContext, ToolDescriptor, ToolError, ToolKind, TypedTool};
use crate::state::POSTED_REVIEW;

pub const GET_PR_DETAILS: &str = "get_pr_details";
pub const GET_COMMIT_DETAILS: &str = "get_commit_details";
pub const POST_REVIEW: &str = "post_review_to_github";

/// Arguments for [`GetPrDetailsTool`]
#[derive(Debug, Deserialize)]
pub struct PrNumberArgs {
    pub pr_number: u64,
}

/// Fetches PR metadata: author, title, body, diff URL, state, head SHA, commit SHAs
#[derive(Clone)]
pub struct GetPrDetailsTool {
    host: Arc<dyn CodeHost>,
}

impl GetPrDetailsTool {
    pub fn new(host: Arc<dyn CodeHost>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl TypedTool for GetPrDetailsTool {
    type Args = PrNumberArgs;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            GET_PR_DETAILS,
            "Fetch PR details given the PR number",
            ToolKind::Read,
        )
        .with_parameters(json!({
            "type": "object",
            "properties": { "pr_number": { "type": "integer", "minimum": 1 } },
            "required": ["pr_number"],
        }))
        .retryable()
    }

    async fn call_typed(
        &self,
        args: PrNumberArgs,
        _ctx: &mut ToolContext<'_>,
    ) -> Result<Value, ToolError> {
        let details = self.host.pull_request(args.pr_number).await?;
        serde_json::to_value(details).map_err(|e| ToolError::Failed(e.to_string()))
    }
}

/// Arguments for [`GetCommitDetailsTool`]
#[derive(Debug, Deserialize)]
pub struct CommitArgs {
    pub head_sha: String,
}

/// Lists the files a commit changed with their patches
#[derive(Clone)]
pub struct GetCommitDetailsTool {
    host: Arc<dyn CodeHost>,
}

impl GetCommitDetailsTool {
    pub fn new(host: Arc<dyn CodeHost>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl TypedTool for GetCommitDetailsTool {
    type Args = CommitArgs;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            GET_COMMIT_DETAILS,
            "Fetch the changed files (status, line counts, patch) of a commit given its SHA",
            ToolKind::Read,
        )
        .with_parameters(json!({
            "type": "object",
            "properties": { "head_sha": { "type": "string" } },
            "required": ["head_sha"],
        }))
        .retryable()
    }

    async fn call_typed(
        &self,
        args: CommitArgs,
        _ctx: &mut ToolContext<'_>,
    ) -> Result<Value, ToolError> {
        if args.head_sha.trim().is_empty() {
            return Err(ToolError::InvalidArguments("head_sha is empty".to_string()));
        }
        let files = self.host.commit_files(&args.head_sha).await?;
        serde_json::to_value(files).map_err(|e| ToolError::Failed(e.to_string()))
    }
}

/// Arguments for [`PostReviewTool`]
#[derive(Debug, Deserialize)]
pub struct PostReviewArgs {
    pub pr_number: u64,
    pub comment: String,
}

/// What the posting tool records in state after a successful post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct PostRecord {
    pr_number: u64,
    body: String,
    status: String,
    review_id: u64,
}

/// Posts the final review to the PR
///
/// A run posts at most once. Repeating the identical post returns the
/// recorded confirmation without touching the host or the state again; a
/// different body after a successful post is rejected. Before creating a
/// review the host is asked for an identical existing one, so a retried call
/// whose first attempt actually landed does not produce a second review.
#[derive(Clone)]
pub struct PostReviewTool {
    host: Arc<dyn CodeHost>,
}

impl PostReviewTool {
    pub fn new(host: Arc<dyn CodeHost>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl TypedTool for PostReviewTool {
    type Args = PostReviewArgs;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            POST_REVIEW,
            "Post the final review comment to the PR on GitHub",
            ToolKind::Write,
        )
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "pr_number": { "type": "integer", "minimum": 1 },
                "comment": { "type": "string" },
            },
            "required": ["pr_number", "comment"],
        }))
        .retryable()
        .external()
    }

    async fn call_typed(
        &self,
        args: PostReviewArgs,
        ctx: &mut ToolContext<'_>,
    ) -> Result<Value, ToolError> {
        if args.comment.trim().is_empty() {
            return Err(ToolError::Failed(
                "refusing to post an empty review".to_string(),
            ));
        }

        let previous = ctx.state.get(POSTED_REVIEW)?;
        if !previous.is_null() {
            let record: PostRecord = serde_json::from_value(previous.clone())
                .map_err(|e| ToolError::Failed(format!("corrupt posted_review record: {}", e)))?;
            if record.pr_number == args.pr_number && record.body == args.comment {
                info!(review_id = record.review_id, "Review already posted in this run");
                return Ok(json!({
                    "status": record.status,
                    "review_id": record.review_id,
                    "duplicate": true,
                }));
            }
            warn!(pr = args.pr_number, "Rejected second, different review post");
            return Err(ToolError::Failed(format!(
                "review {} was already posted in this run",
                record.review_id
            )));
        }

        let posted = match self.host.find_review(args.pr_number, &args.comment).await? {
            Some(review_id) => {
                info!(review_id, "Identical review already exists on host");
                PostedReview {
                    status: "success".to_string(),
                    review_id,
                }
            }
            None => self.host.create_review(args.pr_number, &args.comment).await?,
        };

        let record = PostRecord {
            pr_number: args.pr_number,
            body: args.comment,
            status: posted.status.clone(),
            review_id: posted.review_id,
        };
        ctx.state.set(
            POSTED_REVIEW,
            serde_json::to_value(&record).map_err(|e| ToolError::Failed(e.to_string()))?,
        )?;

        info!(pr = record.pr_number, review_id = posted.review_id, "Posted review");
        Ok(json!({ "status": posted.status, "review_id": posted.review_id }))
    }
}
