//! Deterministic offline policy for the reference roles
//!
//! Plays each [`AgentRole`] without a language model: the context agent
//! fetches the PR and its commits, the commentor drafts with
//! [`draft_review`], and the review agent checks the draft against the
//! [`ReviewChecklist`] before posting.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::agent::{AgentRole, Decider, TurnDecision, TurnRequest};
use crate::review::{draft_review, ReviewChecklist, ReviewContext};
use crate::state::{DRAFT_COMMENT, GATHERED_CONTEXTS, POSTED_REVIEW};
use crate::tool::{
    ChangedFile, PrDetails, ADD_COMMENT_TO_STATE, ADD_CONTEXT_TO_STATE, ADD_FINAL_REVIEW_TO_STATE,
    GET_COMMIT_DETAILS, GET_PR_DETAILS, POST_REVIEW,
};
use crate::{Error, Result};

/// Rule-based decider for the PR review workflow
#[derive(Debug, Clone, Default)]
pub struct HeuristicDecider {
    checklist: ReviewChecklist,
}

impl HeuristicDecider {
    /// Create a heuristic decider with the full checklist
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different checklist for the review agent
    pub fn with_checklist(mut self, checklist: ReviewChecklist) -> Self {
        self.checklist = checklist;
        self
    }

    fn gather(&self, request: &TurnRequest<'_>) -> Result<TurnDecision> {
        let Some(pr_value) = request.result_of(GET_PR_DETAILS) else {
            return Ok(TurnDecision::default().call(
                GET_PR_DETAILS,
                json!({ "pr_number": request.input.pr_number }),
            ));
        };
        let pr: PrDetails = serde_json::from_value(pr_value.clone())?;

        let fetched: Vec<&Value> = request.results_of(GET_COMMIT_DETAILS).collect();
        if fetched.is_empty() {
            let mut shas = pr.commit_shas.clone();
            if shas.is_empty() {
                shas.push(pr.head_sha.clone());
            }
            return Ok(shas.into_iter().fold(TurnDecision::default(), |d, sha| {
                d.call(GET_COMMIT_DETAILS, json!({ "head_sha": sha }))
            }));
        }

        let mut files = Vec::new();
        for value in fetched {
            let batch: Vec<ChangedFile> = serde_json::from_value(value.clone())?;
            files.extend(batch);
        }
        let context = ReviewContext::new(pr, files);
        debug!(files = context.files.len(), "Gathered PR context");

        Ok(TurnDecision::default()
            .call(
                ADD_CONTEXT_TO_STATE,
                json!({ "value": serde_json::to_value(&context)? }),
            )
            .then_handoff(
                AgentRole::Commentor.name(),
                "PR details and changed files are saved in gathered_contexts",
            ))
    }

    fn draft(&self, request: &TurnRequest<'_>) -> Result<TurnDecision> {
        let gathered = request.state.get(GATHERED_CONTEXTS)?;
        if gathered.is_null() {
            return Ok(TurnDecision::handoff(
                AgentRole::Context.name(),
                "Need PR details and changed files before drafting",
            ));
        }

        let context = ReviewContext::from_value(gathered)?;
        let draft = draft_review(&context);
        Ok(TurnDecision::default()
            .call(ADD_COMMENT_TO_STATE, json!({ "value": draft }))
            .then_handoff(
                AgentRole::ReviewAndPosting.name(),
                "Draft saved in draft_comment",
            ))
    }

    fn review(&self, request: &TurnRequest<'_>) -> Result<TurnDecision> {
        let pr_number = request.input.pr_number;

        let posted = request.state.get(POSTED_REVIEW)?;
        if let Some(id) = posted.get("review_id").and_then(Value::as_u64) {
            return Ok(TurnDecision::finish(format!(
                "Posted review {} to PR #{}",
                id, pr_number
            )));
        }

        let draft = request.state.get_text(DRAFT_COMMENT)?;
        if draft.trim().is_empty() {
            return Ok(TurnDecision::handoff(
                AgentRole::Commentor.name(),
                request.input.prompt.clone(),
            ));
        }

        if let Some(feedback) = self.checklist.evaluate(draft).feedback() {
            return Ok(TurnDecision::handoff(AgentRole::Commentor.name(), feedback));
        }

        Ok(TurnDecision::default()
            .call(ADD_FINAL_REVIEW_TO_STATE, json!({ "value": draft }))
            .call(
                POST_REVIEW,
                json!({ "pr_number": pr_number, "comment": draft }),
            ))
    }
}

#[async_trait]
impl Decider for HeuristicDecider {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    async fn decide(&self, request: &TurnRequest<'_>) -> Result<TurnDecision> {
        match AgentRole::from_agent_name(&request.agent.name) {
            Some(AgentRole::Context) => self.gather(request),
            Some(AgentRole::Commentor) => self.draft(request),
            Some(AgentRole::ReviewAndPosting) => self.review(request),
            None => Err(Error::Decision(format!(
                "no offline policy for agent '{}'",
                request.agent.name
            ))),
        }
    }
}
