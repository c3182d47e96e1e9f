//! End-to-end runs of the PR review workflow against an in-memory host

mod common;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use relay_core::agent::{
    AgentRole, AgentSpec, Decider, HeuristicDecider, ScriptedDecider, TurnDecision, TurnRequest,
};
use relay_core::review::{ReviewChecklist, ReviewContext};
use relay_core::state::{
    StateSchema, DRAFT_COMMENT, FINAL_REVIEW_COMMENT, GATHERED_CONTEXTS, POSTED_REVIEW,
};
use relay_core::tool::{
    ToolContext, ToolDescriptor, ToolError, ToolKind, ToolRegistry, TypedTool,
    ADD_COMMENT_TO_STATE, ADD_CONTEXT_TO_STATE, ADD_FINAL_REVIEW_TO_STATE, GET_COMMIT_DETAILS,
    GET_PR_DETAILS, POST_REVIEW,
};
use relay_core::workflow::{RetryPolicy, TurnLimits, Workflow, WorkflowEvent, WorkflowRunner};
use relay_core::Error;
use serde::Deserialize;
use serde_json::{json, Value};

use common::FakeHost;

const CONTEXT: &str = "ContextAgent";
const COMMENTOR: &str = "CommentorAgent";
const REVIEWER: &str = "ReviewAndPostingAgent";

const FIRST_DRAFT: &str = "Thanks @octocat, the typo fix looks good. No tests added.";
const REVISED_DRAFT: &str = "Thanks @octocat!\n\n> The quick fox\n\nNo tests or migrations needed.";

fn review_runner(host: Arc<FakeHost>, decider: ScriptedDecider, max_turns: u32) -> WorkflowRunner {
    let limits = TurnLimits {
        max_turns,
        ..TurnLimits::default()
    };
    let workflow = Workflow::pr_review(host, limits).unwrap();
    WorkflowRunner::new(Arc::new(workflow), Arc::new(decider)).with_retry(RetryPolicy::immediate(3))
}

fn switches(events: &[WorkflowEvent]) -> Vec<(String, u32)> {
    events
        .iter()
        .filter_map(|e| match e {
            WorkflowEvent::AgentSwitched { name, turn } => Some((name.clone(), *turn)),
            _ => None,
        })
        .collect()
}

fn invoked(events: &[WorkflowEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            WorkflowEvent::ToolInvoked { name, .. } => Some(name.clone()),
            _ => None,
        })
        .collect()
}

/// The record the context agent saves for PR #1
fn typo_pr_context() -> ReviewContext {
    let host = FakeHost::with_typo_pr();
    let pr = host.pr(1).unwrap();
    let files = host.files(&pr.head_sha);
    ReviewContext::new(pr, files)
}

/// The scripted conversation for PR #1, with one rejected draft
fn typo_pr_script() -> ScriptedDecider {
    let context = serde_json::to_value(typo_pr_context()).unwrap();
    ScriptedDecider::new()
        .then(
            REVIEWER,
            TurnDecision::handoff(COMMENTOR, "Write a review for PR number 1"),
        )
        .then(COMMENTOR, TurnDecision::handoff(CONTEXT, "Need the PR context"))
        .then(
            CONTEXT,
            TurnDecision::default().call(GET_PR_DETAILS, json!({ "pr_number": 1 })),
        )
        .then(
            CONTEXT,
            TurnDecision::default()
                .call(GET_COMMIT_DETAILS, json!({ "head_sha": "abc123" }))
                .call(ADD_CONTEXT_TO_STATE, json!({ "value": context }))
                .then_handoff(COMMENTOR, "Context saved"),
        )
        .then(
            COMMENTOR,
            TurnDecision::default()
                .call(ADD_COMMENT_TO_STATE, json!({ "value": FIRST_DRAFT }))
                .then_handoff(REVIEWER, "Draft ready"),
        )
        .then(
            REVIEWER,
            TurnDecision::handoff(COMMENTOR, "Quote the changed line and mention tests"),
        )
        .then(
            COMMENTOR,
            TurnDecision::default()
                .call(ADD_COMMENT_TO_STATE, json!({ "value": REVISED_DRAFT }))
                .then_handoff(REVIEWER, "Revised"),
        )
        .then(
            REVIEWER,
            TurnDecision::default()
                .call(ADD_FINAL_REVIEW_TO_STATE, json!({ "value": REVISED_DRAFT }))
                .call(
                    POST_REVIEW,
                    json!({ "pr_number": 1, "comment": REVISED_DRAFT }),
                ),
        )
        .then(REVIEWER, TurnDecision::finish("Posted review 1001 to PR #1"))
}

#[tokio::test]
async fn test_typo_pr_review_with_one_rejection() {
    let host = Arc::new(FakeHost::with_typo_pr());
    let runner = review_runner(host.clone(), typo_pr_script(), 20);

    let report = runner.run(1).await;

    assert_eq!(report.outcome.output(), Some("Posted review 1001 to PR #1"));
    assert_eq!(report.turns, 7);
    assert_eq!(
        switches(&report.events),
        vec![
            (REVIEWER.to_string(), 1),
            (COMMENTOR.to_string(), 2),
            (CONTEXT.to_string(), 3),
            (COMMENTOR.to_string(), 4),
            (REVIEWER.to_string(), 5),
            (COMMENTOR.to_string(), 6),
            (REVIEWER.to_string(), 7),
        ]
    );

    let reviews = host.reviews();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].body, REVISED_DRAFT);
    assert_eq!(report.state.get_text(DRAFT_COMMENT).unwrap(), REVISED_DRAFT);
    assert_eq!(
        report.state.get_text(FINAL_REVIEW_COMMENT).unwrap(),
        REVISED_DRAFT
    );
    let gathered = ReviewContext::from_value(report.state.get(GATHERED_CONTEXTS).unwrap()).unwrap();
    assert_eq!(gathered, typo_pr_context());

    match report.events.last() {
        Some(WorkflowEvent::RunFinished { output, turns }) => {
            assert!(output.contains("1001"));
            assert_eq!(*turns, 7);
        }
        other => panic!("expected RunFinished, got {:?}", other),
    }
}

/// Heuristic roles, except the commentor's first draft skips most of the checklist
struct HastyCommentor {
    inner: HeuristicDecider,
    notes: Mutex<Vec<String>>,
    drafted: Mutex<bool>,
}

const HASTY_DRAFT: &str = "Thanks for fixing the typo, @octocat! Nice work.\n\nNo tests added.";

impl HastyCommentor {
    fn new() -> Self {
        Self {
            inner: HeuristicDecider::new(),
            notes: Mutex::new(Vec::new()),
            drafted: Mutex::new(false),
        }
    }
}

#[async_trait]
impl Decider for HastyCommentor {
    fn name(&self) -> &'static str {
        "hasty"
    }

    async fn decide(&self, request: &TurnRequest<'_>) -> relay_core::Result<TurnDecision> {
        if request.agent.name == COMMENTOR {
            if let Some(note) = request.handoff_note {
                self.notes.lock().unwrap().push(note.to_string());
            }
            let has_context = !request.state.get(GATHERED_CONTEXTS)?.is_null();
            let mut drafted = self.drafted.lock().unwrap();
            if has_context && !*drafted {
                *drafted = true;
                return Ok(TurnDecision::default()
                    .call(ADD_COMMENT_TO_STATE, json!({ "value": HASTY_DRAFT }))
                    .then_handoff(REVIEWER, "Draft ready"));
            }
        }
        self.inner.decide(request).await
    }
}

#[tokio::test]
async fn test_typo_pr_checklist_rejects_first_draft() {
    let host = Arc::new(FakeHost::with_typo_pr());
    let decider = Arc::new(HastyCommentor::new());
    let workflow = Workflow::pr_review(host.clone(), TurnLimits::default()).unwrap();
    let runner = WorkflowRunner::new(Arc::new(workflow), decider.clone());

    let report = runner.run(1).await;

    // context from the host's own PR and commit records
    let gathered = ReviewContext::from_value(report.state.get(GATHERED_CONTEXTS).unwrap()).unwrap();
    assert_eq!(gathered, typo_pr_context());
    assert_eq!(gathered.pr.author, "octocat");
    assert!(gathered.files[0]
        .patch
        .as_deref()
        .unwrap()
        .contains("+The quick fox"));

    // the reviewer's rejection is the checklist's feedback on the hasty draft
    let checklist = ReviewChecklist::new();
    let rejection = checklist.evaluate(HASTY_DRAFT).feedback().unwrap();
    let notes = decider.notes.lock().unwrap().clone();
    assert!(notes.contains(&rejection), "notes: {:?}", notes);

    let reviews = host.reviews();
    assert_eq!(reviews.len(), 1);
    assert_ne!(reviews[0].body, HASTY_DRAFT);
    assert!(reviews[0].body.contains("No tests added"));
    assert!(checklist.evaluate(&reviews[0].body).is_complete());

    assert_eq!(
        switches(&report.events)
            .into_iter()
            .map(|(name, _)| name)
            .collect::<Vec<_>>(),
        vec![REVIEWER, COMMENTOR, CONTEXT, COMMENTOR, REVIEWER, COMMENTOR, REVIEWER]
    );
    let expected = format!("Posted review {} to PR #1", reviews[0].review_id);
    match report.events.last() {
        Some(WorkflowEvent::RunFinished { output, turns }) => {
            assert_eq!(output, &expected);
            assert_eq!(*turns, 7);
        }
        other => panic!("expected RunFinished, got {:?}", other),
    }
    assert_eq!(
        report.state.get(POSTED_REVIEW).unwrap()["review_id"],
        reviews[0].review_id
    );
}

#[tokio::test]
async fn test_posted_review_survives_failed_turn() {
    let host = Arc::new(FakeHost::with_typo_pr());
    let decider = ScriptedDecider::new()
        .then(
            REVIEWER,
            TurnDecision::default()
                .call(ADD_FINAL_REVIEW_TO_STATE, json!({ "value": REVISED_DRAFT }))
                .call(POST_REVIEW, json!({ "pr_number": 1, "comment": REVISED_DRAFT })),
        )
        .then(REVIEWER, TurnDecision::handoff(CONTEXT, "one more look"));
    let runner = review_runner(host.clone(), decider, 20);

    let report = runner.run(1).await;

    let failure = report.outcome.failure().unwrap();
    assert!(matches!(&failure.error, Error::InvalidHandoff { target, .. } if target == CONTEXT));
    assert_eq!(host.reviews().len(), 1);

    // the post reached the host, so its record is kept; the rest of the turn is not
    let posted = report.state.get(POSTED_REVIEW).unwrap();
    assert_eq!(posted["review_id"], 1001);
    assert_eq!(posted["body"], REVISED_DRAFT);
    assert_eq!(report.state.get_text(FINAL_REVIEW_COMMENT).unwrap(), "");
    assert_eq!(report.turns, 0);
}

#[tokio::test]
async fn test_tool_events_are_paired_in_order() {
    let host = Arc::new(FakeHost::with_typo_pr());
    let runner = review_runner(host, typo_pr_script(), 20);
    let report = runner.run(1).await;

    let mut open: Option<String> = None;
    for event in &report.events {
        match event {
            WorkflowEvent::ToolInvoked { call_id, .. } => {
                assert!(open.is_none(), "tool calls must not overlap");
                open = Some(call_id.clone());
            }
            WorkflowEvent::ToolCompleted { call_id, is_error, .. } => {
                assert_eq!(open.take().as_ref(), Some(call_id));
                assert!(!is_error);
            }
            _ => {}
        }
    }
    assert!(open.is_none());
    assert_eq!(
        invoked(&report.events),
        vec![
            GET_PR_DETAILS,
            GET_COMMIT_DETAILS,
            ADD_CONTEXT_TO_STATE,
            ADD_COMMENT_TO_STATE,
            ADD_COMMENT_TO_STATE,
            ADD_FINAL_REVIEW_TO_STATE,
            POST_REVIEW,
        ]
    );
}

#[tokio::test]
async fn test_turn_numbers_never_skip() {
    let host = Arc::new(FakeHost::with_typo_pr());
    let runner = review_runner(host, typo_pr_script(), 20);
    let report = runner.run(1).await;

    let turns: Vec<u32> = report.events.iter().filter_map(WorkflowEvent::turn).collect();
    for pair in turns.windows(2) {
        assert!(pair[1] == pair[0] || pair[1] == pair[0] + 1, "{:?}", turns);
    }
}

#[tokio::test]
async fn test_missing_pr_fails_without_drafting() {
    let host = Arc::new(FakeHost::new());
    let decider = ScriptedDecider::new()
        .then(REVIEWER, TurnDecision::handoff(COMMENTOR, ""))
        .then(COMMENTOR, TurnDecision::handoff(CONTEXT, ""))
        .then(
            CONTEXT,
            TurnDecision::default().call(GET_PR_DETAILS, json!({ "pr_number": 999 })),
        );
    let runner = review_runner(host.clone(), decider, 20);
    let report = runner.run(999).await;

    let failure = report.outcome.failure().expect("run should fail");
    assert_eq!(failure.agent, CONTEXT);
    assert_eq!(failure.turn, 3);
    assert!(matches!(
        &failure.error,
        Error::ToolExecution { tool, transient: false, .. } if tool == GET_PR_DETAILS
    ));
    assert_eq!(report.state.get_text(DRAFT_COMMENT).unwrap(), "");
    assert!(report.state.get(GATHERED_CONTEXTS).unwrap().is_null());
    assert!(host.reviews().is_empty());
    assert!(matches!(report.events.last(), Some(WorkflowEvent::RunFailed { .. })));
}

#[tokio::test]
async fn test_endless_rejection_hits_turn_ceiling() {
    let host = Arc::new(FakeHost::with_typo_pr());
    let decider = ScriptedDecider::new()
        .repeat(REVIEWER, TurnDecision::handoff(COMMENTOR, "Not good enough"))
        .repeat(
            COMMENTOR,
            TurnDecision::default()
                .call(ADD_COMMENT_TO_STATE, json!({ "value": FIRST_DRAFT }))
                .then_handoff(REVIEWER, "Try again"),
        );
    let runner = review_runner(host.clone(), decider, 4);
    let report = runner.run(1).await;

    let failure = report.outcome.failure().unwrap();
    assert!(matches!(failure.error, Error::TurnLimitExceeded { limit: 4 }));
    assert_eq!(failure.turn, 5);
    assert_eq!(report.turns, 4);
    assert!(host.reviews().is_empty());
    assert!(!invoked(&report.events).iter().any(|n| n == POST_REVIEW));
}

#[tokio::test]
async fn test_out_of_role_tool_never_runs() {
    let host = Arc::new(FakeHost::with_typo_pr());
    let decider = ScriptedDecider::new()
        .then(REVIEWER, TurnDecision::handoff(COMMENTOR, ""))
        .then(
            COMMENTOR,
            TurnDecision::default()
                .call(POST_REVIEW, json!({ "pr_number": 1, "comment": "lgtm" }))
                .then_handoff(REVIEWER, "posted it myself"),
        );
    let runner = review_runner(host.clone(), decider, 20);
    let report = runner.run(1).await;

    let failure = report.outcome.failure().unwrap();
    assert!(matches!(
        &failure.error,
        Error::CapabilityViolation { agent, tool } if agent == COMMENTOR && tool == POST_REVIEW
    ));
    assert!(host.reviews().is_empty());
    assert!(invoked(&report.events).is_empty());
}

#[tokio::test]
async fn test_handoff_outside_allowed_targets() {
    let host = Arc::new(FakeHost::with_typo_pr());
    let decider = ScriptedDecider::new().then(REVIEWER, TurnDecision::handoff(CONTEXT, "skip ahead"));
    let runner = review_runner(host, decider, 20);
    let report = runner.run(1).await;

    let failure = report.outcome.failure().unwrap();
    assert_eq!(failure.agent, REVIEWER);
    assert!(matches!(
        &failure.error,
        Error::InvalidHandoff { target, .. } if target == CONTEXT
    ));
}

#[tokio::test]
async fn test_non_terminal_agent_cannot_finish() {
    let host = Arc::new(FakeHost::with_typo_pr());
    let decider = ScriptedDecider::new()
        .then(REVIEWER, TurnDecision::handoff(COMMENTOR, ""))
        .then(COMMENTOR, TurnDecision::finish("I reviewed it"));
    let runner = review_runner(host, decider, 20);
    let report = runner.run(1).await;

    let failure = report.outcome.failure().unwrap();
    assert!(matches!(
        &failure.error,
        Error::ProtocolViolation { agent, .. } if agent == COMMENTOR
    ));
    assert_eq!(report.turns, 1);
}

#[tokio::test]
async fn test_transient_read_failures_are_retried() {
    let host = Arc::new(FakeHost::with_typo_pr().with_flaky_pr_reads(2));
    let decider = ScriptedDecider::new()
        .then(REVIEWER, TurnDecision::handoff(COMMENTOR, ""))
        .then(COMMENTOR, TurnDecision::handoff(CONTEXT, ""))
        .then(
            CONTEXT,
            TurnDecision::default()
                .call(GET_PR_DETAILS, json!({ "pr_number": 1 }))
                .then_handoff(COMMENTOR, "done"),
        )
        .then(COMMENTOR, TurnDecision::handoff(REVIEWER, ""))
        .then(REVIEWER, TurnDecision::finish("nothing to post"));
    let runner = review_runner(host.clone(), decider, 20);
    let report = runner.run(1).await;

    assert!(report.outcome.is_finished());
    assert_eq!(host.pr_reads(), 3);
    let pr_results: Vec<&Value> = report
        .events
        .iter()
        .filter_map(|e| match e {
            WorkflowEvent::ToolCompleted { name, result, .. } if name == GET_PR_DETAILS => {
                Some(result)
            }
            _ => None,
        })
        .collect();
    assert_eq!(pr_results.len(), 1);
    assert_eq!(pr_results[0]["title"], "Fix typo");
}

#[tokio::test]
async fn test_transient_failure_without_retries_aborts() {
    let host = Arc::new(FakeHost::with_typo_pr().with_flaky_pr_reads(1));
    let decider = ScriptedDecider::new()
        .then(REVIEWER, TurnDecision::handoff(COMMENTOR, ""))
        .then(COMMENTOR, TurnDecision::handoff(CONTEXT, ""))
        .then(
            CONTEXT,
            TurnDecision::default().call(GET_PR_DETAILS, json!({ "pr_number": 1 })),
        );
    let runner = review_runner(host.clone(), decider, 20).with_retry(RetryPolicy::none());
    let report = runner.run(1).await;

    let failure = report.outcome.failure().unwrap();
    assert!(failure.error.is_transient());
    assert_eq!(host.pr_reads(), 1);
}

#[tokio::test]
async fn test_cancel_between_turns() {
    let host = Arc::new(FakeHost::with_typo_pr());
    let runner = review_runner(host.clone(), typo_pr_script(), 20);
    let mut handle = runner.start(1);
    let token = handle.cancel_token();

    while let Some(event) = handle.next_event().await {
        if let WorkflowEvent::AgentSwitched { name, .. } = &event {
            if name == CONTEXT {
                token.cancel();
            }
        }
        if event.is_terminal() {
            break;
        }
    }

    let failure = handle.outcome().and_then(|o| o.failure()).unwrap();
    assert!(matches!(failure.error, Error::Cancelled));
    assert_eq!(failure.agent, CONTEXT);
    assert_eq!(handle.turns(), 2);
    assert!(host.reviews().is_empty());
    assert!(handle.next_event().await.is_none());
}

#[tokio::test]
async fn test_offline_review_end_to_end() {
    let host = Arc::new(FakeHost::with_typo_pr());
    let workflow = Workflow::pr_review(host.clone(), TurnLimits::default()).unwrap();
    let runner = WorkflowRunner::new(Arc::new(workflow), Arc::new(HeuristicDecider::new()));

    let events: Vec<WorkflowEvent> = runner.start(1).into_stream().collect().await;

    let reviews = host.reviews();
    assert_eq!(reviews.len(), 1);
    assert!(ReviewChecklist::new().evaluate(&reviews[0].body).is_complete());
    assert!(reviews[0].body.contains("@octocat"));

    match events.last() {
        Some(WorkflowEvent::RunFinished { output, turns }) => {
            assert_eq!(output, "Posted review 1001 to PR #1");
            assert_eq!(*turns, 5);
        }
        other => panic!("expected RunFinished, got {:?}", other),
    }
    let agents: Vec<String> = switches(&events).into_iter().map(|(n, _)| n).collect();
    assert_eq!(
        agents,
        vec![REVIEWER, COMMENTOR, CONTEXT, COMMENTOR, REVIEWER]
    );
}

#[tokio::test]
async fn test_rerun_reuses_existing_review() {
    let host = Arc::new(FakeHost::with_typo_pr());
    let workflow = Workflow::pr_review(host.clone(), TurnLimits::default()).unwrap();
    let runner = WorkflowRunner::new(Arc::new(workflow), Arc::new(HeuristicDecider::new()));

    let first = runner.run(1).await;
    let second = runner.run(1).await;

    assert!(first.outcome.is_finished());
    assert_eq!(first.outcome.output(), second.outcome.output());
    assert_eq!(host.reviews().len(), 1);
}

#[derive(Deserialize)]
struct LookupArgs {
    key: String,
}

struct LookupTool;

#[async_trait]
impl TypedTool for LookupTool {
    type Args = LookupArgs;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new("lookup", "Look up a key", ToolKind::Read).non_fatal()
    }

    async fn call_typed(
        &self,
        args: LookupArgs,
        _ctx: &mut ToolContext<'_>,
    ) -> Result<Value, ToolError> {
        match args.key.as_str() {
            "known" => Ok(json!("value")),
            other => Err(ToolError::Failed(format!("no entry for '{}'", other))),
        }
    }
}

#[tokio::test]
async fn test_non_fatal_tool_failure_is_reported_to_agent() {
    let workflow = Workflow::builder()
        .agent(AgentSpec::new("solo", "").with_tool("lookup").terminal())
        .root("solo")
        .tools(ToolRegistry::new().with(LookupTool).unwrap())
        .schema(StateSchema::new())
        .build()
        .unwrap();
    let decider = ScriptedDecider::new()
        .then(
            "solo",
            TurnDecision::default().call("lookup", json!({ "key": "missing" })),
        )
        .then("solo", TurnDecision::finish("gave up gracefully"));
    let runner = WorkflowRunner::new(Arc::new(workflow), Arc::new(decider));
    let report = runner.run(1).await;

    assert_eq!(report.outcome.output(), Some("gave up gracefully"));
    let completed = report
        .events
        .iter()
        .find_map(|e| match e {
            WorkflowEvent::ToolCompleted { result, is_error, .. } => Some((result, *is_error)),
            _ => None,
        })
        .unwrap();
    assert!(completed.1);
    assert!(completed.0["error"].as_str().unwrap().contains("missing"));
}

#[tokio::test]
async fn test_reference_roles_expose_expected_tools() {
    let host = Arc::new(FakeHost::new());
    let workflow = Workflow::pr_review(host, TurnLimits::default()).unwrap();
    for role in AgentRole::all() {
        let agent = workflow.agent(role.name()).unwrap();
        let tools: Vec<&str> = agent.tools.iter().map(String::as_str).collect();
        let mut expected = role.tools().to_vec();
        expected.sort_unstable();
        assert_eq!(tools, expected);
    }
}
