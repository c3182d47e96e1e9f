//! Drives a workflow from the root agent to a final output
//!
//! [`WorkflowRunner`] owns a validated [`Workflow`] and a [`Decider`]. Every
//! call to [`WorkflowRunner::start`] creates an independent [`RunHandle`]
//! with fresh shared state; the handle yields [`WorkflowEvent`]s in order
//! and ends with exactly one `RunFinished` or `RunFailed`.

use std::collections::VecDeque;
use std::sync::Arc;

use futures::stream::{self, Stream};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::{
    EventHandler, RetryPolicy, RetryingInvoker, Router, TurnOutcome, Workflow, WorkflowEvent,
};
use crate::agent::{Decider, RunInput};
use crate::error::RunFailure;
use crate::state::SharedState;
use crate::Error;

/// How a run ended
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Finished { output: String },
    Failed(Arc<RunFailure>),
}

impl RunOutcome {
    pub fn is_finished(&self) -> bool {
        matches!(self, RunOutcome::Finished { .. })
    }

    /// Final output of a successful run
    pub fn output(&self) -> Option<&str> {
        match self {
            RunOutcome::Finished { output } => Some(output),
            RunOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&RunFailure> {
        match self {
            RunOutcome::Finished { .. } => None,
            RunOutcome::Failed(failure) => Some(failure),
        }
    }
}

/// Everything a finished run leaves behind
#[derive(Debug)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Every event in emission order
    pub events: Vec<WorkflowEvent>,
    /// Committed shared state at the end of the run
    pub state: SharedState,
    /// Turns that completed
    pub turns: u32,
}

/// Executes runs of one workflow
pub struct WorkflowRunner {
    workflow: Arc<Workflow>,
    decider: Arc<dyn Decider>,
    retry: RetryPolicy,
}

impl WorkflowRunner {
    pub fn new(workflow: Arc<Workflow>, decider: Arc<dyn Decider>) -> Self {
        Self {
            workflow,
            decider,
            retry: RetryPolicy::default(),
        }
    }

    /// Set the retry policy for retryable tools
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// Start a review run for a pull request
    pub fn start(&self, pr_number: u64) -> RunHandle {
        self.start_with_input(RunInput::review(pr_number))
    }

    /// Start a run with an explicit input
    pub fn start_with_input(&self, input: RunInput) -> RunHandle {
        self.start_with_cancellation(input, CancellationToken::new())
    }

    /// Start a run that stops at the next turn boundary once `cancel` fires
    pub fn start_with_cancellation(&self, input: RunInput, cancel: CancellationToken) -> RunHandle {
        info!(
            pr_number = input.pr_number,
            root = %self.workflow.root(),
            decider = self.decider.name(),
            "Starting run"
        );
        RunHandle {
            router: Router::new(&self.workflow),
            state: SharedState::new(self.workflow.schema()),
            workflow: self.workflow.clone(),
            decider: self.decider.clone(),
            retry: self.retry.clone(),
            input,
            pending: VecDeque::new(),
            log: Vec::new(),
            started: false,
            outcome: None,
            cancel,
        }
    }

    /// Run a review to completion and collect the report
    pub async fn run(&self, pr_number: u64) -> RunReport {
        self.start(pr_number).finish().await
    }
}

impl std::fmt::Debug for WorkflowRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowRunner")
            .field("workflow", &self.workflow)
            .field("decider", &self.decider.name())
            .field("retry", &self.retry)
            .finish()
    }
}

/// One in-flight run
pub struct RunHandle {
    workflow: Arc<Workflow>,
    decider: Arc<dyn Decider>,
    retry: RetryPolicy,
    router: Router,
    state: SharedState,
    input: RunInput,
    pending: VecDeque<WorkflowEvent>,
    log: Vec<WorkflowEvent>,
    started: bool,
    outcome: Option<RunOutcome>,
    cancel: CancellationToken,
}

impl RunHandle {
    /// Next event, or `None` once the terminal event has been returned
    ///
    /// Turns execute lazily: each call runs at most one turn.
    pub async fn next_event(&mut self) -> Option<WorkflowEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                self.log.push(event.clone());
                return Some(event);
            }
            if self.outcome.is_some() {
                return None;
            }
            self.advance().await;
        }
    }

    async fn advance(&mut self) {
        if !self.started {
            self.started = true;
            self.pending.push_back(WorkflowEvent::AgentSwitched {
                name: self.workflow.root().to_string(),
                turn: 1,
            });
            return;
        }

        if self.cancel.is_cancelled() {
            self.fail(Error::Cancelled);
            return;
        }

        let invoker = RetryingInvoker::new(self.workflow.tools(), &self.retry);
        let mut events = Vec::new();
        let result = self
            .router
            .run_turn(
                &self.workflow,
                self.decider.as_ref(),
                &invoker,
                &self.input,
                &mut self.state,
                &mut events,
            )
            .await;
        self.pending.extend(events);

        match result {
            Ok(TurnOutcome::Handoff { .. }) => {}
            Ok(TurnOutcome::Finished { output }) => {
                let turns = self.router.turns_completed();
                info!(turns, "Run completed");
                self.pending.push_back(WorkflowEvent::RunFinished {
                    output: output.clone(),
                    turns,
                });
                self.outcome = Some(RunOutcome::Finished { output });
            }
            Err(e) => self.fail(e),
        }
    }

    fn fail(&mut self, error: Error) {
        let failure = Arc::new(RunFailure {
            agent: self
                .router
                .current_agent()
                .unwrap_or(self.workflow.root())
                .to_string(),
            turn: self.router.turns_completed() + 1,
            error,
        });
        error!(agent = %failure.agent, turn = failure.turn, error = %failure.error, "Run failed");
        self.pending.push_back(WorkflowEvent::RunFailed {
            failure: failure.clone(),
        });
        self.outcome = Some(RunOutcome::Failed(failure));
    }

    /// Committed shared state
    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Events returned so far
    pub fn events(&self) -> &[WorkflowEvent] {
        &self.log
    }

    /// Outcome, once the run has ended
    pub fn outcome(&self) -> Option<&RunOutcome> {
        self.outcome.as_ref()
    }

    pub fn turns(&self) -> u32 {
        self.router.turns_completed()
    }

    /// Token that cancels this run at the next turn boundary
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Feed every remaining event to `handler` and return the outcome
    pub async fn drive<H: EventHandler + ?Sized>(&mut self, handler: &mut H) -> RunOutcome {
        loop {
            if let (Some(outcome), true) = (&self.outcome, self.pending.is_empty()) {
                return outcome.clone();
            }
            if let Some(event) = self.next_event().await {
                handler.handle(&event);
            }
        }
    }

    /// Run to the end and collect the report
    pub async fn finish(mut self) -> RunReport {
        let outcome = self.drive(&mut NoopHandler).await;
        RunReport {
            outcome,
            turns: self.router.turns_completed(),
            events: self.log,
            state: self.state,
        }
    }

    /// Consume the handle as a stream of events
    pub fn into_stream(self) -> impl Stream<Item = WorkflowEvent> + Send {
        stream::unfold(self, |mut handle| async move {
            handle.next_event().await.map(|event| (event, handle))
        })
    }
}

struct NoopHandler;

impl EventHandler for NoopHandler {
    fn on_finished(&mut self, _output: &str, _turns: u32) {}

    fn on_failed(&mut self, _failure: &RunFailure) {}
}
