//! The handoff router: a state machine over agent names
//!
//! Each call to [`Router::run_turn`] executes exactly one turn of the active
//! agent. A turn may span several decision steps: a decision that only makes
//! tool calls has its results fed back to the same agent, which decides
//! again, until a decision carries a handoff or a final output. Tools run
//! against a staged copy of the shared state which replaces the committed
//! state only when the turn ends cleanly. The one exception is a tool marked
//! external: once it succeeds, the fields it wrote are published to the
//! committed state at once, since its effect cannot be taken back.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::{Workflow, WorkflowEvent};
use crate::agent::{AgentSpec, Decider, RunInput, StepRecord, TurnAction, TurnDecision, TurnRequest};
use crate::state::SharedState;
use crate::tool::{ToolContext, ToolRegistry};
use crate::{Error, Result};

/// Executes a tool call on behalf of the router
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(&self, name: &str, args: Value, ctx: &mut ToolContext<'_>) -> Result<Value>;
}

#[async_trait]
impl ToolInvoker for ToolRegistry {
    async fn invoke(&self, name: &str, args: Value, ctx: &mut ToolContext<'_>) -> Result<Value> {
        ToolRegistry::invoke(self, name, args, ctx).await
    }
}

/// Where the router is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterState {
    /// This agent takes the next turn
    Active { agent: String },
    /// A terminal agent finished the run
    Terminated { output: String },
}

/// How a completed turn ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Handoff { from: String, to: String },
    Finished { output: String },
}

/// Handoff state machine for one run
#[derive(Debug, Clone)]
pub struct Router {
    state: RouterState,
    turns_completed: u32,
    handoff_note: Option<String>,
}

impl Router {
    /// Create a router positioned at the workflow's root
    pub fn new(workflow: &Workflow) -> Self {
        Self {
            state: RouterState::Active {
                agent: workflow.root().to_string(),
            },
            turns_completed: 0,
            handoff_note: None,
        }
    }

    pub fn state(&self) -> &RouterState {
        &self.state
    }

    /// The agent holding control, if the run has not terminated
    pub fn current_agent(&self) -> Option<&str> {
        match &self.state {
            RouterState::Active { agent } => Some(agent),
            RouterState::Terminated { .. } => None,
        }
    }

    pub fn turns_completed(&self) -> u32 {
        self.turns_completed
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self.state, RouterState::Terminated { .. })
    }

    /// Execute one turn of the active agent
    ///
    /// On success `state` holds the turn's writes. On error it is untouched
    /// and the router stays where it was.
    pub async fn run_turn(
        &mut self,
        workflow: &Workflow,
        decider: &dyn Decider,
        invoker: &dyn ToolInvoker,
        input: &RunInput,
        state: &mut SharedState,
        events: &mut Vec<WorkflowEvent>,
    ) -> Result<TurnOutcome> {
        let agent_name = match &self.state {
            RouterState::Active { agent } => agent.clone(),
            RouterState::Terminated { .. } => {
                return Err(Error::InvalidWorkflow(
                    "run has already terminated".to_string(),
                ))
            }
        };

        let limits = workflow.limits();
        if self.turns_completed >= limits.max_turns {
            warn!(limit = limits.max_turns, agent = %agent_name, "Turn limit reached");
            return Err(Error::TurnLimitExceeded {
                limit: limits.max_turns,
            });
        }

        let agent = workflow.agent(&agent_name).ok_or_else(|| {
            Error::InvalidWorkflow(format!("active agent '{}' is not defined", agent_name))
        })?;
        let turn = self.turns_completed + 1;
        let tools = workflow
            .tools()
            .descriptors(agent.tools.iter().map(String::as_str));

        let mut staged = state.clone();
        let mut steps: Vec<StepRecord> = Vec::new();

        for step in 1..=limits.max_steps_per_turn {
            let decision = {
                let request = TurnRequest {
                    agent,
                    turn,
                    step,
                    input,
                    handoff_note: self.handoff_note.as_deref(),
                    state: &staged,
                    tools: &tools,
                    steps: &steps,
                };
                decider.decide(&request).await?
            };
            debug!(
                agent = %agent.name,
                turn,
                step,
                calls = decision.tool_calls.len(),
                action = ?decision.action,
                "Agent decided"
            );

            validate_decision(workflow, agent, &decision)?;

            for call in decision.tool_calls {
                events.push(WorkflowEvent::ToolInvoked {
                    agent: agent.name.clone(),
                    turn,
                    call_id: call.id.clone(),
                    name: call.name.clone(),
                    args: call.args.clone(),
                });

                let (fatal, external) = workflow
                    .tools()
                    .descriptor(&call.name)
                    .map(|d| (d.fatal, d.external))
                    .unwrap_or((true, false));
                let before = external.then(|| staged.clone());
                let outcome = {
                    let mut ctx = ToolContext {
                        state: &mut staged,
                        agent: &agent.name,
                        turn,
                    };
                    invoker.invoke(&call.name, call.args.clone(), &mut ctx).await
                };

                let (result, is_error) = match outcome {
                    Ok(value) => {
                        if let Some(before) = &before {
                            publish(before, &staged, state)?;
                        }
                        (value, false)
                    }
                    Err(Error::ToolExecution { message, .. }) if !fatal => {
                        warn!(tool = %call.name, agent = %agent.name, error = %message, "Non-fatal tool failed");
                        (json!({ "error": message }), true)
                    }
                    Err(e) => return Err(e),
                };

                events.push(WorkflowEvent::ToolCompleted {
                    agent: agent.name.clone(),
                    turn,
                    call_id: call.id.clone(),
                    name: call.name.clone(),
                    result: result.clone(),
                    is_error,
                });
                steps.push(StepRecord {
                    call,
                    result,
                    is_error,
                });
            }

            let Some(action) = decision.action else {
                continue;
            };

            *state = staged;
            self.turns_completed = turn;

            return Ok(match action {
                TurnAction::Handoff { target, reason } => {
                    info!(from = %agent.name, to = %target, turn, "Handoff");
                    events.push(WorkflowEvent::AgentSwitched {
                        name: target.clone(),
                        turn: turn + 1,
                    });
                    self.state = RouterState::Active {
                        agent: target.clone(),
                    };
                    self.handoff_note = Some(reason).filter(|r| !r.is_empty());
                    TurnOutcome::Handoff {
                        from: agent.name.clone(),
                        to: target,
                    }
                }
                TurnAction::Finish { output } => {
                    info!(agent = %agent.name, turn, "Run finished");
                    self.state = RouterState::Terminated {
                        output: output.clone(),
                    };
                    self.handoff_note = None;
                    TurnOutcome::Finished { output }
                }
            });
        }

        Err(Error::ProtocolViolation {
            agent: agent.name.clone(),
            reason: format!(
                "turn did not end within {} decision steps",
                limits.max_steps_per_turn
            ),
        })
    }
}

/// Copy the fields an external call changed into the committed state
///
/// The outside world already saw the effect, so the record of it must
/// survive even if a later step of the turn fails.
fn publish(before: &SharedState, staged: &SharedState, committed: &mut SharedState) -> Result<()> {
    for (field, value) in staged.iter() {
        if before.get(field)? != value {
            debug!(field, "Publishing external tool write");
            committed.set(field, value.clone())?;
        }
    }
    Ok(())
}

/// Reject a decision before any of its tools run
fn validate_decision(workflow: &Workflow, agent: &AgentSpec, decision: &TurnDecision) -> Result<()> {
    if decision.is_empty() {
        return Err(Error::ProtocolViolation {
            agent: agent.name.clone(),
            reason: "decision has no tool calls, handoff or final output".to_string(),
        });
    }

    if let Some(call) = decision.tool_calls.iter().find(|c| !agent.can_call(&c.name)) {
        warn!(agent = %agent.name, tool = %call.name, "Capability violation");
        return Err(Error::CapabilityViolation {
            agent: agent.name.clone(),
            tool: call.name.clone(),
        });
    }

    match &decision.action {
        Some(TurnAction::Handoff { target, .. })
            if !agent.can_reach(target) || workflow.agent(target).is_none() =>
        {
            Err(Error::InvalidHandoff {
                agent: agent.name.clone(),
                target: target.clone(),
            })
        }
        Some(TurnAction::Finish { .. }) if !agent.terminal => Err(Error::ProtocolViolation {
            agent: agent.name.clone(),
            reason: "only a terminal agent may finish the run".to_string(),
        }),
        _ => Ok(()),
    }
}
