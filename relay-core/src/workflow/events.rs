//! Events emitted while a run executes

use std::sync::Arc;

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::RunFailure;

/// Observable step of a run, in emission order
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// An agent became active
    AgentSwitched {
        name: String,
        /// Turn the agent is about to take
        turn: u32,
    },

    /// A tool is about to run
    ToolInvoked {
        agent: String,
        turn: u32,
        call_id: String,
        name: String,
        args: Value,
    },

    /// A tool returned
    ToolCompleted {
        agent: String,
        turn: u32,
        call_id: String,
        name: String,
        result: Value,
        /// A non-fatal tool failed; `result` carries the error
        is_error: bool,
    },

    /// The terminal agent produced its final output
    RunFinished { output: String, turns: u32 },

    /// The run aborted
    RunFailed {
        #[serde(serialize_with = "serialize_failure")]
        failure: Arc<RunFailure>,
    },
}

fn serialize_failure<S: Serializer>(failure: &Arc<RunFailure>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&failure.to_string())
}

impl WorkflowEvent {
    /// Whether this event ends the stream
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowEvent::RunFinished { .. } | WorkflowEvent::RunFailed { .. }
        )
    }

    /// Turn this event belongs to, if any
    pub fn turn(&self) -> Option<u32> {
        match self {
            WorkflowEvent::AgentSwitched { turn, .. }
            | WorkflowEvent::ToolInvoked { turn, .. }
            | WorkflowEvent::ToolCompleted { turn, .. } => Some(*turn),
            WorkflowEvent::RunFinished { turns, .. } => Some(*turns),
            WorkflowEvent::RunFailed { failure } => Some(failure.turn),
        }
    }
}

/// Callbacks for consuming a run's events
pub trait EventHandler: Send {
    /// Called when an agent becomes active
    fn on_agent_switched(&mut self, _name: &str, _turn: u32) {}

    /// Called before a tool runs
    fn on_tool_invoked(&mut self, _agent: &str, _name: &str, _args: &Value) {}

    /// Called after a tool returns
    fn on_tool_completed(&mut self, _agent: &str, _name: &str, _result: &Value, _is_error: bool) {}

    /// Called once with the final output
    fn on_finished(&mut self, output: &str, turns: u32);

    /// Called once if the run aborts
    fn on_failed(&mut self, failure: &RunFailure);

    /// Route an event to the matching callback
    fn handle(&mut self, event: &WorkflowEvent) {
        match event {
            WorkflowEvent::AgentSwitched { name, turn } => self.on_agent_switched(name, *turn),
            WorkflowEvent::ToolInvoked {
                agent, name, args, ..
            } => self.on_tool_invoked(agent, name, args),
            WorkflowEvent::ToolCompleted {
                agent,
                name,
                result,
                is_error,
                ..
            } => self.on_tool_completed(agent, name, result, *is_error),
            WorkflowEvent::RunFinished { output, turns } => self.on_finished(output, *turns),
            WorkflowEvent::RunFailed { failure } => self.on_failed(failure),
        }
    }
}
