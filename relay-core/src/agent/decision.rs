//! Structured turn decisions
//!
//! A decision backend never returns prose for the router to interpret; it
//! returns a [`TurnDecision`]: the tool calls to make, and optionally the
//! action that ends the turn.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request to run one tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier for correlating the call with its result
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
        }
    }
}

/// The action that ends a turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnAction {
    /// Pass control to a peer agent
    Handoff {
        target: String,
        /// Note for the receiving agent
        #[serde(default)]
        reason: String,
    },
    /// End the run with this output
    Finish { output: String },
}

/// What an agent wants to do in one decision step
///
/// With `action == None` the decision is an intermediate step: its tool
/// results are fed back and the same agent decides again.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnDecision {
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub action: Option<TurnAction>,
}

impl TurnDecision {
    /// A decision that only hands off
    pub fn handoff(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::default().then_handoff(target, reason)
    }

    /// A decision that only finishes
    pub fn finish(output: impl Into<String>) -> Self {
        Self::default().then_finish(output)
    }

    /// Add a tool call; its id is derived from its position
    pub fn call(mut self, name: impl Into<String>, args: Value) -> Self {
        let id = format!("call_{}", self.tool_calls.len() + 1);
        self.tool_calls.push(ToolCall::new(id, name, args));
        self
    }

    /// End the turn with a handoff
    pub fn then_handoff(mut self, target: impl Into<String>, reason: impl Into<String>) -> Self {
        self.action = Some(TurnAction::Handoff {
            target: target.into(),
            reason: reason.into(),
        });
        self
    }

    /// End the run with output
    pub fn then_finish(mut self, output: impl Into<String>) -> Self {
        self.action = Some(TurnAction::Finish {
            output: output.into(),
        });
        self
    }

    /// Whether this decision leaves the turn open
    pub fn is_step(&self) -> bool {
        self.action.is_none()
    }

    /// Whether the decision asks for nothing at all
    pub fn is_empty(&self) -> bool {
        self.tool_calls.is_empty() && self.action.is_none()
    }
}
