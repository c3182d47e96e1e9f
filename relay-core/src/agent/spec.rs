//! Agent definitions

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A role in the workflow: what it may call and whom it may hand off to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Unique name, also the router state for this agent
    pub name: String,
    /// One-line summary shown to peers
    pub description: String,
    /// Instruction profile given to the decision backend
    pub instructions: String,
    /// Tools this agent may call
    pub tools: BTreeSet<String>,
    /// Agents this agent may hand control to
    pub handoffs: BTreeSet<String>,
    /// Whether this agent's final output ends the run
    pub terminal: bool,
}

impl AgentSpec {
    /// Create an agent with no tools, no peers and empty instructions
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            instructions: String::new(),
            tools: BTreeSet::new(),
            handoffs: BTreeSet::new(),
            terminal: false,
        }
    }

    /// Set the instruction profile
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Permit a tool
    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tools.insert(tool.into());
        self
    }

    /// Permit several tools
    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools.extend(tools.into_iter().map(Into::into));
        self
    }

    /// Permit a handoff target
    pub fn can_handoff_to(mut self, target: impl Into<String>) -> Self {
        self.handoffs.insert(target.into());
        self
    }

    /// Let this agent's final output end the run
    pub fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }

    /// Check whether the agent may call a tool
    pub fn can_call(&self, tool: &str) -> bool {
        self.tools.contains(tool)
    }

    /// Check whether the agent may hand off to a peer
    pub fn can_reach(&self, target: &str) -> bool {
        self.handoffs.contains(target)
    }
}
