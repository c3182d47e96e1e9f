//! Agents: role definitions, decisions and the backends that make them

mod backend;
pub mod backends;
mod decision;
mod prompts;
mod roles;
mod spec;

pub use backend::{Decider, RunInput, StepRecord, TurnRequest};
pub use backends::{ChatCompletionsDecider, HeuristicDecider, ScriptedDecider};
pub use decision::{ToolCall, TurnAction, TurnDecision};
pub use prompts::{get_template, render, PromptContext};
pub use roles::{reference_agents, AgentRole};
pub use spec::AgentSpec;
