//! Decision backend abstraction
//!
//! A [`Decider`] is the black box that plays an agent: a language model, a
//! rule-based policy, or a script. The router hands it a [`TurnRequest`]
//! and gets back a [`TurnDecision`].

use async_trait::async_trait;
use serde_json::Value;

use super::{AgentSpec, ToolCall, TurnDecision};
use crate::state::SharedState;
use crate::tool::ToolDescriptor;
use crate::Result;

/// The sole external input of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInput {
    pub pr_number: u64,
    /// Task statement given to the root agent
    pub prompt: String,
}

impl RunInput {
    /// Input for reviewing a pull request
    pub fn review(pr_number: u64) -> Self {
        Self {
            pr_number,
            prompt: format!("Write a review for PR number {}", pr_number),
        }
    }
}

/// A tool call made earlier in the current turn, with its result
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    pub call: ToolCall,
    pub result: Value,
    /// The tool failed (non-fatal) and `result` holds the error
    pub is_error: bool,
}

/// Everything a backend sees when asked to decide
#[derive(Debug)]
pub struct TurnRequest<'a> {
    pub agent: &'a AgentSpec,
    /// Turn number, 1-based
    pub turn: u32,
    /// Decision step within the turn, 1-based
    pub step: u32,
    pub input: &'a RunInput,
    /// Reason given by the agent that handed off to this one
    pub handoff_note: Option<&'a str>,
    /// State as staged for this turn
    pub state: &'a SharedState,
    /// Tools the agent may call
    pub tools: &'a [ToolDescriptor],
    /// Tool calls already made in this turn
    pub steps: &'a [StepRecord],
}

impl TurnRequest<'_> {
    /// Result of the most recent successful call to `tool` in this turn
    pub fn result_of(&self, tool: &str) -> Option<&Value> {
        self.steps
            .iter()
            .rev()
            .find(|s| s.call.name == tool && !s.is_error)
            .map(|s| &s.result)
    }

    /// All successful results of `tool` in this turn, in call order
    pub fn results_of<'s>(&'s self, tool: &'s str) -> impl Iterator<Item = &'s Value> + 's {
        self.steps
            .iter()
            .filter(move |s| s.call.name == tool && !s.is_error)
            .map(|s| &s.result)
    }
}

/// Trait for agent decision backends
#[async_trait]
pub trait Decider: Send + Sync {
    /// Get the name of this backend
    fn name(&self) -> &'static str;

    /// Decide the next step for the agent in `request`
    async fn decide(&self, request: &TurnRequest<'_>) -> Result<TurnDecision>;
}
