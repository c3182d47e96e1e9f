//! Replays queued decisions per agent

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::agent::{Decider, TurnDecision, TurnRequest};
use crate::{Error, Result};

/// Where a decision was requested
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionRequestLog {
    pub agent: String,
    pub turn: u32,
    pub step: u32,
}

/// Decider that pops pre-recorded decisions from a queue per agent
///
/// When an agent's queue is empty its repeat decision is used, if one was
/// set; otherwise the run fails with [`Error::Decision`].
#[derive(Debug, Default)]
pub struct ScriptedDecider {
    queues: Mutex<HashMap<String, VecDeque<TurnDecision>>>,
    repeats: HashMap<String, TurnDecision>,
    log: Mutex<Vec<DecisionRequestLog>>,
}

impl ScriptedDecider {
    /// Create a decider with no scripted decisions
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a decision for an agent
    pub fn then(mut self, agent: impl Into<String>, decision: TurnDecision) -> Self {
        self.queues
            .get_mut()
            .entry(agent.into())
            .or_default()
            .push_back(decision);
        self
    }

    /// Answer with `decision` whenever the agent's queue is empty
    pub fn repeat(mut self, agent: impl Into<String>, decision: TurnDecision) -> Self {
        self.repeats.insert(agent.into(), decision);
        self
    }

    /// Every decision request seen so far
    pub async fn requests(&self) -> Vec<DecisionRequestLog> {
        self.log.lock().await.clone()
    }

    /// Decisions still queued across all agents
    pub async fn remaining(&self) -> usize {
        self.queues.lock().await.values().map(VecDeque::len).sum()
    }
}

#[async_trait]
impl Decider for ScriptedDecider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn decide(&self, request: &TurnRequest<'_>) -> Result<TurnDecision> {
        let agent = request.agent.name.as_str();
        self.log.lock().await.push(DecisionRequestLog {
            agent: agent.to_string(),
            turn: request.turn,
            step: request.step,
        });

        let queued = self
            .queues
            .lock()
            .await
            .get_mut(agent)
            .and_then(VecDeque::pop_front);

        queued
            .or_else(|| self.repeats.get(agent).cloned())
            .ok_or_else(|| Error::Decision(format!("no scripted decision left for agent '{}'", agent)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentSpec, RunInput};
    use crate::state::{SharedState, StateSchema};

    async fn ask(decider: &ScriptedDecider, agent: &AgentSpec, turn: u32) -> Result<TurnDecision> {
        let input = RunInput::review(1);
        let state = SharedState::new(&StateSchema::pr_review());
        let request = TurnRequest {
            agent,
            turn,
            step: 1,
            input: &input,
            handoff_note: None,
            state: &state,
            tools: &[],
            steps: &[],
        };
        decider.decide(&request).await
    }

    #[tokio::test]
    async fn test_queue_then_repeat_then_exhausted() {
        let a = AgentSpec::new("a", "");
        let b = AgentSpec::new("b", "");
        let decider = ScriptedDecider::new()
            .then("a", TurnDecision::handoff("b", "first"))
            .repeat("a", TurnDecision::handoff("b", "again"));

        assert_eq!(
            ask(&decider, &a, 1).await.unwrap(),
            TurnDecision::handoff("b", "first")
        );
        assert_eq!(
            ask(&decider, &a, 3).await.unwrap(),
            TurnDecision::handoff("b", "again")
        );
        assert!(matches!(
            ask(&decider, &b, 2).await,
            Err(Error::Decision(_))
        ));

        let seen = decider.requests().await;
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2].agent, "b");
        assert_eq!(decider.remaining().await, 0);
    }
}
