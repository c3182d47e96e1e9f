//! Workflow definition, the handoff router and the run driver
//!
//! A [`Workflow`] is the validated, immutable description of a multi-agent
//! system: its agents, the root, the tool registry, the state schema and the
//! turn limits. [`WorkflowRunner`] executes it, one fresh [`RunHandle`] per
//! run.

mod events;
mod retry;
mod router;
mod runner;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::agent::{reference_agents, AgentRole, AgentSpec};
use crate::review::ReviewChecklist;
use crate::state::StateSchema;
use crate::tool::{
    CodeHost, GetCommitDetailsTool, GetPrDetailsTool, PostReviewTool, SetFieldTool, ToolRegistry,
};
use crate::{Error, Result};

pub use events::{EventHandler, WorkflowEvent};
pub use retry::{RetryPolicy, RetryingInvoker};
pub use router::{Router, RouterState, ToolInvoker, TurnOutcome};
pub use runner::{RunHandle, RunOutcome, RunReport, WorkflowRunner};

/// Bounds on a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnLimits {
    /// Turn ceiling for a whole run
    pub max_turns: u32,
    /// Decision steps allowed within one turn
    pub max_steps_per_turn: u32,
}

impl Default for TurnLimits {
    fn default() -> Self {
        Self {
            max_turns: 20,
            max_steps_per_turn: 8,
        }
    }
}

/// A validated multi-agent workflow
#[derive(Debug)]
pub struct Workflow {
    agents: BTreeMap<String, AgentSpec>,
    root: String,
    tools: ToolRegistry,
    schema: StateSchema,
    limits: TurnLimits,
}

impl Workflow {
    /// Start building a workflow
    pub fn builder() -> WorkflowBuilder {
        WorkflowBuilder::default()
    }

    /// The PR review workflow: context, commentor and review-and-posting agents
    pub fn pr_review(host: Arc<dyn CodeHost>, limits: TurnLimits) -> Result<Self> {
        let tools = pr_review_tools(host)?;
        let agents = reference_agents(&tools, &ReviewChecklist::new());
        agents
            .into_iter()
            .fold(Workflow::builder(), WorkflowBuilder::agent)
            .root(AgentRole::ReviewAndPosting.name())
            .tools(tools)
            .schema(StateSchema::pr_review())
            .limits(limits)
            .build()
    }

    pub fn agent(&self, name: &str) -> Option<&AgentSpec> {
        self.agents.get(name)
    }

    /// Agent names, sorted
    pub fn agent_names(&self) -> impl Iterator<Item = &str> {
        self.agents.keys().map(String::as_str)
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn schema(&self) -> &StateSchema {
        &self.schema
    }

    pub fn limits(&self) -> TurnLimits {
        self.limits
    }
}

/// Registry with the six PR review tools
pub fn pr_review_tools(host: Arc<dyn CodeHost>) -> Result<ToolRegistry> {
    ToolRegistry::new()
        .with(GetPrDetailsTool::new(host.clone()))?
        .with(GetCommitDetailsTool::new(host.clone()))?
        .with(SetFieldTool::context())?
        .with(SetFieldTool::draft_comment())?
        .with(SetFieldTool::final_review())?
        .with(PostReviewTool::new(host))
}

/// Builder for [`Workflow`]; all validation happens in [`build`](Self::build)
#[derive(Debug, Default)]
pub struct WorkflowBuilder {
    agents: Vec<AgentSpec>,
    root: Option<String>,
    tools: ToolRegistry,
    schema: StateSchema,
    limits: TurnLimits,
}

impl WorkflowBuilder {
    /// Add an agent
    pub fn agent(mut self, spec: AgentSpec) -> Self {
        self.agents.push(spec);
        self
    }

    /// Set the agent that takes the first turn
    pub fn root(mut self, name: impl Into<String>) -> Self {
        self.root = Some(name.into());
        self
    }

    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn schema(mut self, schema: StateSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn limits(mut self, limits: TurnLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Validate and freeze the workflow
    ///
    /// Checks that agent names are unique, the root exists, every agent's
    /// tools are registered and every handoff target exists. When no agent is
    /// flagged terminal the root becomes terminal. Agents that can neither
    /// hand off nor finish are rejected.
    pub fn build(self) -> Result<Workflow> {
        if self.limits.max_turns == 0 || self.limits.max_steps_per_turn == 0 {
            return Err(Error::InvalidWorkflow(
                "max_turns and max_steps_per_turn must be at least 1".to_string(),
            ));
        }
        self.schema.validate()?;

        let mut agents = BTreeMap::new();
        for spec in self.agents {
            if spec.name.trim().is_empty() {
                return Err(Error::InvalidWorkflow("agent name is empty".to_string()));
            }
            if agents.contains_key(&spec.name) {
                return Err(Error::InvalidWorkflow(format!(
                    "duplicate agent name '{}'",
                    spec.name
                )));
            }
            agents.insert(spec.name.clone(), spec);
        }
        if agents.is_empty() {
            return Err(Error::InvalidWorkflow("workflow has no agents".to_string()));
        }

        let root = self
            .root
            .ok_or_else(|| Error::InvalidWorkflow("no root agent set".to_string()))?;
        if !agents.contains_key(&root) {
            return Err(Error::InvalidWorkflow(format!(
                "root agent '{}' is not defined",
                root
            )));
        }

        for spec in agents.values() {
            if let Some(tool) = spec.tools.iter().find(|t| !self.tools.contains(t)) {
                return Err(Error::UnknownTool { name: tool.clone() });
            }
            if let Some(target) = spec.handoffs.iter().find(|t| !agents.contains_key(*t)) {
                return Err(Error::InvalidHandoff {
                    agent: spec.name.clone(),
                    target: target.clone(),
                });
            }
        }

        if !agents.values().any(|a| a.terminal) {
            if let Some(spec) = agents.get_mut(&root) {
                spec.terminal = true;
            }
        }

        if let Some(stuck) = agents
            .values()
            .find(|a| a.handoffs.is_empty() && !a.terminal)
        {
            return Err(Error::InvalidWorkflow(format!(
                "agent '{}' can neither hand off nor finish",
                stuck.name
            )));
        }

        let reachable = reachable_from(&agents, &root);
        for name in agents.keys().filter(|n| !reachable.contains(n.as_str())) {
            warn!(agent = %name, "Agent is unreachable from the root");
        }

        debug!(
            root = %root,
            agents = agents.len(),
            tools = self.tools.len(),
            "Workflow validated"
        );

        Ok(Workflow {
            agents,
            root,
            tools: self.tools,
            schema: self.schema,
            limits: self.limits,
        })
    }
}

fn reachable_from<'a>(agents: &'a BTreeMap<String, AgentSpec>, root: &'a str) -> BTreeSet<&'a str> {
    let mut seen = BTreeSet::new();
    let mut stack = vec![root];
    while let Some(name) = stack.pop() {
        if !seen.insert(name) {
            continue;
        }
        if let Some(spec) = agents.get(name) {
            stack.extend(spec.handoffs.iter().map(String::as_str));
        }
    }
    seen
}
