//! The three reference roles of the PR review workflow

use std::fmt;

use serde::{Deserialize, Serialize};

use super::prompts::{self, PromptContext};
use super::AgentSpec;
use crate::review::ReviewChecklist;
use crate::tool::{
    ToolRegistry, ADD_COMMENT_TO_STATE, ADD_CONTEXT_TO_STATE, ADD_FINAL_REVIEW_TO_STATE,
    GET_COMMIT_DETAILS, GET_PR_DETAILS, POST_REVIEW,
};

/// Reference agent roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Gathers PR details and changed files
    Context,
    /// Drafts the review comment
    Commentor,
    /// Checks the draft, then posts it (root, terminal)
    ReviewAndPosting,
}

impl AgentRole {
    /// Get all roles
    pub fn all() -> &'static [AgentRole] {
        &[
            AgentRole::Context,
            AgentRole::Commentor,
            AgentRole::ReviewAndPosting,
        ]
    }

    /// Agent name used as the router state
    pub fn name(&self) -> &'static str {
        match self {
            AgentRole::Context => "ContextAgent",
            AgentRole::Commentor => "CommentorAgent",
            AgentRole::ReviewAndPosting => "ReviewAndPostingAgent",
        }
    }

    /// Get a description of what this role does
    pub fn description(&self) -> &'static str {
        match self {
            AgentRole::Context => {
                "Gathers all the needed context about the PR: details and changed files"
            }
            AgentRole::Commentor => {
                "Uses the gathered context to draft a PR review comment"
            }
            AgentRole::ReviewAndPosting => {
                "Reviews the draft comment, sends it back if deficient, and posts it to GitHub"
            }
        }
    }

    /// Tools this role may call
    pub fn tools(&self) -> &'static [&'static str] {
        match self {
            AgentRole::Context => &[GET_PR_DETAILS, GET_COMMIT_DETAILS, ADD_CONTEXT_TO_STATE],
            AgentRole::Commentor => &[ADD_COMMENT_TO_STATE],
            AgentRole::ReviewAndPosting => &[ADD_FINAL_REVIEW_TO_STATE, POST_REVIEW],
        }
    }

    /// Roles this role may hand off to
    pub fn handoffs(&self) -> &'static [AgentRole] {
        match self {
            AgentRole::Context => &[AgentRole::Commentor],
            AgentRole::Commentor => &[AgentRole::Context, AgentRole::ReviewAndPosting],
            AgentRole::ReviewAndPosting => &[AgentRole::Commentor],
        }
    }

    /// Whether this role starts the run and may finish it
    pub fn is_root(&self) -> bool {
        matches!(self, AgentRole::ReviewAndPosting)
    }

    /// Look up the role played by an agent name
    pub fn from_agent_name(name: &str) -> Option<AgentRole> {
        Self::all().iter().copied().find(|r| r.name() == name)
    }

    /// Build the agent, rendering its instructions against the registry
    pub fn spec(&self, registry: &ToolRegistry, checklist: &ReviewChecklist) -> AgentSpec {
        let tools = registry.descriptors(self.tools().iter().copied());
        let peers = self
            .handoffs()
            .iter()
            .map(|r| r.name())
            .collect::<Vec<_>>()
            .join(", ");
        let context = PromptContext::new()
            .with_tools(&tools)
            .with_checklist(checklist)
            .with("PEERS", peers)
            .with("CONTEXT_AGENT", AgentRole::Context.name())
            .with("COMMENTOR_AGENT", AgentRole::Commentor.name())
            .with("REVIEW_AGENT", AgentRole::ReviewAndPosting.name());

        let mut spec = AgentSpec::new(self.name(), self.description())
            .with_instructions(prompts::render(*self, &context))
            .with_tools(self.tools().iter().copied());
        for peer in self.handoffs() {
            spec = spec.can_handoff_to(peer.name());
        }
        if self.is_root() {
            spec = spec.terminal();
        }
        spec
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for AgentRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "context" | "contextagent" | "c" => Ok(AgentRole::Context),
            "commentor" | "commentoragent" | "drafter" | "d" => Ok(AgentRole::Commentor),
            "review" | "reviewandposting" | "reviewandpostingagent" | "r" => {
                Ok(AgentRole::ReviewAndPosting)
            }
            _ => Err(format!("Unknown agent role: {}", s)),
        }
    }
}

/// The reference agents in role order
pub fn reference_agents(registry: &ToolRegistry, checklist: &ReviewChecklist) -> Vec<AgentSpec> {
    AgentRole::all()
        .iter()
        .map(|role| role.spec(registry, checklist))
        .collect()
}
