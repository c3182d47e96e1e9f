//! Relay Core - Core library for Relay multi-agent pull request review
//!
//! A small set of cooperating agents share one typed state store and pass
//! control between each other through explicit handoffs. This crate provides
//! the state store, the tool registry, agent definitions and decision
//! backends, and the router and runner that drive a workflow to its final
//! output.

pub mod agent;
pub mod config;
pub mod error;
pub mod review;
pub mod secrets;
pub mod state;
pub mod tool;
pub mod workflow;

pub use agent::{AgentRole, AgentSpec, Decider, RunInput, TurnDecision};
pub use config::Config;
pub use error::{Error, Result, RunFailure};
pub use secrets::Secrets;
pub use state::{SharedState, StateSchema};
pub use tool::{CodeHost, ToolRegistry};
pub use workflow::{RunHandle, RunOutcome, RunReport, Workflow, WorkflowEvent, WorkflowRunner};
