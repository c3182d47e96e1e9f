//! Error types for Relay

use thiserror::Error;

/// Result type alias for Relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for Relay operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Read or write of a field the state schema never declared
    #[error("Unknown state field: {field}")]
    UnknownField { field: String },

    /// Write of a value whose shape doesn't match the declared field kind
    #[error("State field '{field}' expects a {expected} value")]
    FieldType {
        field: String,
        expected: &'static str,
    },

    /// A tool with the same name is already registered
    #[error("Tool '{name}' is already registered")]
    DuplicateTool { name: String },

    /// No tool with this name is registered
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    /// A tool ran and failed
    #[error("Tool '{tool}' failed: {message}")]
    ToolExecution {
        tool: String,
        message: String,
        /// Whether the failure is worth retrying (network hiccup, rate limit)
        transient: bool,
    },

    /// An agent asked for a tool outside its capability set
    #[error("Agent '{agent}' is not permitted to call tool '{tool}'")]
    CapabilityViolation { agent: String, tool: String },

    /// An agent asked to hand off to a peer it may not reach
    #[error("Agent '{agent}' cannot hand off to '{target}'")]
    InvalidHandoff { agent: String, target: String },

    /// A turn ended without a usable terminating action
    #[error("Protocol violation by agent '{agent}': {reason}")]
    ProtocolViolation { agent: String, reason: String },

    /// The run used up its turn budget
    #[error("Turn limit of {limit} exceeded")]
    TurnLimitExceeded { limit: u32 },

    /// Workflow definition failed validation at construction time
    #[error("Invalid workflow: {0}")]
    InvalidWorkflow(String),

    /// The run was cancelled between turns
    #[error("Run cancelled")]
    Cancelled,

    /// The decision backend (language model) failed
    #[error("Decision backend error: {0}")]
    Decision(String),
}

impl Error {
    /// Whether a retry might succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::ToolExecution { transient: true, .. })
    }
}

/// A run-aborting error together with where it happened
#[derive(Error, Debug)]
#[error("Run failed in agent '{agent}' at turn {turn}: {error}")]
pub struct RunFailure {
    /// Agent that was active when the run failed
    pub agent: String,
    /// Turn number (1-based) that was executing
    pub turn: u32,
    /// The underlying error
    #[source]
    pub error: Error,
}
