//! Tools that agents may invoke
//!
//! A tool is a named, schema-described unit of work. Read tools fetch data
//! from the code host; write tools mutate [`SharedState`] or post results
//! back. Handlers are written against [`TypedTool`] so their arguments are
//! decoded into a concrete type before the handler runs; [`Typed`] adapts
//! them to the dynamic [`Tool`] interface the registry stores.

mod hosting;
mod registry;
mod review;
mod state_tools;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::state::SharedState;

pub use hosting::{ChangedFile, CodeHost, HostError, PostedReview, PrDetails};
pub use registry::ToolRegistry;
pub use review::{
    GetCommitDetailsTool, GetPrDetailsTool, PostReviewTool, GET_COMMIT_DETAILS, GET_PR_DETAILS,
    POST_REVIEW,
};
pub use state_tools::{
    SetFieldTool, ADD_COMMENT_TO_STATE, ADD_CONTEXT_TO_STATE, ADD_FINAL_REVIEW_TO_STATE,
};

/// Whether a tool only reads or also has side effects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Read,
    Write,
}

/// Everything the router and decision backends need to know about a tool
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    /// Unique name
    pub name: String,
    /// What the tool does, shown to the decision backend
    pub description: String,
    /// JSON Schema of the arguments object
    pub parameters: Value,
    pub kind: ToolKind,
    /// A failure of this tool aborts the run
    pub fatal: bool,
    /// Failures classified as transient may be retried by the runner
    pub retryable: bool,
    /// Effects leave the process; state written by a successful call is
    /// kept even if the rest of the turn fails
    pub external: bool,
}

impl ToolDescriptor {
    /// Create a fatal, non-retryable descriptor with an empty argument schema
    pub fn new(name: impl Into<String>, description: impl Into<String>, kind: ToolKind) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: json!({ "type": "object", "properties": {} }),
            kind,
            fatal: true,
            retryable: false,
            external: false,
        }
    }

    /// Set the argument schema
    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }

    /// Report failures back to the agent instead of aborting the run
    pub fn non_fatal(mut self) -> Self {
        self.fatal = false;
        self
    }

    /// Allow the runner to retry transient failures
    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }

    /// Mark the tool as acting on the outside world
    pub fn external(mut self) -> Self {
        self.external = true;
        self
    }
}

/// Failure raised by a tool handler
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Arguments did not match the tool's schema
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The tool ran and failed
    #[error("{0}")]
    Failed(String),

    /// The tool failed in a way that may succeed on retry
    #[error("{0}")]
    Transient(String),

    /// A state access inside the tool failed; surfaced as-is
    #[error(transparent)]
    State(#[from] crate::Error),
}

impl From<HostError> for ToolError {
    fn from(err: HostError) -> Self {
        if err.is_transient() {
            ToolError::Transient(err.to_string())
        } else {
            ToolError::Failed(err.to_string())
        }
    }
}

/// What a tool sees while it runs
pub struct ToolContext<'a> {
    /// Staged state for the current turn
    pub state: &'a mut SharedState,
    /// Agent that requested the call
    pub agent: &'a str,
    /// Current turn number (1-based)
    pub turn: u32,
}

/// Dynamic tool interface stored by the registry
#[async_trait]
pub trait Tool: Send + Sync {
    /// Describe the tool
    fn descriptor(&self) -> ToolDescriptor;

    /// Run the tool with raw JSON arguments
    async fn call(&self, args: Value, ctx: &mut ToolContext<'_>) -> Result<Value, ToolError>;
}

/// Tool with a typed argument struct
#[async_trait]
pub trait TypedTool: Send + Sync {
    /// Argument type decoded from the call's JSON
    type Args: DeserializeOwned + Send;

    /// Describe the tool
    fn descriptor(&self) -> ToolDescriptor;

    /// Run the tool with decoded arguments
    async fn call_typed(
        &self,
        args: Self::Args,
        ctx: &mut ToolContext<'_>,
    ) -> Result<Value, ToolError>;
}

/// Adapter exposing a [`TypedTool`] as a [`Tool`]
pub struct Typed<T>(pub T);

#[async_trait]
impl<T: TypedTool> Tool for Typed<T> {
    fn descriptor(&self) -> ToolDescriptor {
        self.0.descriptor()
    }

    async fn call(&self, args: Value, ctx: &mut ToolContext<'_>) -> Result<Value, ToolError> {
        // Models commonly send `null` for tools without arguments
        let args = if args.is_null() { json!({}) } else { args };
        let args: T::Args =
            serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        self.0.call_typed(args, ctx).await
    }
}
