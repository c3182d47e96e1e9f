//! Tools that write a single state field

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ToolContext, ToolDescriptor, ToolError, ToolKind, TypedTool};
use crate::state::{FieldKind, DRAFT_COMMENT, FINAL_REVIEW_COMMENT, GATHERED_CONTEXTS};

pub const ADD_CONTEXT_TO_STATE: &str = "add_context_to_state";
pub const ADD_COMMENT_TO_STATE: &str = "add_comment_to_state";
pub const ADD_FINAL_REVIEW_TO_STATE: &str = "add_final_review_to_state";

/// Arguments for [`SetFieldTool`]
#[derive(Debug, Deserialize)]
pub struct SetFieldArgs {
    pub value: Value,
}

/// Overwrites one declared state field with the `value` argument
#[derive(Debug, Clone)]
pub struct SetFieldTool {
    name: String,
    description: String,
    field: String,
    kind: FieldKind,
}

impl SetFieldTool {
    /// Create a tool writing `field`
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        field: impl Into<String>,
        kind: FieldKind,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            field: field.into(),
            kind,
        }
    }

    /// `add_context_to_state`: saves the gathered PR context record
    pub fn context() -> Self {
        Self::new(
            ADD_CONTEXT_TO_STATE,
            "Save the gathered PR context (details and changed files) into state",
            GATHERED_CONTEXTS,
            FieldKind::Record,
        )
    }

    /// `add_comment_to_state`: saves the draft review
    pub fn draft_comment() -> Self {
        Self::new(
            ADD_COMMENT_TO_STATE,
            "Save the draft review comment into state",
            DRAFT_COMMENT,
            FieldKind::Text,
        )
    }

    /// `add_final_review_to_state`: saves the review approved for posting
    pub fn final_review() -> Self {
        Self::new(
            ADD_FINAL_REVIEW_TO_STATE,
            "Save the final review comment into state",
            FINAL_REVIEW_COMMENT,
            FieldKind::Text,
        )
    }

    /// The field this tool writes
    pub fn field(&self) -> &str {
        &self.field
    }
}

#[async_trait]
impl TypedTool for SetFieldTool {
    type Args = SetFieldArgs;

    fn descriptor(&self) -> ToolDescriptor {
        let value_schema = match self.kind {
            FieldKind::Text => json!({ "type": "string" }),
            FieldKind::Record => json!({ "type": "object" }),
        };

        ToolDescriptor::new(&self.name, &self.description, ToolKind::Write).with_parameters(json!({
            "type": "object",
            "properties": { "value": value_schema },
            "required": ["value"],
        }))
    }

    async fn call_typed(
        &self,
        args: SetFieldArgs,
        ctx: &mut ToolContext<'_>,
    ) -> Result<Value, ToolError> {
        ctx.state.set(&self.field, args.value)?;
        Ok(json!({ "field": self.field, "status": "saved" }))
    }
}
