//! Shared state store
//!
//! A small set of named slots threaded through every turn of a run. The
//! slots are declared once in a [`StateSchema`] when the workflow is built;
//! after that, agents and tools may overwrite values but never add or remove
//! fields. Writing an undeclared field is rejected with
//! [`Error::UnknownField`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// Field holding the gathered PR context
pub const GATHERED_CONTEXTS: &str = "gathered_contexts";
/// Field holding the drafting agent's review text
pub const DRAFT_COMMENT: &str = "draft_comment";
/// Field holding the review text approved for posting
pub const FINAL_REVIEW_COMMENT: &str = "final_review_comment";
/// Field holding the confirmation of a posted review
pub const POSTED_REVIEW: &str = "posted_review";

/// The shape of value a field accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Plain text
    Text,
    /// Structured JSON record (object or array); `null` means unset
    Record,
}

impl FieldKind {
    /// Get the short name for this kind
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Record => "record",
        }
    }

    /// Check whether a value has the right shape for this kind
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldKind::Text => value.is_string(),
            FieldKind::Record => value.is_object() || value.is_array() || value.is_null(),
        }
    }
}

/// Declaration of a single state field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub default: Value,
    pub description: String,
}

/// The set of fields a workflow's state may hold
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateSchema {
    fields: Vec<FieldSpec>,
}

impl StateSchema {
    /// Create an empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Schema for the pull-request review workflow
    pub fn pr_review() -> Self {
        Self::new()
            .record(GATHERED_CONTEXTS, "PR details and changed-file records")
            .text(DRAFT_COMMENT, "Draft review written by the drafting agent")
            .text(FINAL_REVIEW_COMMENT, "Review approved for posting")
            .record(POSTED_REVIEW, "Confirmation returned by the code host")
    }

    /// Declare a text field defaulting to the empty string
    pub fn text(self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.field(FieldSpec {
            name: name.into(),
            kind: FieldKind::Text,
            default: Value::String(String::new()),
            description: description.into(),
        })
    }

    /// Declare a record field defaulting to `null`
    pub fn record(self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.field(FieldSpec {
            name: name.into(),
            kind: FieldKind::Record,
            default: Value::Null,
            description: description.into(),
        })
    }

    /// Declare a field; a later declaration with the same name replaces the earlier one
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.retain(|f| f.name != spec.name);
        self.fields.push(spec);
        self
    }

    /// Look up a field declaration
    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// All declared fields, in declaration order
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Check that every default matches its declared kind
    pub fn validate(&self) -> Result<()> {
        for field in &self.fields {
            if !field.kind.accepts(&field.default) {
                return Err(Error::InvalidWorkflow(format!(
                    "default for state field '{}' is not a {} value",
                    field.name,
                    field.kind.name()
                )));
            }
        }
        Ok(())
    }
}

/// Mutable state shared by all agents in one run
#[derive(Debug, Clone, PartialEq)]
pub struct SharedState {
    schema: StateSchema,
    values: BTreeMap<String, Value>,
}

impl SharedState {
    /// Create a state with every declared field at its default
    pub fn new(schema: &StateSchema) -> Self {
        let values = schema
            .fields()
            .iter()
            .map(|f| (f.name.clone(), f.default.clone()))
            .collect();

        Self {
            schema: schema.clone(),
            values,
        }
    }

    /// Read a field
    pub fn get(&self, field: &str) -> Result<&Value> {
        self.values.get(field).ok_or_else(|| Error::UnknownField {
            field: field.to_string(),
        })
    }

    /// Read a text field
    pub fn get_text(&self, field: &str) -> Result<&str> {
        self.get(field)?.as_str().ok_or_else(|| Error::FieldType {
            field: field.to_string(),
            expected: FieldKind::Text.name(),
        })
    }

    /// Overwrite a declared field
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<()> {
        let spec = self.schema.get(field).ok_or_else(|| Error::UnknownField {
            field: field.to_string(),
        })?;

        let value = value.into();
        if !spec.kind.accepts(&value) {
            return Err(Error::FieldType {
                field: field.to_string(),
                expected: spec.kind.name(),
            });
        }

        self.values.insert(field.to_string(), value);
        Ok(())
    }

    /// Restore a field to its declared default
    pub fn reset(&mut self, field: &str) -> Result<()> {
        let default = self
            .schema
            .get(field)
            .map(|f| f.default.clone())
            .ok_or_else(|| Error::UnknownField {
                field: field.to_string(),
            })?;
        self.values.insert(field.to_string(), default);
        Ok(())
    }

    /// Check whether a field still holds its declared default
    pub fn is_default(&self, field: &str) -> Result<bool> {
        let spec = self.schema.get(field).ok_or_else(|| Error::UnknownField {
            field: field.to_string(),
        })?;
        Ok(self.values.get(field) == Some(&spec.default))
    }

    /// Iterate over fields and their current values
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The schema this state was created from
    pub fn schema(&self) -> &StateSchema {
        &self.schema
    }

    /// JSON object view of all fields
    pub fn snapshot(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}
