//! Registry of named tools

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::{Tool, ToolContext, ToolDescriptor, ToolError, Typed, TypedTool};
use crate::{Error, Result};

struct RegisteredTool {
    descriptor: ToolDescriptor,
    handler: Arc<dyn Tool>,
}

/// Registry of tools available to a workflow
///
/// Names are unique; descriptors are validated and cached at registration
/// so lookups never re-run `descriptor()`. The registry performs no retries.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let descriptor = tool.descriptor();
        validate_descriptor(&descriptor)?;

        if self.tools.contains_key(&descriptor.name) {
            return Err(Error::DuplicateTool {
                name: descriptor.name,
            });
        }

        debug!(tool = %descriptor.name, kind = ?descriptor.kind, "Registered tool");
        self.tools.insert(
            descriptor.name.clone(),
            RegisteredTool {
                descriptor,
                handler: tool,
            },
        );
        Ok(())
    }

    /// Register a typed tool
    pub fn register_typed<T: TypedTool + 'static>(&mut self, tool: T) -> Result<()> {
        self.register(Arc::new(Typed(tool)))
    }

    /// Builder-style registration
    pub fn with<T: TypedTool + 'static>(mut self, tool: T) -> Result<Self> {
        self.register_typed(tool)?;
        Ok(self)
    }

    /// Check whether a tool is registered
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get a tool's descriptor
    pub fn descriptor(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name).map(|t| &t.descriptor)
    }

    /// Descriptors for a set of names, skipping unknown ones
    pub fn descriptors<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Vec<ToolDescriptor> {
        names
            .into_iter()
            .filter_map(|n| self.descriptor(n).cloned())
            .collect()
    }

    /// Names of all registered tools, sorted
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Invoke a tool by name
    ///
    /// Handler failures become [`Error::ToolExecution`]; state errors raised
    /// inside the handler are passed through unchanged.
    pub async fn invoke(&self, name: &str, args: Value, ctx: &mut ToolContext<'_>) -> Result<Value> {
        let tool = self.tools.get(name).ok_or_else(|| Error::UnknownTool {
            name: name.to_string(),
        })?;

        debug!(tool = name, agent = ctx.agent, turn = ctx.turn, "Invoking tool");

        tool.handler.call(args, ctx).await.map_err(|e| match e {
            ToolError::State(inner) => inner,
            ToolError::Transient(message) => Error::ToolExecution {
                tool: name.to_string(),
                message,
                transient: true,
            },
            other => Error::ToolExecution {
                tool: name.to_string(),
                message: other.to_string(),
                transient: false,
            },
        })
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

fn validate_descriptor(descriptor: &ToolDescriptor) -> Result<()> {
    let name = &descriptor.name;
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(Error::InvalidWorkflow(format!("invalid tool name '{}'", name)));
    }

    if descriptor.parameters.get("type").and_then(Value::as_str) != Some("object") {
        return Err(Error::InvalidWorkflow(format!(
            "tool '{}' must take an object of arguments",
            name
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{SharedState, StateSchema};
    use crate::tool::ToolKind;
    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct NoArgs {}

    struct Fixed {
        name: &'static str,
        outcome: fn() -> std::result::Result<Value, ToolError>,
    }

    #[async_trait]
    impl TypedTool for Fixed {
        type Args = NoArgs;

        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor::new(self.name, "fixed outcome", ToolKind::Read)
        }

        async fn call_typed(
            &self,
            _args: NoArgs,
            _ctx: &mut ToolContext<'_>,
        ) -> std::result::Result<Value, ToolError> {
            (self.outcome)()
        }
    }

    fn ok_tool(name: &'static str) -> Fixed {
        Fixed {
            name,
            outcome: || Ok(json!({"ok": true})),
        }
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register_typed(ok_tool("a")).unwrap();
        let err = registry.register_typed(ok_tool("a")).unwrap_err();
        assert!(matches!(err, Error::DuplicateTool { ref name } if name == "a"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_invalid_name_rejected() {
        let mut registry = ToolRegistry::new();
        assert!(registry.register_typed(ok_tool("has space")).is_err());
        assert!(registry.register_typed(ok_tool("")).is_err());
    }

    #[test]
    fn test_descriptors_skip_unknown() {
        let registry = ToolRegistry::new()
            .with(ok_tool("a"))
            .unwrap()
            .with(ok_tool("b"))
            .unwrap();
        let found = registry.descriptors(["b", "zzz"]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "b");
        assert_eq!(registry.names(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_invoke_unknown_tool() {
        let registry = ToolRegistry::new();
        let mut state = SharedState::new(&StateSchema::new());
        let mut ctx = ToolContext {
            state: &mut state,
            agent: "x",
            turn: 1,
        };
        let err = registry.invoke("missing", json!({}), &mut ctx).await.unwrap_err();
        assert!(matches!(err, Error::UnknownTool { .. }));
    }

    #[tokio::test]
    async fn test_invoke_wraps_failures() {
        let registry = ToolRegistry::new()
            .with(Fixed {
                name: "flaky",
                outcome: || Err(ToolError::Transient("timeout".into())),
            })
            .unwrap()
            .with(Fixed {
                name: "broken",
                outcome: || Err(ToolError::Failed("boom".into())),
            })
            .unwrap();
        let mut state = SharedState::new(&StateSchema::new());
        let mut ctx = ToolContext {
            state: &mut state,
            agent: "x",
            turn: 1,
        };

        let err = registry.invoke("flaky", json!({}), &mut ctx).await.unwrap_err();
        assert!(err.is_transient());

        let err = registry.invoke("broken", json!({}), &mut ctx).await.unwrap_err();
        match err {
            Error::ToolExecution {
                tool,
                message,
                transient,
            } => {
                assert_eq!(tool, "broken");
                assert_eq!(message, "boom");
                assert!(!transient);
            }
            other => panic!("expected ToolExecution, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_state_errors_pass_through() {
        let registry = ToolRegistry::new()
            .with(Fixed {
                name: "bad_write",
                outcome: || {
                    Err(ToolError::State(Error::UnknownField {
                        field: "nope".into(),
                    }))
                },
            })
            .unwrap();
        let mut state = SharedState::new(&StateSchema::new());
        let mut ctx = ToolContext {
            state: &mut state,
            agent: "x",
            turn: 1,
        };
        let err = registry.invoke("bad_write", json!({}), &mut ctx).await.unwrap_err();
        assert!(matches!(err, Error::UnknownField { .. }));
    }
}
