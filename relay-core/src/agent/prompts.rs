//! Agent instruction templates
//!
//! Templates are embedded markdown with `{{VARIABLE}}` placeholders that are
//! rendered against a [`PromptContext`].

use std::collections::HashMap;

use super::AgentRole;
use crate::review::ReviewChecklist;
use crate::tool::ToolDescriptor;

const CONTEXT_PROMPT: &str = include_str!("prompts/context.md");
const DRAFTING_PROMPT: &str = include_str!("prompts/drafting.md");
const REVIEWING_PROMPT: &str = include_str!("prompts/reviewing.md");

/// Get the raw template for a role
pub fn get_template(role: AgentRole) -> &'static str {
    match role {
        AgentRole::Context => CONTEXT_PROMPT,
        AgentRole::Commentor => DRAFTING_PROMPT,
        AgentRole::ReviewAndPosting => REVIEWING_PROMPT,
    }
}

/// Variables for rendering a template
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    variables: HashMap<String, String>,
}

impl PromptContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable value (builder pattern)
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// List tools as `- name: description`
    pub fn with_tools(self, tools: &[ToolDescriptor]) -> Self {
        let list = if tools.is_empty() {
            "(no tools)".to_string()
        } else {
            tools
                .iter()
                .map(|t| format!("- `{}`: {}", t.name, t.description))
                .collect::<Vec<_>>()
                .join("\n")
        };
        self.with("TOOLS", list)
    }

    /// Set the review checklist
    pub fn with_checklist(self, checklist: &ReviewChecklist) -> Self {
        self.with("CHECKLIST", checklist.as_markdown())
    }
}

/// Render a role's template
pub fn render(role: AgentRole, context: &PromptContext) -> String {
    render_template(get_template(role), context)
}

/// Substitute variables; unset uppercase placeholders become "(not specified)"
fn render_template(template: &str, context: &PromptContext) -> String {
    let mut result = template.to_string();

    for (key, value) in &context.variables {
        let placeholder = format!("{{{{{}}}}}", key);
        result = result.replace(&placeholder, value);
    }

    let mut search_from = 0;
    while let Some(rel) = result[search_from..].find("{{") {
        let start = search_from + rel;
        let Some(end_rel) = result[start..].find("}}") else {
            break;
        };
        let end = start + end_rel;
        let inside = &result[start + 2..end];
        if !inside.is_empty() && inside.chars().all(|c| c.is_ascii_uppercase() || c == '_') {
            result.replace_range(start..end + 2, "(not specified)");
        } else {
            search_from = end + 2;
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::ToolKind;

    #[test]
    fn test_get_template() {
        assert!(get_template(AgentRole::Context).contains("# Context Agent"));
        assert!(get_template(AgentRole::Commentor).contains("{{CHECKLIST}}"));
        assert!(get_template(AgentRole::ReviewAndPosting).contains("{{COMMENTOR_AGENT}}"));
    }

    #[test]
    fn test_render_with_checklist_and_tools() {
        let tools = [ToolDescriptor::new(
            "add_comment_to_state",
            "Save the draft",
            ToolKind::Write,
        )];
        let ctx = PromptContext::new()
            .with_checklist(&ReviewChecklist::new())
            .with_tools(&tools)
            .with("CONTEXT_AGENT", "ContextAgent")
            .with("REVIEW_AGENT", "ReviewAndPostingAgent");

        let rendered = render(AgentRole::Commentor, &ctx);
        assert!(rendered.contains("- `add_comment_to_state`: Save the draft"));
        assert!(rendered.contains("Quote the lines"));
        assert!(rendered.contains("ask ContextAgent"));
        assert!(!rendered.contains("{{"));
    }

    #[test]
    fn test_unset_placeholders_replaced() {
        let rendered = render(AgentRole::Context, &PromptContext::new());
        assert!(rendered.contains("(not specified)"));
        assert!(!rendered.contains("{{TOOLS}}"));
    }

    #[test]
    fn test_non_placeholder_braces_kept() {
        let rendered = render_template("json {{ \"a\": 1 }} and {{X}}", &PromptContext::new());
        assert_eq!(rendered, "json {{ \"a\": 1 }} and (not specified)");
    }
}
