//! Console output for a review run

use relay_core::workflow::{EventHandler, WorkflowEvent};
use relay_core::RunFailure;
use serde_json::Value;

/// Longest tool output shown before truncating
const MAX_OUTPUT: usize = 400;

pub(crate) fn emoji<'a>(no_emoji: bool, emoji_char: &'a str, ascii_alt: &'a str) -> &'a str {
    if no_emoji {
        ascii_alt
    } else {
        emoji_char
    }
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}... ({} chars)", &text[..idx], text.chars().count()),
        None => text.to_string(),
    }
}

/// Prints agent switches, tool calls and results, and the final output
pub struct ConsoleReporter {
    no_emoji: bool,
    verbose: bool,
}

impl ConsoleReporter {
    pub fn new(no_emoji: bool, verbose: bool) -> Self {
        Self { no_emoji, verbose }
    }

    fn render_output(&self, result: &Value) -> String {
        let text = match result {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if self.verbose {
            text
        } else {
            truncate(&text, MAX_OUTPUT)
        }
    }
}

impl EventHandler for ConsoleReporter {
    fn on_agent_switched(&mut self, name: &str, turn: u32) {
        println!(
            "\n{} Current agent: {} (turn {})",
            emoji(self.no_emoji, "🔄", "[AGENT]"),
            name,
            turn
        );
    }

    fn on_tool_invoked(&mut self, _agent: &str, name: &str, args: &Value) {
        let args = if self.verbose {
            args.to_string()
        } else {
            truncate(&args.to_string(), MAX_OUTPUT)
        };
        println!(
            "\n{} Calling tool: {}, with args: {}",
            emoji(self.no_emoji, "⚙️", "[TOOL]"),
            name,
            args
        );
    }

    fn on_tool_completed(&mut self, _agent: &str, name: &str, result: &Value, is_error: bool) {
        let marker = if is_error {
            emoji(self.no_emoji, "⚠️", "[TOOL ERROR]")
        } else {
            emoji(self.no_emoji, "🛠", "[OUTPUT]")
        };
        println!("\n{} Output from {}: {}", marker, name, self.render_output(result));
    }

    fn on_finished(&mut self, output: &str, turns: u32) {
        println!(
            "\n{} Final response ({} turns): {}",
            emoji(self.no_emoji, "📝", "[DONE]"),
            turns,
            output
        );
    }

    fn on_failed(&mut self, failure: &RunFailure) {
        eprintln!("\n{} {}", emoji(self.no_emoji, "❌", "[ERROR]"), failure);
    }
}

/// Prints each event as one JSON line
pub struct JsonReporter;

impl JsonReporter {
    pub fn print(event: &WorkflowEvent) {
        match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(e) => tracing::warn!(error = %e, "Failed to serialize event"),
        }
    }
}

impl EventHandler for JsonReporter {
    fn on_finished(&mut self, _output: &str, _turns: u32) {}

    fn on_failed(&mut self, _failure: &RunFailure) {}

    fn handle(&mut self, event: &WorkflowEvent) {
        Self::print(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emoji_fallback() {
        assert_eq!(emoji(false, "🔄", "[AGENT]"), "🔄");
        assert_eq!(emoji(true, "🔄", "[AGENT]"), "[AGENT]");
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééééé", 2), "éé... (5 chars)");
    }
}
