//! Deterministic review drafting from gathered PR context

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::GATHERED_CONTEXTS;
use crate::tool::{ChangedFile, PrDetails};
use crate::{Error, Result};

/// Record stored in `gathered_contexts`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewContext {
    pub pr: PrDetails,
    #[serde(default)]
    pub files: Vec<ChangedFile>,
}

impl ReviewContext {
    /// Build a context, keeping the latest entry per filename
    pub fn new(pr: PrDetails, files: impl IntoIterator<Item = ChangedFile>) -> Self {
        let mut merged: Vec<ChangedFile> = Vec::new();
        for file in files {
            match merged.iter_mut().find(|f| f.filename == file.filename) {
                Some(existing) => *existing = file,
                None => merged.push(file),
            }
        }
        Self { pr, files: merged }
    }

    /// Decode the record held in state
    pub fn from_value(value: &Value) -> Result<Self> {
        if value.is_null() {
            return Err(Error::FieldType {
                field: GATHERED_CONTEXTS.to_string(),
                expected: "record",
            });
        }
        Ok(serde_json::from_value(value.clone())?)
    }

    fn paths_matching(&self, needles: &[&str]) -> Vec<&str> {
        self.files
            .iter()
            .map(|f| f.filename.as_str())
            .filter(|name| {
                let lower = name.to_lowercase();
                needles.iter().any(|n| lower.contains(n))
            })
            .collect()
    }

    fn totals(&self) -> (u64, u64) {
        self.files
            .iter()
            .fold((0, 0), |(a, d), f| (a + f.additions, d + f.deletions))
    }
}

/// A line worth quoting back to the author
struct Finding<'a> {
    file: &'a str,
    line: &'a str,
    suggestion: &'static str,
}

fn suggestion_for(line: &str) -> &'static str {
    let lower = line.to_lowercase();
    if lower.contains("todo") || lower.contains("fixme") {
        "Resolve this TODO before merging, or link a follow-up issue."
    } else if line.contains(".unwrap()") || line.contains(".expect(") {
        "Handle the error here instead of panicking."
    } else if lower.contains("println!") || lower.contains("console.log") || lower.contains("print(") {
        "This looks like leftover debug output; consider removing it or using the logger."
    } else if line.len() > 100 {
        "This line is long; consider splitting it for readability."
    } else {
        "Double-check this change is covered by a test."
    }
}

/// First quotable line with the given diff marker
fn changed_line<'a>(patch: &'a str, marker: char, header: &str) -> Option<&'a str> {
    patch
        .lines()
        .filter(|l| l.starts_with(marker) && !l.starts_with(header))
        .map(|l| l[1..].trim())
        .find(|l| l.len() > 3)
}

/// Something non-empty to quote when no patch line qualifies
fn fallback_quote(ctx: &ReviewContext) -> String {
    if let Some(file) = ctx.files.first() {
        format!("`{}`", file.filename)
    } else if !ctx.pr.title.trim().is_empty() {
        ctx.pr.title.trim().to_string()
    } else {
        format!("PR #{}", ctx.pr.number)
    }
}

fn findings(ctx: &ReviewContext, limit: usize) -> Vec<Finding<'_>> {
    let mut out = Vec::new();
    for file in &ctx.files {
        let Some(patch) = file.patch.as_deref() else {
            continue;
        };
        if let Some(line) = changed_line(patch, '+', "+++") {
            out.push(Finding {
                file: &file.filename,
                line,
                suggestion: suggestion_for(line),
            });
        } else if let Some(line) = changed_line(patch, '-', "---") {
            out.push(Finding {
                file: &file.filename,
                line,
                suggestion: "This line was removed; make sure nothing still depends on it.",
            });
        }
        if out.len() >= limit {
            break;
        }
    }
    out
}

fn bullet_list(paths: &[&str]) -> String {
    paths
        .iter()
        .map(|p| format!("`{}`", p))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Write a markdown review covering every checklist item
pub fn draft_review(ctx: &ReviewContext) -> String {
    let pr = &ctx.pr;
    let (additions, deletions) = ctx.totals();
    let mut out = String::new();

    out.push_str(&format!(
        "Thanks for opening \"{}\", @{}! Here is my review.\n\n",
        pr.title, pr.author
    ));

    out.push_str("### What's good\n");
    out.push_str(&format!(
        "- The change is scoped to {} file(s) (+{} / -{}), which keeps it easy to review.\n",
        ctx.files.len(),
        additions,
        deletions
    ));
    if pr.commit_shas.len() == 1 {
        out.push_str("- A single commit makes the history easy to follow.\n");
    }
    out.push('\n');

    out.push_str("### Contribution rules\n");
    if pr.body.trim().is_empty() {
        out.push_str(
            "- The PR description is empty. The contribution guidelines ask for a summary \
             of what changed and why; please add one.\n\n",
        );
    } else {
        out.push_str("- The PR has a description, as the contribution guidelines require.\n\n");
    }

    out.push_str("### Tests and migrations\n");
    let tests = ctx.paths_matching(&["test", "spec"]);
    if tests.is_empty() {
        out.push_str("- No tests added. Please add tests covering this change.\n");
    } else {
        out.push_str(&format!("- Tests were updated in {}.\n", bullet_list(&tests)));
    }
    let migrations = ctx.paths_matching(&["migration"]);
    let models = ctx.paths_matching(&["model"]);
    if !migrations.is_empty() {
        out.push_str(&format!(
            "- Migrations included: {}.\n\n",
            bullet_list(&migrations)
        ));
    } else if !models.is_empty() {
        out.push_str(&format!(
            "- Models changed in {} but no migration was added.\n\n",
            bullet_list(&models)
        ));
    } else {
        out.push_str("- No models changed, so no migrations are needed.\n\n");
    }

    out.push_str("### Endpoint documentation\n");
    let endpoints = ctx.paths_matching(&["api", "route", "endpoint", "controller", "handler"]);
    let docs = ctx.paths_matching(&["readme", "docs/", ".md", "openapi", "swagger"]);
    if endpoints.is_empty() {
        out.push_str("- No endpoints changed, so no documentation updates are required.\n\n");
    } else if docs.is_empty() {
        out.push_str(&format!(
            "- Endpoints changed in {} but the documentation was not updated.\n\n",
            bullet_list(&endpoints)
        ));
    } else {
        out.push_str(&format!(
            "- Endpoint changes are documented in {}.\n\n",
            bullet_list(&docs)
        ));
    }

    out.push_str("### Suggested improvements\n");
    let found = findings(ctx, 3);
    if found.is_empty() {
        out.push_str(&format!("> {}\n\n", fallback_quote(ctx)));
        out.push_str(
            "No changed lines were available to quote; please describe the change in the PR body.\n",
        );
    } else {
        for finding in found {
            out.push_str(&format!("In `{}`:\n", finding.file));
            out.push_str(&format!("> {}\n\n", finding.line));
            out.push_str(&format!("{}\n\n", finding.suggestion));
        }
    }

    out.trim_end().to_string()
}
