//! Structural checklist a review draft must satisfy before it is posted

use std::fmt;

use serde::{Deserialize, Serialize};

/// One thing every posted review has to cover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecklistItem {
    /// What is good about the PR
    Strengths,
    /// Whether the author followed the contribution rules
    ContributionRules,
    /// Tests for new functionality, migrations for new models
    TestsAndMigrations,
    /// Whether new endpoints are documented
    EndpointDocs,
    /// Improvable lines, quoted, with suggested fixes
    QuotedLines,
}

impl ChecklistItem {
    /// Get all checklist items in presentation order
    pub fn all() -> &'static [ChecklistItem] {
        &[
            ChecklistItem::Strengths,
            ChecklistItem::ContributionRules,
            ChecklistItem::TestsAndMigrations,
            ChecklistItem::EndpointDocs,
            ChecklistItem::QuotedLines,
        ]
    }

    /// Get the short name for this item
    pub fn name(&self) -> &'static str {
        match self {
            ChecklistItem::Strengths => "strengths",
            ChecklistItem::ContributionRules => "contribution_rules",
            ChecklistItem::TestsAndMigrations => "tests_and_migrations",
            ChecklistItem::EndpointDocs => "endpoint_docs",
            ChecklistItem::QuotedLines => "quoted_lines",
        }
    }

    /// The requirement as phrased to a reviewer
    pub fn requirement(&self) -> &'static str {
        match self {
            ChecklistItem::Strengths => "Specify what is good about the PR",
            ChecklistItem::ContributionRules => {
                "Say whether the author followed ALL contribution rules and what is missing"
            }
            ChecklistItem::TestsAndMigrations => {
                "Note whether new functionality has tests, and whether new models have migrations"
            }
            ChecklistItem::EndpointDocs => "Note whether new endpoints were documented",
            ChecklistItem::QuotedLines => {
                "Quote the lines that could be improved and suggest fixes"
            }
        }
    }

    fn is_covered(&self, review: &str, lower: &str) -> bool {
        let mentions = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));
        match self {
            ChecklistItem::Strengths => mentions(&[
                "what's good",
                "what is good",
                "what\u{2019}s good",
                "strength",
                "well done",
                "nice work",
                "great work",
            ]),
            ChecklistItem::ContributionRules => {
                mentions(&["contribution", "contributing", "guideline"])
            }
            ChecklistItem::TestsAndMigrations => mentions(&["test"]) && mentions(&["migration"]),
            ChecklistItem::EndpointDocs => {
                mentions(&["endpoint"]) && mentions(&["document", "docs"])
            }
            ChecklistItem::QuotedLines => quoted_lines(review) > 0,
        }
    }
}

impl fmt::Display for ChecklistItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Count quoted code: blockquote lines plus fenced code blocks
pub fn quoted_lines(review: &str) -> usize {
    let mut count = 0;
    let mut fences = 0;
    for line in review.lines() {
        let line = line.trim_start();
        if line.starts_with("```") {
            fences += 1;
            // count each opening fence once
            if fences % 2 == 1 {
                count += 1;
            }
        } else if let Some(rest) = line.strip_prefix('>') {
            if !rest.trim().is_empty() {
                count += 1;
            }
        }
    }
    count
}

/// Outcome of checking a draft
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistReport {
    /// Items the draft does not cover
    pub missing: Vec<ChecklistItem>,
    pub word_count: usize,
}

impl ChecklistReport {
    /// Whether every item is covered
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// Feedback for the drafting agent, or `None` when nothing is missing
    pub fn feedback(&self) -> Option<String> {
        if self.is_complete() {
            return None;
        }
        let lines: Vec<String> = self
            .missing
            .iter()
            .map(|item| format!("- {}", item.requirement()))
            .collect();
        Some(format!(
            "The draft is missing required sections:\n{}",
            lines.join("\n")
        ))
    }
}

/// Scores markdown reviews against the five checklist items
#[derive(Debug, Clone)]
pub struct ReviewChecklist {
    items: Vec<ChecklistItem>,
}

impl Default for ReviewChecklist {
    fn default() -> Self {
        Self {
            items: ChecklistItem::all().to_vec(),
        }
    }
}

impl ReviewChecklist {
    /// Create a checklist with every item
    pub fn new() -> Self {
        Self::default()
    }

    /// Items this checklist enforces
    pub fn items(&self) -> &[ChecklistItem] {
        &self.items
    }

    /// Check a draft
    pub fn evaluate(&self, review: &str) -> ChecklistReport {
        let lower = review.to_lowercase();
        let missing = self
            .items
            .iter()
            .copied()
            .filter(|item| !item.is_covered(review, &lower))
            .collect();
        ChecklistReport {
            missing,
            word_count: review.split_whitespace().count(),
        }
    }

    /// The checklist as a markdown bullet list, for instruction text
    pub fn as_markdown(&self) -> String {
        self.items
            .iter()
            .map(|item| format!("- {}", item.requirement()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
