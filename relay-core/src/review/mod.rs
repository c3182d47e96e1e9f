//! Review content: the posting checklist and the offline drafter

mod checklist;
mod draft;

pub use checklist::{quoted_lines, ChecklistItem, ChecklistReport, ReviewChecklist};
pub use draft::{draft_review, ReviewContext};
