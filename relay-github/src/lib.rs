//! Relay GitHub - GitHub integration for Relay
//!
//! This crate reads pull requests and commit diffs from the GitHub REST API
//! and posts review comments back, exposing all of it to the review
//! workflow through [`relay_core::CodeHost`].

mod client;
mod error;
mod host;
mod pr;
mod review;

pub use client::{parse_github_url, GitHubClient};
pub use error::{Error, Result};
pub use review::Review;
