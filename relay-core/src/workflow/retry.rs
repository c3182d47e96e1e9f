//! Bounded exponential backoff for retryable tools

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::router::ToolInvoker;
use crate::tool::{ToolContext, ToolRegistry};
use crate::Result;

/// How often and how patiently transient tool failures are retried
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first; 1 disables retries
    pub max_attempts: u32,
    /// Delay before the first retry
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,
    /// Upper bound for any single delay
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Retry up to `max_attempts` total with no delay (tests)
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    /// Delay before retry number `retry` (0-based)
    pub fn compute_delay(&self, retry: u32) -> Duration {
        let base = self.initial_backoff.as_millis() as f64;
        let delay_ms = base * self.multiplier.powi(retry as i32);
        let capped = delay_ms.min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Whether another attempt is allowed after `attempts` have been made
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

/// Invokes tools through the registry, retrying transient failures of
/// tools marked retryable
pub struct RetryingInvoker<'a> {
    registry: &'a ToolRegistry,
    policy: &'a RetryPolicy,
}

impl<'a> RetryingInvoker<'a> {
    pub fn new(registry: &'a ToolRegistry, policy: &'a RetryPolicy) -> Self {
        Self { registry, policy }
    }
}

#[async_trait]
impl ToolInvoker for RetryingInvoker<'_> {
    async fn invoke(&self, name: &str, args: Value, ctx: &mut ToolContext<'_>) -> Result<Value> {
        let retryable = self
            .registry
            .descriptor(name)
            .map(|d| d.retryable)
            .unwrap_or(false);

        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.registry.invoke(name, args.clone(), ctx).await {
                Err(e) if retryable && e.is_transient() && self.policy.should_retry(attempts) => {
                    let delay = self.policy.compute_delay(attempts - 1);
                    warn!(
                        tool = name,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient tool failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}
