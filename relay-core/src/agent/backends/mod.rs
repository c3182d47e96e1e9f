//! Decision backend implementations

mod chat;
mod heuristic;
mod scripted;

use std::sync::Arc;

pub use chat::{
    parse_response, ChatCompletionsDecider, ChatMessage, ChatRequest, ChatResponse,
    HANDOFF_FUNCTION,
};
pub use heuristic::HeuristicDecider;
pub use scripted::{DecisionRequestLog, ScriptedDecider};

use super::Decider;
use crate::config::{DeciderKind, ModelConfig};
use crate::{Error, Result};

/// Build the decider selected in config
///
/// `api_key` is required for model-backed deciders only.
pub fn from_config(config: &ModelConfig, api_key: Option<&str>) -> Result<Arc<dyn Decider>> {
    match config.decider {
        DeciderKind::Heuristic => Ok(Arc::new(HeuristicDecider::new())),
        DeciderKind::OpenAi => {
            let key = api_key.filter(|k| !k.is_empty()).ok_or_else(|| {
                Error::Config(
                    "a model API key is required; set OPENAI_API_KEY or run `relay secrets init`"
                        .to_string(),
                )
            })?;
            Ok(Arc::new(ChatCompletionsDecider::from_config(config, key)?))
        }
    }
}
