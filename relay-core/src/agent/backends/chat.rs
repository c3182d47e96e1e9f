//! OpenAI-compatible chat completions backend
//!
//! Tools are offered as functions. Handoffs are offered as one extra
//! `handoff` function whose `target` is an enum of the permitted peers. A
//! reply with plain content and no function calls is the agent's final
//! output.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::agent::{Decider, ToolCall, TurnAction, TurnDecision, TurnRequest};
use crate::config::ModelConfig;
use crate::{Error, Result};

/// Name of the synthetic function that ends a turn with a handoff
pub const HANDOFF_FUNCTION: &str = "handoff";

/// A chat message in the completions wire format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ChatToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn text(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub kind: String,
    pub function: ChatFunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatFunctionCall {
    pub name: String,
    /// JSON-encoded arguments
    #[serde(default)]
    pub arguments: String,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub temperature: f32,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

/// Decider backed by a chat completions endpoint
#[derive(Clone)]
pub struct ChatCompletionsDecider {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl std::fmt::Debug for ChatCompletionsDecider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsDecider")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

impl ChatCompletionsDecider {
    /// Create a decider for `model` using the default OpenAI endpoint
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        Self::from_config(&ModelConfig::default(), api_key).map(|d| d.with_model(model))
    }

    /// Create a decider from the `[model]` config section
    pub fn from_config(config: &ModelConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Decision(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    /// Use a different model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Use a different endpoint, e.g. a local OpenAI-compatible server
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Build the request body for a turn
    pub fn build_request(&self, request: &TurnRequest<'_>) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            temperature: self.temperature,
            messages: build_messages(request),
            tools: build_tools(request),
        }
    }

    async fn send(&self, body: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.api_base);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Decision(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(%status, "Chat completion request rejected");
            return Err(Error::Decision(format!(
                "chat completion returned {}: {}",
                status, text
            )));
        }

        response
            .json::<ChatResponse>()
            .await
            .map_err(|e| Error::Decision(format!("malformed chat completion: {}", e)))
    }
}

fn build_messages(request: &TurnRequest<'_>) -> Vec<ChatMessage> {
    let agent = request.agent;
    let mut system = agent.instructions.clone();
    system.push_str("\n\n## Shared state\n\n```json\n");
    system.push_str(&serde_json::to_string_pretty(&request.state.snapshot()).unwrap_or_default());
    system.push_str("\n```\n");
    if !agent.handoffs.is_empty() {
        system.push_str(&format!(
            "\nTo pass control to another agent, call `{}` with one of: {}.\n",
            HANDOFF_FUNCTION,
            agent
                .handoffs
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }
    if agent.terminal {
        system.push_str(
            "\nWhen the task is complete, reply with your final answer as plain text \
             and no function call.\n",
        );
    }

    let mut user = request.input.prompt.clone();
    if let Some(note) = request.handoff_note.filter(|n| !n.is_empty()) {
        user.push_str(&format!("\n\nNote from the previous agent: {}", note));
    }

    let mut messages = vec![
        ChatMessage::text("system", system),
        ChatMessage::text("user", user),
    ];

    for step in request.steps {
        messages.push(ChatMessage {
            role: "assistant".to_string(),
            content: None,
            tool_calls: Some(vec![ChatToolCall {
                id: step.call.id.clone(),
                kind: function_type(),
                function: ChatFunctionCall {
                    name: step.call.name.clone(),
                    arguments: step.call.args.to_string(),
                },
            }]),
            tool_call_id: None,
        });
        messages.push(ChatMessage {
            role: "tool".to_string(),
            content: Some(step.result.to_string()),
            tool_calls: None,
            tool_call_id: Some(step.call.id.clone()),
        });
    }

    messages
}

fn build_tools(request: &TurnRequest<'_>) -> Vec<Value> {
    let mut tools: Vec<Value> = request
        .tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                }
            })
        })
        .collect();

    if !request.agent.handoffs.is_empty() {
        let targets: Vec<&str> = request.agent.handoffs.iter().map(String::as_str).collect();
        tools.push(json!({
            "type": "function",
            "function": {
                "name": HANDOFF_FUNCTION,
                "description": "Pass control to another agent",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "target": { "type": "string", "enum": targets },
                        "reason": { "type": "string" },
                    },
                    "required": ["target", "reason"],
                }
            }
        }));
    }
    tools
}

/// Turn a completion into a decision
pub fn parse_response(agent: &str, response: ChatResponse) -> Result<TurnDecision> {
    let message = response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or_else(|| Error::Decision("chat completion had no choices".to_string()))?;

    let mut decision = TurnDecision::default();
    for call in message.tool_calls.unwrap_or_default() {
        let name = call.function.name;
        let args: Value = if call.function.arguments.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(&call.function.arguments).map_err(|e| {
                Error::Decision(format!("arguments for '{}' are not JSON: {}", name, e))
            })?
        };

        if name == HANDOFF_FUNCTION {
            if decision.action.is_some() {
                return Err(Error::ProtocolViolation {
                    agent: agent.to_string(),
                    reason: "more than one handoff in a single reply".to_string(),
                });
            }
            let target = args
                .get("target")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::Decision("handoff call without a target".to_string()))?;
            let reason = args.get("reason").and_then(Value::as_str).unwrap_or_default();
            decision.action = Some(TurnAction::Handoff {
                target: target.to_string(),
                reason: reason.to_string(),
            });
        } else {
            decision.tool_calls.push(ToolCall::new(call.id, name, args));
        }
    }

    if decision.is_empty() {
        if let Some(content) = message.content.filter(|c| !c.trim().is_empty()) {
            decision.action = Some(TurnAction::Finish { output: content });
        }
    }

    Ok(decision)
}

#[async_trait]
impl Decider for ChatCompletionsDecider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn decide(&self, request: &TurnRequest<'_>) -> Result<TurnDecision> {
        let body = self.build_request(request);
        debug!(
            agent = %request.agent.name,
            turn = request.turn,
            step = request.step,
            messages = body.messages.len(),
            "Requesting chat completion"
        );
        let response = self.send(&body).await?;
        parse_response(&request.agent.name, response)
    }
}
