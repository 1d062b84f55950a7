// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use aria_types::{AriaError, Message};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::provider::ModelProvider;
use crate::types::{CompletionRequest, NormalizedResponse};

/// Non-streaming Anthropic Messages API client. The kernel only ever needs a
/// full response, not incremental deltas, so unlike the wire protocol itself
/// this provider never opens an SSE connection.
pub struct AnthropicProvider {
    model: String,
    api_key: Option<String>,
    base_url: String,
    max_tokens: u32,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(model: String, api_key: Option<String>, base_url: Option<String>, max_tokens: Option<u32>) -> Self {
        Self {
            model,
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.anthropic.com".into()),
            max_tokens: max_tokens.unwrap_or(4096),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn send(&self, request: &CompletionRequest) -> Result<NormalizedResponse, AriaError> {
        let key = self.api_key.as_deref().ok_or_else(|| AriaError::ModelProviderError {
            provider: "anthropic".into(),
            message: "ANTHROPIC_API_KEY not set".into(),
            transient: false,
        })?;

        let messages = build_anthropic_messages(&request.messages);
        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|t| json!({ "name": t.name, "description": t.description, "input_schema": t.input_schema }))
            .collect();

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": self.max_tokens,
            "stream": false,
        });
        if !request.system_prompt.is_empty() {
            body["system"] = json!(request.system_prompt);
        }
        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }

        debug!(model = %self.model, "sending anthropic request");

        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| AriaError::ModelProviderError { provider: "anthropic".into(), message: e.to_string(), transient: true })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            if status.as_u16() == 429 {
                return Err(AriaError::ModelRateLimitError { provider: "anthropic".into(), message: text });
            }
            let transient = status.is_server_error();
            return Err(AriaError::ModelProviderError { provider: "anthropic".into(), message: format!("{status}: {text}"), transient });
        }

        let parsed: Value = resp
            .json()
            .await
            .map_err(|e| AriaError::ModelResponseMalformed(format!("invalid JSON body: {e}")))?;

        parse_anthropic_response(&parsed, |text| self.estimate_cost(request, text))
    }
}

/// Parse a complete (non-streamed) Anthropic Messages API response body into
/// a normalized response. The first `tool_use` content block wins; if none is
/// present the concatenated text blocks are the finalization.
pub(crate) fn parse_anthropic_response(
    v: &Value,
    cost_of: impl Fn(&str) -> f64,
) -> Result<NormalizedResponse, AriaError> {
    let content = v["content"].as_array().ok_or_else(|| AriaError::ModelResponseMalformed("missing content array".into()))?;

    for block in content {
        if block["type"].as_str() == Some("tool_use") {
            let call_id = block["id"].as_str().unwrap_or_default().to_string();
            let name = block["name"].as_str().unwrap_or_default().to_string();
            if call_id.is_empty() || name.is_empty() {
                return Err(AriaError::ModelResponseMalformed("tool_use block missing id or name".into()));
            }
            let args = block["input"].clone();
            let cost = cost_of(&args.to_string());
            return Ok(NormalizedResponse::ToolCall { call_id, name, args, cost });
        }
    }

    let text: String = content
        .iter()
        .filter(|b| b["type"].as_str() == Some("text"))
        .filter_map(|b| b["text"].as_str())
        .collect::<Vec<_>>()
        .join("");
    let cost = cost_of(&text);
    Ok(NormalizedResponse::Finalization { text, cost })
}

/// Convert normalized messages into Anthropic's wire format. System messages
/// are dropped here; callers use `request.system_prompt` for the top-level
/// `system` field instead of embedding it as a conversation turn.
pub(crate) fn build_anthropic_messages(messages: &[Message]) -> Vec<Value> {
    let mut out = Vec::with_capacity(messages.len());
    for m in messages {
        match m {
            Message::System { .. } => {}
            Message::User { text } => out.push(json!({ "role": "user", "content": text })),
            Message::Assistant { text } => out.push(json!({ "role": "assistant", "content": text })),
            Message::ToolCall { call_id, tool_name, arguments } => out.push(json!({
                "role": "assistant",
                "content": [{ "type": "tool_use", "id": call_id, "name": tool_name, "input": arguments }],
            })),
            Message::ToolResult { call_id, result, .. } => out.push(json!({
                "role": "user",
                "content": [{ "type": "tool_result", "tool_use_id": call_id, "content": result.to_string() }],
            })),
        }
    }
    out
}
