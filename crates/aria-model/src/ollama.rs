// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Ollama driver — targets the OpenAI-compatible `/v1/chat/completions`
//! endpoint Ollama serves locally, so one wire format covers both.

use aria_types::AriaError;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::provider::ModelProvider;
use crate::types::{CompletionRequest, NormalizedResponse};

pub struct OllamaProvider {
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(model: String, base_url: Option<String>) -> Self {
        Self {
            model,
            base_url: base_url.unwrap_or_else(|| "http://localhost:11434".into()),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ModelProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn send(&self, request: &CompletionRequest) -> Result<NormalizedResponse, AriaError> {
        let messages = build_openai_messages(request);
        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": { "name": t.name, "description": t.description, "parameters": t.input_schema },
                })
            })
            .collect();

        let mut body = json!({ "model": self.model, "messages": messages, "stream": false });
        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }

        debug!(model = %self.model, "sending ollama request");

        let resp = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| AriaError::ModelProviderError { provider: "ollama".into(), message: e.to_string(), transient: true })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let transient = status.is_server_error();
            return Err(AriaError::ModelProviderError { provider: "ollama".into(), message: format!("{status}: {text}"), transient });
        }

        let parsed: Value = resp
            .json()
            .await
            .map_err(|e| AriaError::ModelResponseMalformed(format!("invalid JSON body: {e}")))?;

        parse_openai_response(&parsed, |text| self.estimate_cost(request, text))
    }
}

fn build_openai_messages(request: &CompletionRequest) -> Vec<Value> {
    use aria_types::Message;

    let mut out = Vec::new();
    if !request.system_prompt.is_empty() {
        out.push(json!({ "role": "system", "content": request.system_prompt }));
    }
    for m in &request.messages {
        match m {
            Message::System { text } => out.push(json!({ "role": "system", "content": text })),
            Message::User { text } => out.push(json!({ "role": "user", "content": text })),
            Message::Assistant { text } => out.push(json!({ "role": "assistant", "content": text })),
            Message::ToolCall { call_id, tool_name, arguments } => out.push(json!({
                "role": "assistant",
                "content": Value::Null,
                "tool_calls": [{
                    "id": call_id,
                    "type": "function",
                    "function": { "name": tool_name, "arguments": arguments.to_string() },
                }],
            })),
            Message::ToolResult { call_id, result, .. } => out.push(json!({
                "role": "tool",
                "tool_call_id": call_id,
                "content": result.to_string(),
            })),
        }
    }
    out
}

pub(crate) fn parse_openai_response(v: &Value, cost_of: impl Fn(&str) -> f64) -> Result<NormalizedResponse, AriaError> {
    let message = v["choices"][0]["message"]
        .as_object()
        .ok_or_else(|| AriaError::ModelResponseMalformed("missing choices[0].message".into()))?;

    if let Some(calls) = message.get("tool_calls").and_then(|c| c.as_array()) {
        if let Some(call) = calls.first() {
            let call_id = call["id"].as_str().unwrap_or_default().to_string();
            let name = call["function"]["name"].as_str().unwrap_or_default().to_string();
            let raw_args = call["function"]["arguments"].as_str().unwrap_or("{}");
            let args: Value = serde_json::from_str(raw_args)
                .map_err(|e| AriaError::ModelResponseMalformed(format!("tool_call arguments not valid JSON: {e}")))?;
            if call_id.is_empty() || name.is_empty() {
                return Err(AriaError::ModelResponseMalformed("tool_call missing id or name".into()));
            }
            let cost = cost_of(raw_args);
            return Ok(NormalizedResponse::ToolCall { call_id, name, args, cost });
        }
    }

    let text = message.get("content").and_then(|c| c.as_str()).unwrap_or_default().to_string();
    let cost = cost_of(&text);
    Ok(NormalizedResponse::Finalization { text, cost })
}
