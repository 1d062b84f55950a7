// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use aria_types::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Summary of a tool manifest injected into the model's prompt — name,
/// description, and input schema only; permissions/paths/timeouts are the
/// kernel's concern, not the model's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolManifestSummary {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// A request to invoke the model, already normalized across providers.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub tools: Vec<ToolManifestSummary>,
    pub messages: Vec<Message>,
    /// Optional prompt-cache key some providers accept verbatim.
    pub cache_key: Option<String>,
}

/// A provider's response, normalized to one of two shapes: the model either
/// finalized with text, or asked to invoke a tool.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedResponse {
    Finalization { text: String, cost: f64 },
    ToolCall { call_id: String, name: String, args: Value, cost: f64 },
}

impl NormalizedResponse {
    pub fn cost(&self) -> f64 {
        match self {
            Self::Finalization { cost, .. } => *cost,
            Self::ToolCall { cost, .. } => *cost,
        }
    }
}
