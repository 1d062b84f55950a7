// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Deterministic mock providers for scenario tests — no network access.

use std::sync::Mutex;

use aria_types::AriaError;
use async_trait::async_trait;

use crate::provider::ModelProvider;
use crate::types::{CompletionRequest, NormalizedResponse};

/// A pre-scripted provider. Each call to `send` pops the next scripted
/// result from the front of the queue; once exhausted it returns a fixed
/// fallback finalization so tests never hang waiting on an empty queue.
pub struct ScriptedMockProvider {
    name: String,
    scripts: Mutex<Vec<Result<NormalizedResponse, AriaError>>>,
    pub last_request: Mutex<Option<CompletionRequest>>,
}

impl ScriptedMockProvider {
    pub fn new(scripts: Vec<Result<NormalizedResponse, AriaError>>) -> Self {
        Self { name: "mock".into(), scripts: Mutex::new(scripts), last_request: Mutex::new(None) }
    }

    /// Convenience: always finalizes with `text` at zero cost.
    pub fn always_text(text: impl Into<String>) -> Self {
        Self::new(vec![Ok(NormalizedResponse::Finalization { text: text.into(), cost: 0.0 })])
    }

    /// Convenience: one tool call round, then a text finalization.
    pub fn tool_then_text(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        args: serde_json::Value,
        final_text: impl Into<String>,
    ) -> Self {
        Self::new(vec![
            Ok(NormalizedResponse::ToolCall { call_id: call_id.into(), name: tool_name.into(), args, cost: 0.0 }),
            Ok(NormalizedResponse::Finalization { text: final_text.into(), cost: 0.0 }),
        ])
    }

    /// Provider that loops issuing the same tool call — used to exercise
    /// step/cost limit enforcement. The queue is long but finite; budget
    /// tests only ever consume a handful of steps before failing.
    pub fn looping_tool_call(tool_name: impl Into<String>, args: serde_json::Value) -> Self {
        let response = NormalizedResponse::ToolCall { call_id: "loop".into(), name: tool_name.into(), args, cost: 0.0 };
        Self::new(std::iter::repeat_with(|| Ok(response.clone())).take(10_000).collect())
    }

    /// Provider that always fails with a transient `ModelProviderError`,
    /// used to drive circuit breaker tests. Repeats indefinitely (within a
    /// long but finite queue) since the router retries and a breaker needs
    /// several consecutive failures before it opens.
    pub fn always_failing(provider: impl Into<String>, message: impl Into<String>) -> Self {
        let err = AriaError::ModelProviderError { provider: provider.into(), message: message.into(), transient: true };
        Self::new(std::iter::repeat_with(|| Err(err.clone())).take(10_000).collect())
    }
}

#[async_trait]
impl ModelProvider for ScriptedMockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, request: &CompletionRequest) -> Result<NormalizedResponse, AriaError> {
        *self.last_request.lock().unwrap() = Some(request.clone());
        let mut scripts = self.scripts.lock().unwrap();
        if scripts.is_empty() {
            return Ok(NormalizedResponse::Finalization { text: "[no more scripts]".into(), cost: 0.0 });
        }
        scripts.remove(0)
    }
}
