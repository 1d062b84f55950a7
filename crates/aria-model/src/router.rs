// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The Model Router: retry with bounded exponential backoff and full jitter,
//! gated per-provider by a circuit breaker, with an optional fallback
//! provider tried after the primary's breaker is open or exhausts its retries.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use aria_types::AriaError;
use rand::Rng;
use tracing::{debug, warn};

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::provider::ModelProvider;
use crate::types::{CompletionRequest, NormalizedResponse};

const MAX_RETRIES: u32 = 3;
const BASE_DELAY: Duration = Duration::from_millis(500);
const BACKOFF_FACTOR: u32 = 2;

/// Routes a request to a primary provider, retrying transient failures with
/// bounded exponential backoff, and falls back to a secondary provider once
/// the primary's circuit breaker is open.
pub struct Router {
    providers: HashMap<String, Box<dyn ModelProvider>>,
    breakers: Mutex<HashMap<String, CircuitBreaker>>,
    primary: String,
    fallback: Option<String>,
}

impl Router {
    pub fn new(primary_name: impl Into<String>, primary: Box<dyn ModelProvider>) -> Self {
        let primary_name = primary_name.into();
        let mut providers: HashMap<String, Box<dyn ModelProvider>> = HashMap::new();
        let mut breakers = HashMap::new();
        breakers.insert(primary_name.clone(), CircuitBreaker::new(CircuitBreakerConfig::default()));
        providers.insert(primary_name.clone(), primary);
        Self { providers, breakers: Mutex::new(breakers), primary: primary_name, fallback: None }
    }

    pub fn with_fallback(mut self, fallback_name: impl Into<String>, fallback: Box<dyn ModelProvider>) -> Self {
        let fallback_name = fallback_name.into();
        self.breakers.lock().unwrap().insert(fallback_name.clone(), CircuitBreaker::new(CircuitBreakerConfig::default()));
        self.providers.insert(fallback_name.clone(), fallback);
        self.fallback = Some(fallback_name);
        self
    }

    pub fn breaker_state(&self, provider: &str) -> Option<crate::circuit_breaker::BreakerState> {
        self.breakers.lock().unwrap().get(provider).map(|b| b.state())
    }

    pub async fn send(&self, request: &CompletionRequest) -> Result<NormalizedResponse, AriaError> {
        match self.try_provider(&self.primary, request).await {
            Ok(r) => Ok(r),
            Err(primary_err) => {
                let Some(fallback) = &self.fallback else {
                    return Err(primary_err);
                };
                warn!(provider = %self.primary, error = %primary_err, "primary provider failed, trying fallback");
                self.try_provider(fallback, request).await
            }
        }
    }

    async fn try_provider(&self, name: &str, request: &CompletionRequest) -> Result<NormalizedResponse, AriaError> {
        let provider = self.providers.get(name).ok_or_else(|| AriaError::ModelProviderError {
            provider: name.to_string(),
            message: "no such provider configured".into(),
            transient: false,
        })?;

        let mut attempt = 0u32;
        loop {
            if !self.breakers.lock().unwrap().get_mut(name).unwrap().allow_request() {
                return Err(AriaError::CircuitBreakerOpen { provider: name.to_string() });
            }

            match provider.send(request).await {
                Ok(response) => {
                    self.breakers.lock().unwrap().get_mut(name).unwrap().record_success();
                    return Ok(response);
                }
                Err(err) => {
                    self.breakers.lock().unwrap().get_mut(name).unwrap().record_failure();
                    if !err.retryable() || attempt >= MAX_RETRIES {
                        return Err(err);
                    }
                    let delay = backoff_with_full_jitter(attempt);
                    debug!(provider = name, attempt, delay_ms = delay.as_millis() as u64, "retrying after transient model error");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Exponential backoff with full jitter: `delay = random(0, base * factor^attempt)`.
fn backoff_with_full_jitter(attempt: u32) -> Duration {
    let cap = BASE_DELAY.as_millis() as u64 * (BACKOFF_FACTOR as u64).pow(attempt);
    let jittered = rand::rng().random_range(0..=cap);
    Duration::from_millis(jittered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedMockProvider;
    use aria_types::Message;
    use serde_json::json;

    fn req() -> CompletionRequest {
        CompletionRequest { messages: vec![Message::user("hi")], ..Default::default() }
    }

    #[tokio::test]
    async fn happy_path_routes_to_primary() {
        let router = Router::new("mock", Box::new(ScriptedMockProvider::always_text("hello")));
        let r = router.send(&req()).await.unwrap();
        assert!(matches!(r, NormalizedResponse::Finalization { text, .. } if text == "hello"));
    }

    #[tokio::test]
    async fn non_retryable_error_propagates_immediately() {
        let router = Router::new(
            "mock",
            Box::new(ScriptedMockProvider::new(vec![Err(AriaError::ModelResponseMalformed("bad".into()))])),
        );
        let err = router.send(&req()).await.unwrap_err();
        assert!(matches!(err, AriaError::ModelResponseMalformed(_)));
    }

    #[tokio::test]
    async fn breaker_opens_after_repeated_transient_failures() {
        let router = Router::new("mock", Box::new(ScriptedMockProvider::always_failing("mock", "down")));
        // failure_threshold defaults to 5; each send attempt retries up to
        // MAX_RETRIES times and records one breaker failure per attempt.
        for _ in 0..2 {
            let _ = router.send(&req()).await;
        }
        assert_eq!(router.breaker_state("mock"), Some(crate::circuit_breaker::BreakerState::Open));
    }

    #[tokio::test]
    async fn open_breaker_rejects_without_calling_provider() {
        let router = Router::new("mock", Box::new(ScriptedMockProvider::always_failing("mock", "down")));
        let _ = router.send(&req()).await;
        let err = router.send(&req()).await.unwrap_err();
        assert!(matches!(err, AriaError::CircuitBreakerOpen { .. }));
    }

    #[tokio::test]
    async fn fallback_used_when_primary_exhausts_retries() {
        let router = Router::new("primary", Box::new(ScriptedMockProvider::always_failing("primary", "down")))
            .with_fallback("fallback", Box::new(ScriptedMockProvider::always_text("from fallback")));
        let r = router.send(&req()).await.unwrap();
        assert!(matches!(r, NormalizedResponse::Finalization { text, .. } if text == "from fallback"));
    }

    #[tokio::test]
    async fn tool_call_round_trip_through_router() {
        let router = Router::new(
            "mock",
            Box::new(ScriptedMockProvider::tool_then_text("c1", "read_file", json!({"path": "/tmp/x"}), "done")),
        );
        let r1 = router.send(&req()).await.unwrap();
        assert!(matches!(r1, NormalizedResponse::ToolCall { .. }));
        let r2 = router.send(&req()).await.unwrap();
        assert!(matches!(r2, NormalizedResponse::Finalization { text, .. } if text == "done"));
    }
}
