// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod anthropic;
mod circuit_breaker;
mod mock;
mod ollama;
mod provider;
mod router;
mod types;

pub use anthropic::AnthropicProvider;
pub use circuit_breaker::{BreakerState, CircuitBreaker, CircuitBreakerConfig};
pub use mock::ScriptedMockProvider;
pub use ollama::OllamaProvider;
pub use provider::{ModelProvider, DEFAULT_USD_PER_TOKEN};
pub use router::Router;
pub use types::{CompletionRequest, NormalizedResponse, ToolManifestSummary};

/// Configuration read from `ARIA_PRIMARY_PROVIDER` / `ARIA_PRIMARY_MODEL` (see
/// `aria-config`), used to construct the primary provider a [`Router`] drives.
pub struct ProviderConfig {
    pub provider: String,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

/// Construct a boxed [`ModelProvider`] from configuration. `"mock"` is
/// accepted for tests and local dry runs; it always finalizes immediately.
pub fn from_config(cfg: &ProviderConfig) -> Result<Box<dyn ModelProvider>, aria_types::AriaError> {
    match cfg.provider.as_str() {
        "anthropic" => Ok(Box::new(AnthropicProvider::new(cfg.model.clone(), cfg.api_key.clone(), cfg.base_url.clone(), None))),
        "ollama" => Ok(Box::new(OllamaProvider::new(cfg.model.clone(), cfg.base_url.clone()))),
        "mock" => Ok(Box::new(ScriptedMockProvider::always_text("mock response"))),
        other => Err(aria_types::AriaError::ManifestInvalid(format!("unknown model provider: {other}"))),
    }
}
