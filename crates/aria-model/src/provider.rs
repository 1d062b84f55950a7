// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use aria_types::AriaError;
use async_trait::async_trait;

use crate::types::{CompletionRequest, NormalizedResponse};

/// Capability interface every model backend implements. Provider variability
/// is bounded and enumerable at runtime, so a small trait object set is
/// sufficient — no plugin loading is needed on this side, unlike tools.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Stable provider id, e.g. `"anthropic"`.
    fn name(&self) -> &str;

    /// Send a request and return a normalized response. Providers that speak
    /// free-form text are responsible for parsing tool-call intent out of it
    /// and returning `AriaError::ModelResponseMalformed` when they cannot.
    async fn send(&self, request: &CompletionRequest) -> Result<NormalizedResponse, AriaError>;

    /// Estimate the USD cost of a request/response pair. The default is a
    /// deterministic length-based estimate shared by every provider that
    /// does not report authoritative usage/pricing of its own; providers
    /// that can read real token usage off the wire response should override
    /// this instead of relying on message length.
    fn estimate_cost(&self, request: &CompletionRequest, response_text: &str) -> f64 {
        let input_tokens: usize = request.messages.iter().map(|m| m.approx_tokens()).sum();
        let output_tokens = (response_text.len() / 4).max(1);
        (input_tokens + output_tokens) as f64 * DEFAULT_USD_PER_TOKEN
    }
}

/// Flat per-token rate used by the deterministic default cost estimator.
/// Deliberately coarse — real pricing is provider- and model-specific, but
/// the kernel only needs a non-negative real that increases with usage.
pub const DEFAULT_USD_PER_TOKEN: f64 = 0.000_003;
