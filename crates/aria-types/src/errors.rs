// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

/// The full error taxonomy shared by every ARIA component.
///
/// Every failure path in the system produces one of these kinds — there is
/// no catch-all variant. `retryable()` and `is_critical()` encode the
/// disposition table from the error handling design: retryable kinds may be
/// retried by the router, critical kinds halt the process.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AriaError {
    #[error("tool input failed schema validation: {0}")]
    ToolInputValidationError(String),

    #[error("tool output failed schema validation: {0}")]
    ToolOutputValidationError(String),

    #[error("tool '{tool}' timed out after {timeout_secs}s")]
    ToolTimeout { tool: String, timeout_secs: u64 },

    #[error("tool '{tool}' crashed: {message}")]
    ToolCrashed { tool: String, message: String },

    #[error("path '{path}' escapes allowed prefixes")]
    PathTraversal { path: String },

    #[error("permission '{permission}' not granted to session")]
    PermissionDenied { permission: String },

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("model provider error ({provider}): {message}")]
    ModelProviderError {
        provider: String,
        message: String,
        /// 5xx / network-reset class errors are transient and retryable.
        transient: bool,
    },

    #[error("model rate limited ({provider}): {message}")]
    ModelRateLimitError { provider: String, message: String },

    #[error("model response malformed: {0}")]
    ModelResponseMalformed(String),

    #[error("circuit breaker open for provider '{provider}'")]
    CircuitBreakerOpen { provider: String },

    #[error("step limit exceeded: {max_steps} steps")]
    StepLimitExceeded { max_steps: u32 },

    #[error("cost limit exceeded: {max_cost_usd} USD")]
    CostLimitExceeded { max_cost_usd: f64 },

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("audit write failure: {0}")]
    AuditWriteFailure(String),

    #[error("manifest invalid: {0}")]
    ManifestInvalid(String),
}

impl AriaError {
    /// Machine-stable name matching the taxonomy table in the design docs.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::ToolInputValidationError(_) => "ToolInputValidationError",
            Self::ToolOutputValidationError(_) => "ToolOutputValidationError",
            Self::ToolTimeout { .. } => "ToolTimeout",
            Self::ToolCrashed { .. } => "ToolCrashed",
            Self::PathTraversal { .. } => "PathTraversal",
            Self::PermissionDenied { .. } => "PermissionDenied",
            Self::UnknownTool(_) => "UnknownTool",
            Self::ModelProviderError { .. } => "ModelProviderError",
            Self::ModelRateLimitError { .. } => "ModelRateLimitError",
            Self::ModelResponseMalformed(_) => "ModelResponseMalformed",
            Self::CircuitBreakerOpen { .. } => "CircuitBreakerOpen",
            Self::StepLimitExceeded { .. } => "StepLimitExceeded",
            Self::CostLimitExceeded { .. } => "CostLimitExceeded",
            Self::DeadlineExceeded => "DeadlineExceeded",
            Self::InvalidStateTransition { .. } => "InvalidStateTransition",
            Self::AuditWriteFailure(_) => "AuditWriteFailure",
            Self::ManifestInvalid(_) => "ManifestInvalid",
        }
    }

    /// Whether the router may retry the operation that produced this error.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::ModelProviderError { transient: true, .. } | Self::ModelRateLimitError { .. }
        )
    }

    /// CRITICAL kinds are invariant violations: the kernel must halt the
    /// process rather than attempt to recover.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Self::InvalidStateTransition { .. } | Self::AuditWriteFailure(_)
        )
    }

    /// The CLI exit code this error maps to (see external interfaces).
    pub fn exit_code(&self) -> i32 {
        if self.is_critical() {
            return 10;
        }
        match self {
            Self::StepLimitExceeded { .. } | Self::CostLimitExceeded { .. } | Self::DeadlineExceeded => 3,
            Self::ToolInputValidationError(_)
            | Self::ToolOutputValidationError(_)
            | Self::ToolTimeout { .. }
            | Self::ToolCrashed { .. }
            | Self::PathTraversal { .. }
            | Self::PermissionDenied { .. }
            | Self::UnknownTool(_) => 4,
            Self::ModelProviderError { .. }
            | Self::ModelRateLimitError { .. }
            | Self::ModelResponseMalformed(_)
            | Self::CircuitBreakerOpen { .. } => 5,
            Self::ManifestInvalid(_) => 2,
            Self::InvalidStateTransition { .. } | Self::AuditWriteFailure(_) => 10,
        }
    }
}
