// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The Agent Kernel: the deterministic step loop driving one session from
//! task to terminal outcome.
//!
//! The loop is single-threaded and cooperative. It suspends only at three
//! points: a model invocation, a sandboxed tool run, and an audit commit.
//! Cancellation is polled at step boundaries and before each suspension
//! point; it is never preempted mid-step.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use aria_audit::{AuditStore, EventKind, InjectionScanner};
use aria_model::{CompletionRequest, NormalizedResponse, Router, ToolManifestSummary};
use aria_tools::{SandboxContext, SandboxRunner, ToolRegistry};
use aria_types::{AriaError, Message, Session, SessionState};
use serde_json::json;
use tracing::{info, warn};

use crate::fsm::validate_transition;

/// Budget and wall-clock limits for a single `run` call.
#[derive(Debug, Clone)]
pub struct Limits {
    pub max_steps: u32,
    pub max_cost_usd: f64,
    pub deadline: Duration,
}

/// How a run concluded.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed(String),
    Failed { kind: String, message: String },
    Cancelled,
}

/// Cooperative cancellation: checked at step boundaries and before
/// suspension points, never preempted mid-step.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Ties the Router, Tool Registry, Sandbox Runner, and Audit Store together
/// behind the session state machine. One kernel instance drives one session
/// at a time; it owns the session exclusively for the duration of `run`.
pub struct AgentKernel {
    router: Router,
    registry: ToolRegistry,
    sandbox: SandboxRunner,
    audit: AuditStore,
    scanner: InjectionScanner,
    sandbox_context: SandboxContext,
    system_prompt: String,
    request_token_ceiling: usize,
}

impl AgentKernel {
    pub fn new(router: Router, registry: ToolRegistry, audit: AuditStore, sandbox_context: SandboxContext) -> Self {
        Self {
            router,
            registry,
            sandbox: SandboxRunner::new(),
            audit,
            scanner: InjectionScanner::with_defaults(),
            sandbox_context,
            system_prompt: String::new(),
            request_token_ceiling: 8_000,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_request_token_ceiling(mut self, ceiling: usize) -> Self {
        self.request_token_ceiling = ceiling;
        self
    }

    /// Run `task` to a terminal outcome against `limits`, polling `cancel`
    /// at every step boundary and suspension point.
    ///
    /// Returns `Err` only for the two CRITICAL kinds (`InvalidStateTransition`,
    /// `AuditWriteFailure`) — invariant violations the caller must treat as
    /// fatal and halt the process for, per the error handling design. Every
    /// other disposition is folded into `Outcome`.
    pub async fn run(&mut self, task: &str, limits: &Limits, cancel: &CancelToken) -> Result<Outcome, AriaError> {
        let started_at = Instant::now();
        let mut session = Session::new();

        self.audit.append(&session.id, EventKind::SessionStart, json!({"task": task}))?;
        self.transition(&mut session, SessionState::Running)?;
        session.push(Message::user(task));

        loop {
            if cancel.is_cancelled() {
                return self.finish_cancelled(&mut session);
            }

            if let Some(outcome) = self.check_budget(&mut session, limits, started_at)? {
                return Ok(outcome);
            }

            let request = self.build_request(&session);
            self.audit.append(
                &session.id,
                EventKind::ModelRequest,
                json!({"step": session.step_count, "message_count": request.messages.len()}),
            )?;

            if cancel.is_cancelled() {
                return self.finish_cancelled(&mut session);
            }

            let response = match self.router.send(&request).await {
                Ok(r) => r,
                Err(err) => return self.finish_failed(&mut session, err),
            };

            self.audit.append(
                &session.id,
                EventKind::ModelResponse,
                json!({"step": session.step_count, "cost": response.cost()}),
            )?;
            session.cumulative_cost += response.cost();

            match response {
                NormalizedResponse::Finalization { text, .. } => {
                    session.push(Message::assistant(text.clone()));
                    self.transition(&mut session, SessionState::Done)?;
                    self.audit.append(&session.id, EventKind::SessionEnd, json!({"outcome": "completed"}))?;
                    return Ok(Outcome::Completed(text));
                }
                NormalizedResponse::ToolCall { call_id, name, args, .. } => {
                    session.push(Message::tool_call(call_id.clone(), name.clone(), args.clone()));
                    self.transition(&mut session, SessionState::Waiting)?;

                    if cancel.is_cancelled() {
                        return self.finish_cancelled(&mut session);
                    }

                    match self.dispatch_tool(&session, &call_id, &name, &args).await {
                        Ok(result) => {
                            session.push(Message::tool_result(call_id, name, result));
                            self.transition(&mut session, SessionState::Running)?;
                            session.step_count += 1;
                        }
                        Err(err) => return self.finish_failed(&mut session, err),
                    }
                }
            }
        }
    }

    /// Validate `manifest's` input schema and permissions via the sandbox,
    /// running the injection scanner as an advisory pass first. A finding
    /// is logged, never blocking — schema validation inside the sandbox is
    /// the hard boundary.
    async fn dispatch_tool(&self, session: &Session, call_id: &str, name: &str, args: &serde_json::Value) -> Result<serde_json::Value, AriaError> {
        let manifest = self.registry.get(name).ok_or_else(|| AriaError::UnknownTool(name.to_string()))?;

        for finding in self.scanner.scan(args) {
            warn!(session_id = %session.id, call_id, tool = name, pattern = %finding.pattern_name, excerpt = %finding.excerpt, "injection scanner finding");
        }

        self.audit.append(
            &session.id,
            EventKind::ToolCall,
            json!({"call_id": call_id, "tool": name, "input": args}),
        )?;

        let outcome = self.sandbox.run(manifest, args, &self.sandbox_context).await;

        self.audit.append(
            &session.id,
            EventKind::ToolResult,
            json!({
                "call_id": call_id,
                "tool": name,
                "ok": outcome.is_ok(),
                "error": outcome.as_ref().err().map(|e| e.kind_name()),
            }),
        )?;

        outcome
    }

    /// Build the model request for the current step, dropping the oldest
    /// non-system messages (never splitting one, never dropping the
    /// original task) until the history fits `request_token_ceiling`.
    fn build_request(&self, session: &Session) -> CompletionRequest {
        let tools = self
            .registry
            .manifests()
            .into_iter()
            .map(|m| ToolManifestSummary { name: m.name.clone(), description: m.description.clone(), input_schema: m.input_schema.clone() })
            .collect();
        CompletionRequest {
            system_prompt: self.system_prompt.clone(),
            tools,
            messages: crate::truncate::truncate_messages(&session.history, self.request_token_ceiling),
            cache_key: None,
        }
    }

    /// Every check — steps, cost, deadline — emits one `BUDGET_CHECK`
    /// record regardless of outcome. Returns `Some(outcome)` when a limit
    /// was exceeded, having already transitioned the session to FAILED.
    fn check_budget(&self, session: &mut Session, limits: &Limits, started_at: Instant) -> Result<Option<Outcome>, AriaError> {
        let elapsed = started_at.elapsed();
        self.audit.append(
            &session.id,
            EventKind::BudgetCheck,
            json!({
                "step": session.step_count,
                "max_steps": limits.max_steps,
                "cumulative_cost": session.cumulative_cost,
                "max_cost_usd": limits.max_cost_usd,
                "elapsed_secs": elapsed.as_secs_f64(),
                "deadline_secs": limits.deadline.as_secs_f64(),
            }),
        )?;

        let breach = if session.step_count >= limits.max_steps {
            Some(AriaError::StepLimitExceeded { max_steps: limits.max_steps })
        } else if session.cumulative_cost >= limits.max_cost_usd {
            Some(AriaError::CostLimitExceeded { max_cost_usd: limits.max_cost_usd })
        } else if elapsed >= limits.deadline {
            Some(AriaError::DeadlineExceeded)
        } else {
            None
        };

        match breach {
            Some(err) => Ok(Some(self.finish_failed(session, err)?)),
            None => Ok(None),
        }
    }

    fn transition(&self, session: &mut Session, to: SessionState) -> Result<(), AriaError> {
        validate_transition(session.state, to)?;
        self.audit.append(
            &session.id,
            EventKind::StateTransition,
            json!({"from": session.state.to_string(), "to": to.to_string()}),
        )?;
        session.state = to;
        Ok(())
    }

    fn finish_failed(&self, session: &mut Session, err: AriaError) -> Result<Outcome, AriaError> {
        if err.is_critical() {
            // InvalidStateTransition / AuditWriteFailure: invariant violation.
            // Record what we can and propagate; the caller halts the process.
            let _ = self.audit.append(&session.id, EventKind::Error, json!({"kind": err.kind_name(), "message": err.to_string()}));
            return Err(err);
        }
        self.audit.append(&session.id, EventKind::Error, json!({"kind": err.kind_name(), "message": err.to_string()}))?;
        self.transition(session, SessionState::Failed)?;
        session.termination_reason = Some(err.kind_name().to_string());
        self.audit.append(&session.id, EventKind::SessionEnd, json!({"outcome": "failed", "kind": err.kind_name()}))?;
        info!(session_id = %session.id, kind = err.kind_name(), "session failed");
        Ok(Outcome::Failed { kind: err.kind_name().to_string(), message: err.to_string() })
    }

    fn finish_cancelled(&self, session: &mut Session) -> Result<Outcome, AriaError> {
        self.transition(session, SessionState::Cancelled)?;
        session.termination_reason = Some("cancelled".to_string());
        self.audit.append(&session.id, EventKind::SessionEnd, json!({"outcome": "cancelled"}))?;
        info!(session_id = %session.id, "session cancelled");
        Ok(Outcome::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aria_audit::Scrubber;
    use aria_model::ScriptedMockProvider;
    use aria_types::{Permission, ToolManifest};
    use serde_json::json;

    fn limits() -> Limits {
        Limits { max_steps: 10, max_cost_usd: 10.0, deadline: Duration::from_secs(60) }
    }

    fn kernel(router: Router, registry: ToolRegistry) -> AgentKernel {
        let audit = AuditStore::open_in_memory(Scrubber::new(vec![]).unwrap()).unwrap();
        AgentKernel::new(router, registry, audit, SandboxContext::new(vec![]))
    }

    #[tokio::test]
    async fn finalization_completes_the_session() {
        let router = Router::new("mock", Box::new(ScriptedMockProvider::always_text("done")));
        let mut k = kernel(router, ToolRegistry::new());
        let outcome = k.run("do the thing", &limits(), &CancelToken::new()).await.unwrap();
        assert_eq!(outcome, Outcome::Completed("done".into()));
    }

    #[tokio::test]
    async fn unknown_tool_fails_the_session() {
        let router = Router::new(
            "mock",
            Box::new(ScriptedMockProvider::tool_then_text("c1", "does_not_exist", json!({}), "unreached")),
        );
        let mut k = kernel(router, ToolRegistry::new());
        let outcome = k.run("task", &limits(), &CancelToken::new()).await.unwrap();
        assert!(matches!(outcome, Outcome::Failed { kind, .. } if kind == "UnknownTool"));
    }

    #[tokio::test]
    async fn step_limit_of_zero_fails_immediately() {
        let router = Router::new("mock", Box::new(ScriptedMockProvider::always_text("done")));
        let mut k = kernel(router, ToolRegistry::new());
        let zero_steps = Limits { max_steps: 0, max_cost_usd: 10.0, deadline: Duration::from_secs(60) };
        let outcome = k.run("task", &zero_steps, &CancelToken::new()).await.unwrap();
        assert!(matches!(outcome, Outcome::Failed { kind, .. } if kind == "StepLimitExceeded"));
    }

    #[tokio::test]
    async fn cost_ceiling_of_zero_fails_immediately() {
        let router = Router::new("mock", Box::new(ScriptedMockProvider::always_text("done")));
        let mut k = kernel(router, ToolRegistry::new());
        let zero_cost = Limits { max_steps: 10, max_cost_usd: 0.0, deadline: Duration::from_secs(60) };
        let outcome = k.run("task", &zero_cost, &CancelToken::new()).await.unwrap();
        assert!(matches!(outcome, Outcome::Failed { kind, .. } if kind == "CostLimitExceeded"));
    }

    #[tokio::test]
    async fn cancellation_before_first_step_yields_cancelled() {
        let router = Router::new("mock", Box::new(ScriptedMockProvider::always_text("done")));
        let mut k = kernel(router, ToolRegistry::new());
        let cancel = CancelToken::new();
        cancel.cancel();
        let outcome = k.run("task", &limits(), &cancel).await.unwrap();
        assert_eq!(outcome, Outcome::Cancelled);
    }

    #[tokio::test]
    async fn successful_tool_round_trip_then_finalization() {
        let router = Router::new(
            "mock",
            Box::new(ScriptedMockProvider::tool_then_text("c1", "echo_tool", json!({}), "all done")),
        );
        let mut registry = ToolRegistry::new();
        registry
            .register(ToolManifest {
                name: "echo_tool".into(),
                version: "1.0.0".into(),
                description: "echoes".into(),
                permissions: vec![Permission::None],
                allowed_paths: vec![],
                timeout_secs: 5,
                input_schema: json!({"type": "object"}),
                output_schema: json!({"type": "object"}),
                executable: Some(test_echo_script()),
                path_fields: vec![],
            })
            .unwrap();
        let mut k = kernel(router, registry);
        let outcome = k.run("task", &limits(), &CancelToken::new()).await.unwrap();
        assert_eq!(outcome, Outcome::Completed("all done".into()));
    }

    /// A tiny on-disk shell script standing in for a compiled plugin binary,
    /// used only to drive the sandbox's real out-of-process path in tests.
    fn test_echo_script() -> String {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.sh");
        let mut f = std::fs::File::create(&path).unwrap();
        write!(f, "#!/bin/sh\ncat >/dev/null; echo '{{\"ok\":true,\"output\":{{}}}}'\n").unwrap();
        let mut perms = f.metadata().unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        std::mem::forget(dir);
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn non_retryable_model_error_fails_the_session() {
        let router = Router::new(
            "mock",
            Box::new(ScriptedMockProvider::new(vec![Err(AriaError::ModelResponseMalformed("bad".into()))])),
        );
        let mut k = kernel(router, ToolRegistry::new());
        let outcome = k.run("task", &limits(), &CancelToken::new()).await.unwrap();
        assert!(matches!(outcome, Outcome::Failed { kind, .. } if kind == "ModelResponseMalformed"));
    }
}
