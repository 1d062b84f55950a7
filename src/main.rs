// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use cli::{AuditCommands, Cli, Commands};

use aria_audit::{AuditStore, Scrubber};
use aria_config::Config;
use aria_core::{AgentKernel, CancelToken, Limits};
use aria_model::{ProviderConfig, Router};
use aria_tools::{SandboxContext, ToolRegistry};
use aria_types::{AriaError, Permission};

fn init_logging(cfg: &Config) -> anyhow::Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    let level = cfg.logging.level.to_string();
    let file = std::fs::OpenOptions::new().create(true).append(true).open(&cfg.logging.log_path)?;
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(tracing_subscriber::EnvFilter::new(level))
        .with_writer(file.with_max_level(tracing::Level::TRACE))
        .init();
    Ok(())
}

fn plugins_dir() -> PathBuf {
    std::env::var_os("ARIA_PLUGINS_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("./plugins"))
}

fn build_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for outcome in registry.load_dir(&plugins_dir()) {
        tracing::info!(?outcome, "tool load outcome");
    }
    registry
}

fn build_router(cfg: &Config) -> Result<Router, AriaError> {
    let provider_cfg = ProviderConfig {
        provider: cfg.model.provider.clone(),
        model: cfg.model.name.clone(),
        api_key: cfg.model.api_key.clone(),
        base_url: cfg.model.base_url.clone(),
    };
    let primary = aria_model::from_config(&provider_cfg)?;
    Ok(Router::new(cfg.model.provider.clone(), primary))
}

fn build_audit(cfg: &Config) -> anyhow::Result<AuditStore> {
    let scrubber = Scrubber::from_environment().map_err(anyhow::Error::msg)?;
    Ok(AuditStore::open(&PathBuf::from(&cfg.storage.db_path), scrubber)?)
}

async fn run_task(cfg: &Config, task: &str, deadline_secs: u64) -> anyhow::Result<i32> {
    let router = build_router(cfg)?;
    let registry = build_registry();
    let audit = build_audit(cfg)?;
    let sandbox_context = SandboxContext::new(vec![
        Permission::FilesystemRead,
        Permission::FilesystemWrite,
        Permission::Network,
        Permission::Subprocess,
    ]);

    let mut kernel = AgentKernel::new(router, registry, audit, sandbox_context)
        .with_system_prompt("You are ARIA, a deterministic, audited task-running agent.");

    let limits = Limits { max_steps: cfg.budget.max_steps, max_cost_usd: cfg.budget.max_cost_usd, deadline: Duration::from_secs(deadline_secs) };
    let cancel = CancelToken::new();

    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_token.cancel();
        }
    });

    match kernel.run(task, &limits, &cancel).await {
        Ok(aria_core::Outcome::Completed(text)) => {
            println!("{text}");
            Ok(0)
        }
        Ok(aria_core::Outcome::Failed { kind, message }) => {
            eprintln!("task failed ({kind}): {message}");
            let code = match kind.as_str() {
                "StepLimitExceeded" | "CostLimitExceeded" | "DeadlineExceeded" => 3,
                "UnknownTool" | "ToolInputValidationError" | "ToolOutputValidationError" | "ToolTimeout" | "ToolCrashed"
                | "PathTraversal" | "PermissionDenied" => 4,
                "ModelProviderError" | "ModelRateLimitError" | "ModelResponseMalformed" | "CircuitBreakerOpen" => 5,
                _ => 5,
            };
            Ok(code)
        }
        Ok(aria_core::Outcome::Cancelled) => {
            eprintln!("task cancelled");
            Ok(2)
        }
        Err(err) => {
            eprintln!("fatal invariant violation: {err}");
            Ok(err.exit_code())
        }
    }
}

fn run_tools_list(cfg: &Config) -> anyhow::Result<i32> {
    let _ = cfg;
    let registry = build_registry();
    for manifest in registry.manifests() {
        println!("{}\t{}\t{}", manifest.name, manifest.version, manifest.description);
    }
    Ok(0)
}

fn run_audit_list(cfg: &Config, limit: usize) -> anyhow::Result<i32> {
    let audit = build_audit(cfg)?;
    for record in audit.list_recent(limit)? {
        println!("{}", serde_json::to_string(&record)?);
    }
    Ok(0)
}

fn run_audit_export(cfg: &Config, session_id: &str, format: aria_audit::ExportFormat) -> anyhow::Result<i32> {
    let audit = build_audit(cfg)?;
    let bytes = audit.export(session_id, format)?;
    std::io::Write::write_all(&mut std::io::stdout(), &bytes)?;
    Ok(0)
}

fn run_audit_verify(cfg: &Config, session_id: &str) -> anyhow::Result<i32> {
    let audit = build_audit(cfg)?;
    match audit.verify(session_id)? {
        aria_audit::VerifyOutcome::Ok => {
            println!("chain ok");
            Ok(0)
        }
        other => {
            eprintln!("chain verification failed: {other:?}");
            Ok(4)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = aria_config::load(cli.config.as_deref())?;
    init_logging(&cfg)?;

    let code = match &cli.command {
        Commands::Run { task, deadline_secs } => run_task(&cfg, task, *deadline_secs).await?,
        Commands::Tools => run_tools_list(&cfg)?,
        Commands::Audit(AuditCommands::List { limit }) => run_audit_list(&cfg, *limit)?,
        Commands::Audit(AuditCommands::Export { session_id, format }) => run_audit_export(&cfg, session_id, (*format).into())?,
        Commands::Audit(AuditCommands::Verify { session_id }) => run_audit_verify(&cfg, session_id)?,
    };

    std::process::exit(code);
}
