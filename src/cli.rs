// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "aria", version, about = "A deterministic, audited agent kernel")]
pub struct Cli {
    /// Path to a config file layered on top of the discovered search paths.
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a task to completion under the configured step/cost/deadline budget.
    Run {
        /// The task text handed to the model as the session's first message.
        task: String,
        /// Wall-clock deadline for the whole run, in seconds.
        #[arg(long, default_value_t = 300)]
        deadline_secs: u64,
    },

    /// List the tools the registry loaded successfully.
    Tools,

    /// Audit log operations.
    #[command(subcommand)]
    Audit(AuditCommands),
}

#[derive(Subcommand, Debug)]
pub enum AuditCommands {
    /// List the most recent audit records across all sessions.
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Export one session's audit chain.
    Export {
        session_id: String,
        #[arg(long, value_enum, default_value_t = ExportFormatArg::Json)]
        format: ExportFormatArg,
    },
    /// Recompute and verify one session's hash chain.
    Verify { session_id: String },
}

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
pub enum ExportFormatArg {
    Json,
    Text,
}

impl From<ExportFormatArg> for aria_audit::ExportFormat {
    fn from(v: ExportFormatArg) -> Self {
        match v {
            ExportFormatArg::Json => aria_audit::ExportFormat::Json,
            ExportFormatArg::Text => aria_audit::ExportFormat::Text,
        }
    }
}
