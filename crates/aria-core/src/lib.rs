// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Agent Kernel: the deterministic step loop driving the session state
//! machine, plus the pure FSM validator and context truncation policy it
//! builds on.

pub mod fsm;
pub mod kernel;
mod truncate;

pub use kernel::{AgentKernel, CancelToken, Limits, Outcome};
