// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::Message;

/// One of the six legal session states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Running,
    Waiting,
    Done,
    Failed,
    Cancelled,
}

impl SessionState {
    /// Terminal states admit no further transition.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "IDLE",
            Self::Running => "RUNNING",
            Self::Waiting => "WAITING",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// One task-scoped execution of the kernel.
///
/// The Kernel exclusively owns this while a step executes; it is never
/// shared across concurrent steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub state: SessionState,
    /// Monotonically increasing; never decreases.
    pub step_count: u32,
    /// Cumulative cost in USD; never decreases.
    pub cumulative_cost: f64,
    pub created_at: DateTime<Utc>,
    pub termination_reason: Option<String>,
    pub history: Vec<Message>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            state: SessionState::Idle,
            step_count: 0,
            cumulative_cost: 0.0,
            created_at: Utc::now(),
            termination_reason: None,
            history: Vec::new(),
        }
    }

    pub fn push(&mut self, msg: Message) {
        self.history.push(msg);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_idle() {
        let s = Session::new();
        assert_eq!(s.state, SessionState::Idle);
        assert_eq!(s.step_count, 0);
        assert_eq!(s.cumulative_cost, 0.0);
        assert!(s.history.is_empty());
    }

    #[test]
    fn new_sessions_have_unique_ids() {
        let a = Session::new();
        let b = Session::new();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn terminal_states_are_terminal() {
        assert!(SessionState::Done.is_terminal());
        assert!(SessionState::Failed.is_terminal());
        assert!(SessionState::Cancelled.is_terminal());
        assert!(!SessionState::Idle.is_terminal());
        assert!(!SessionState::Running.is_terminal());
        assert!(!SessionState::Waiting.is_terminal());
    }
}
