// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Deterministic context truncation for the model request the kernel builds
//! each step. History itself is never mutated — only the slice handed to
//! the provider is trimmed.

use aria_types::Message;

/// Drop whole messages, oldest first, until the remaining set fits
/// `ceiling_tokens`. System messages and the original user task are never
/// dropped; no message is ever split.
pub fn truncate_messages(history: &[Message], ceiling_tokens: usize) -> Vec<Message> {
    let total: usize = history.iter().map(Message::approx_tokens).sum();
    if total <= ceiling_tokens {
        return history.to_vec();
    }

    let original_task_idx = history.iter().position(Message::is_user);
    let mut kept: Vec<(usize, &Message)> = history.iter().enumerate().collect();
    let mut remaining = total;

    let mut i = 0;
    while remaining > ceiling_tokens && i < kept.len() {
        let (idx, msg) = kept[i];
        let protected = matches!(msg, Message::System { .. }) || Some(idx) == original_task_idx;
        if protected {
            i += 1;
            continue;
        }
        remaining -= msg.approx_tokens();
        kept.remove(i);
    }

    kept.into_iter().map(|(_, m)| m.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn under_ceiling_returns_full_history_unchanged() {
        let history = vec![Message::user("hi"), Message::assistant("hello")];
        let out = truncate_messages(&history, 1_000);
        assert_eq!(out, history);
    }

    #[test]
    fn drops_oldest_non_system_messages_first() {
        let history = vec![
            Message::user("original task, kept no matter what"),
            Message::assistant(&"a".repeat(40)),
            Message::assistant(&"b".repeat(40)),
            Message::assistant("recent"),
        ];
        let out = truncate_messages(&history, 20);
        // The original task always survives; the oldest filler assistant
        // turn is the first to go.
        assert!(out.iter().any(|m| matches!(m, Message::User { .. })));
        assert!(!out.contains(&history[1]));
    }

    #[test]
    fn never_drops_the_original_user_task() {
        let history = vec![Message::user("keep me"), Message::assistant(&"x".repeat(4000))];
        let out = truncate_messages(&history, 5);
        assert_eq!(out[0], Message::user("keep me"));
    }

    #[test]
    fn never_drops_system_messages() {
        let history = vec![
            Message::system("you are aria"),
            Message::user("task"),
            Message::assistant(&"filler".repeat(100)),
        ];
        let out = truncate_messages(&history, 5);
        assert!(out.iter().any(|m| matches!(m, Message::System { .. })));
    }

    #[test]
    fn never_splits_a_message() {
        let history = vec![Message::user("task"), Message::assistant("short one"), Message::assistant("short two")];
        let out = truncate_messages(&history, 3);
        for kept in &out {
            assert!(history.contains(kept));
        }
    }

    #[test]
    fn tool_call_and_result_pairs_are_droppable_like_any_other_message() {
        let history = vec![
            Message::user("task"),
            Message::tool_call("c1", "t", json!({"a": "x".repeat(200)})),
            Message::tool_result("c1", "t", json!({"b": "y".repeat(200)})),
            Message::assistant("final answer"),
        ];
        let out = truncate_messages(&history, 10);
        assert!(out.iter().any(|m| matches!(m, Message::User { .. })));
        assert!(out.iter().any(|m| matches!(m, Message::Assistant { text } if text == "final answer")));
    }
}
