// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single entry in a session's conversation history.
///
/// Ordering within a session is total and append-only: messages are never
/// reordered or removed except by the kernel's deterministic truncation
/// policy, which drops whole messages rather than mutating them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    User { text: String },
    Assistant { text: String },
    System { text: String },
    /// The model requested a tool invocation.
    ToolCall { call_id: String, tool_name: String, arguments: Value },
    /// The observation returned from executing a tool call.
    ToolResult { call_id: String, tool_name: String, result: Value },
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self::User { text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::Assistant { text: text.into() }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::System { text: text.into() }
    }

    pub fn tool_call(call_id: impl Into<String>, tool_name: impl Into<String>, arguments: Value) -> Self {
        Self::ToolCall { call_id: call_id.into(), tool_name: tool_name.into(), arguments }
    }

    pub fn tool_result(call_id: impl Into<String>, tool_name: impl Into<String>, result: Value) -> Self {
        Self::ToolResult { call_id: call_id.into(), tool_name: tool_name.into(), result }
    }

    /// Plain-text view used for token estimation and transcript rendering.
    pub fn as_text(&self) -> String {
        match self {
            Self::User { text } | Self::Assistant { text } | Self::System { text } => text.clone(),
            Self::ToolCall { tool_name, arguments, .. } => format!("{tool_name}({arguments})"),
            Self::ToolResult { tool_name, result, .. } => format!("{tool_name} -> {result}"),
        }
    }

    /// Deterministic length-based token estimate (see context truncation,
    /// open question on token-estimation strategy): one token per four
    /// characters of the plain-text view, floor-rounded, minimum one.
    pub fn approx_tokens(&self) -> usize {
        (self.as_text().len() / 4).max(1)
    }

    /// `true` for the message that carries the session's original task.
    /// Used by truncation to guarantee the task is never dropped.
    pub fn is_user(&self) -> bool {
        matches!(self, Self::User { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn as_text_roundtrips_plain_variants() {
        assert_eq!(Message::user("hi").as_text(), "hi");
        assert_eq!(Message::assistant("yo").as_text(), "yo");
        assert_eq!(Message::system("sys").as_text(), "sys");
    }

    #[test]
    fn approx_tokens_floor_divides_by_four() {
        assert_eq!(Message::user("12345678").approx_tokens(), 2);
        assert_eq!(Message::user("a").approx_tokens(), 1); // floor(1/4)=0 -> min 1
    }

    #[test]
    fn tool_call_contains_name_and_args() {
        let m = Message::tool_call("c1", "read_file", json!({"path": "/tmp/x"}));
        assert!(m.as_text().contains("read_file"));
    }

    #[test]
    fn serde_roundtrip_preserves_variant() {
        let m = Message::tool_result("c1", "read_file", json!({"content": "hello"}));
        let s = serde_json::to_string(&m).unwrap();
        let back: Message = serde_json::from_str(&s).unwrap();
        assert_eq!(m, back);
    }
}
