// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Shared stdio wire protocol for out-of-process plugins.
//!
//! A plugin reads a single JSON object from stdin, does its work, and
//! writes a single JSON reply to stdout: `{"ok": true, "output": <value>}`
//! or `{"ok": false, "error": "<message>"}`. The host (the sandbox runner)
//! never inspects the child's exit status when stdout parses as one of
//! these two shapes, so a plugin always exits 0 and lets the reply body
//! carry success or failure.

use std::io::{Read, Write};

use serde_json::Value;

/// Read one JSON request from stdin, run `handler`, and write the reply to
/// stdout. Malformed stdin or a stdin read failure is reported the same
/// way as a handler error — as an `{"ok": false, ...}` reply — since the
/// host has no other channel to observe it.
pub fn run<F>(handler: F)
where
    F: FnOnce(Value) -> Result<Value, String>,
{
    let mut input_text = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut input_text) {
        write_reply(&error_reply(&format!("reading stdin: {e}")));
        return;
    }

    let input: Value = match serde_json::from_str(&input_text) {
        Ok(v) => v,
        Err(e) => {
            write_reply(&error_reply(&format!("parsing input as JSON: {e}")));
            return;
        }
    };

    let reply = match handler(input) {
        Ok(output) => serde_json::json!({"ok": true, "output": output}),
        Err(message) => error_reply(&message),
    };
    write_reply(&reply);
}

/// Fetch a required string field from the input object, for plugins whose
/// schema names a single required string argument.
pub fn require_str<'a>(input: &'a Value, field: &str) -> Result<&'a str, String> {
    input
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("missing required string field '{field}'"))
}

fn error_reply(message: &str) -> Value {
    serde_json::json!({"ok": false, "error": message})
}

fn write_reply(reply: &Value) {
    let text = serde_json::to_string(reply)
        .unwrap_or_else(|_| "{\"ok\":false,\"error\":\"failed to encode reply\"}".to_string());
    let _ = std::io::stdout().write_all(text.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn require_str_returns_present_field() {
        let v = json!({"path": "/tmp/x"});
        assert_eq!(require_str(&v, "path").unwrap(), "/tmp/x");
    }

    #[test]
    fn require_str_errors_on_missing_field() {
        let v = json!({});
        assert!(require_str(&v, "path").is_err());
    }

    #[test]
    fn require_str_errors_on_wrong_type() {
        let v = json!({"path": 5});
        assert!(require_str(&v, "path").is_err());
    }
}
