// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Runs a fixed argv vector as a child process. There is no shell anywhere
//! in this path: `argv[0]` is looked up and exec'd directly, and every
//! later element is passed to the child verbatim, never concatenated into
//! a command line a shell would re-parse.

use serde_json::json;
use std::process::Command;

fn main() {
    aria_plugin_sdk::run(|input| {
        let argv = input
            .get("argv")
            .and_then(|v| v.as_array())
            .ok_or_else(|| "missing required array field 'argv'".to_string())?;

        let mut parts = Vec::with_capacity(argv.len());
        for entry in argv {
            let s = entry.as_str().ok_or_else(|| "argv entries must all be strings".to_string())?;
            parts.push(s.to_string());
        }
        let (program, args) = parts.split_first().ok_or_else(|| "argv must not be empty".to_string())?;

        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| format!("spawning '{program}': {e}"))?;

        Ok(json!({
            "stdout": String::from_utf8_lossy(&output.stdout),
            "stderr": String::from_utf8_lossy(&output.stderr),
            "exit_code": output.status.code().unwrap_or(-1),
        }))
    });
}
