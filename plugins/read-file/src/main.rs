// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use aria_plugin_sdk::require_str;
use serde_json::json;

fn main() {
    aria_plugin_sdk::run(|input| {
        let path = require_str(&input, "path")?;
        let content = std::fs::read_to_string(path).map_err(|e| format!("reading {path}: {e}"))?;
        Ok(json!({"content": content}))
    });
}
