// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use aria_plugin_sdk::require_str;
use serde_json::json;

fn main() {
    aria_plugin_sdk::run(|input| {
        let url = require_str(&input, "url")?;
        let method = input.get("method").and_then(|v| v.as_str()).unwrap_or("GET").to_uppercase();
        let method: reqwest::Method = method.parse().map_err(|_| format!("unsupported HTTP method '{method}'"))?;

        let client = reqwest::blocking::Client::new();
        let response = client.request(method, url).send().map_err(|e| format!("request failed: {e}"))?;
        let status = response.status().as_u16();
        let body = response.text().map_err(|e| format!("reading response body: {e}"))?;

        Ok(json!({"status": status, "body": body}))
    });
}
