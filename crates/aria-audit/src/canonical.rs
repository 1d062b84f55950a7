// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Canonical JSON serialization used as the byte input to every audit hash.
//!
//! Sorted keys, no insignificant whitespace, one textual form per number.
//! Implemented by hand rather than relying on `serde_json::Map`'s default
//! ordering: if any dependency in the build graph enables serde_json's
//! `preserve_order` feature, Cargo's feature unification would silently
//! switch `Map` to an insertion-ordered map crate-wide and break the hash
//! chain's determinism.

use serde_json::Value;

/// Render `value` into its canonical textual form.
pub fn canonical_string(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

/// Render and encode as UTF-8 bytes — the exact input fed to SHA-256.
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    canonical_string(value).into_bytes()
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, k) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(k, out);
                out.push(':');
                write_value(&map[*k], out);
            }
            out.push('}');
        }
    }
}

fn write_string(s: &str, out: &mut String) {
    // serde_json's string serializer already produces minimal, correctly
    // escaped JSON string literals; reuse it rather than reimplementing
    // escaping rules.
    out.push_str(&serde_json::to_string(s).expect("string serialization is infallible"));
}
