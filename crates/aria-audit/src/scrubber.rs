// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Secrets scrubber: redacts sensitive substrings from any payload before it
//! is hashed and persisted by the audit store.
//!
//! The scrubber cannot be disabled — there is no constructor path that
//! yields a store without one, and no audit append bypasses `scrub`.

use regex::Regex;
use serde_json::Value;

const REDACTED: &str = "[REDACTED]";

/// Environment variables whose values, if set, are registered as exact-match
/// secrets at startup. Extend this list as new provider credentials are added.
pub const KNOWN_SECRET_ENV_VARS: &[&str] = &["ANTHROPIC_API_KEY", "OPENAI_API_KEY", "OLLAMA_API_KEY"];

/// Matches common API key substrings independent of any registered secret.
pub struct Scrubber {
    /// Exact substrings to redact, e.g. resolved env var values.
    literal_secrets: Vec<String>,
    /// Regexes for known API-key shapes (provider-prefixed tokens, bearer
    /// tokens, generic high-entropy hex/base64 keys).
    patterns: Vec<Regex>,
}

impl Scrubber {
    /// Build a scrubber from an explicit list of literal secrets.
    pub fn new(literal_secrets: Vec<String>) -> Result<Self, String> {
        let pattern_sources = [
            r"sk-ant-[A-Za-z0-9\-_]{20,}",
            r"sk-[A-Za-z0-9]{20,}",
            r"AKIA[0-9A-Z]{16}",
            r"Bearer\s+[A-Za-z0-9\-_.]{20,}",
            r"ghp_[A-Za-z0-9]{36}",
        ];
        let mut patterns = Vec::with_capacity(pattern_sources.len());
        for src in pattern_sources {
            let re = Regex::new(src).map_err(|e| format!("scrubber pattern engine error: {e}"))?;
            patterns.push(re);
        }
        Ok(Self {
            literal_secrets: literal_secrets.into_iter().filter(|s| !s.is_empty()).collect(),
            patterns,
        })
    }

    /// Build a scrubber pre-loaded with the values of [`KNOWN_SECRET_ENV_VARS`]
    /// that are currently set in the process environment.
    pub fn from_environment() -> Result<Self, String> {
        let literals = KNOWN_SECRET_ENV_VARS
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .collect();
        Self::new(literals)
    }

    fn redact_str(&self, s: &str) -> String {
        let mut out = s.to_string();
        for secret in &self.literal_secrets {
            if !secret.is_empty() {
                out = out.replace(secret.as_str(), REDACTED);
            }
        }
        for re in &self.patterns {
            out = re.replace_all(&out, REDACTED).into_owned();
        }
        out
    }

    /// Recursively scrub every string leaf in a JSON value.
    pub fn scrub(&self, value: &Value) -> Result<Value, String> {
        Ok(match value {
            Value::String(s) => Value::String(self.redact_str(s)),
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.scrub(item)?);
                }
                Value::Array(out)
            }
            Value::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), self.scrub(v)?);
                }
                Value::Object(out)
            }
            other => other.clone(),
        })
    }

    /// `true` if no registered secret substring appears verbatim in `value`.
    /// Used by tests to assert the scrubber invariant holds end-to-end.
    pub fn contains_no_secret(&self, value: &Value) -> bool {
        let text = value.to_string();
        self.literal_secrets.iter().all(|s| !s.is_empty() && !text.contains(s.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn literal_secret_redacted() {
        let s = Scrubber::new(vec!["super-secret-value".into()]).unwrap();
        let v = json!({"msg": "key is super-secret-value here"});
        let scrubbed = s.scrub(&v).unwrap();
        assert_eq!(scrubbed["msg"], "key is [REDACTED] here");
    }

    #[test]
    fn anthropic_style_key_pattern_redacted() {
        let s = Scrubber::new(vec![]).unwrap();
        let v = json!({"msg": "token sk-ant-REDACTED"});
        let scrubbed = s.scrub(&v).unwrap();
        assert!(!scrubbed["msg"].as_str().unwrap().contains("sk-ant-"));
    }

    #[test]
    fn nested_structures_are_scrubbed() {
        let s = Scrubber::new(vec!["topsecret".into()]).unwrap();
        let v = json!({"a": {"b": ["topsecret", "fine"]}});
        let scrubbed = s.scrub(&v).unwrap();
        assert_eq!(scrubbed["a"]["b"][0], "[REDACTED]");
        assert_eq!(scrubbed["a"]["b"][1], "fine");
    }

    #[test]
    fn non_string_values_untouched() {
        let s = Scrubber::new(vec![]).unwrap();
        let v = json!({"n": 42, "b": true, "z": null});
        let scrubbed = s.scrub(&v).unwrap();
        assert_eq!(scrubbed, v);
    }

    #[test]
    fn contains_no_secret_detects_leak() {
        let s = Scrubber::new(vec!["leak-me".into()]).unwrap();
        assert!(!s.contains_no_secret(&json!({"x": "leak-me"})));
        let scrubbed = s.scrub(&json!({"x": "leak-me"})).unwrap();
        assert!(s.contains_no_secret(&scrubbed));
    }

    #[test]
    fn empty_literal_list_is_a_noop_for_literals() {
        let s = Scrubber::new(vec![]).unwrap();
        let v = json!({"x": "nothing secret here"});
        assert_eq!(s.scrub(&v).unwrap(), v);
    }
}
