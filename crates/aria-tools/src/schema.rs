// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! JSON-Schema validation wrapper. Any conformant validator suffices per the
//! design notes; `jsonschema` is used here for draft 2020-12 support.

use serde_json::Value;

/// Validate `instance` against `schema`, returning the first error message
/// on failure. A malformed schema itself is also reported as an error.
pub fn validate(schema: &Value, instance: &Value) -> Result<(), String> {
    let validator = jsonschema::validator_for(schema).map_err(|e| format!("invalid schema: {e}"))?;
    match validator.validate(instance) {
        Ok(()) => Ok(()),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_instance_passes() {
        let schema = json!({"type": "object", "properties": {"path": {"type": "string"}}, "required": ["path"]});
        assert!(validate(&schema, &json!({"path": "/tmp/x"})).is_ok());
    }

    #[test]
    fn missing_required_field_fails() {
        let schema = json!({"type": "object", "required": ["path"]});
        assert!(validate(&schema, &json!({})).is_err());
    }

    #[test]
    fn wrong_type_fails() {
        let schema = json!({"type": "object", "properties": {"n": {"type": "number"}}});
        assert!(validate(&schema, &json!({"n": "not a number"})).is_err());
    }

    #[test]
    fn malformed_schema_reported_as_error() {
        let schema = json!({"type": "not-a-real-type"});
        assert!(validate(&schema, &json!({})).is_err());
    }
}
