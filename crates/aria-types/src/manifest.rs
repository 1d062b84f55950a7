// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Closed set of capabilities a tool may declare. The sandbox enforces that
/// a manifest's permissions are a subset of what the session grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    None,
    FilesystemRead,
    FilesystemWrite,
    Network,
    Subprocess,
}

/// The declarative description of a tool: schemas, permissions, paths, timeout.
/// Immutable for the process lifetime once registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolManifest {
    pub name: String,
    /// Semantic version string, e.g. "1.2.0".
    pub version: String,
    /// Injected verbatim into the model prompt.
    pub description: String,
    pub permissions: Vec<Permission>,
    /// Absolute path prefixes this tool may touch. Only meaningful when a
    /// filesystem permission is present.
    #[serde(default)]
    pub allowed_paths: Vec<String>,
    /// Whole seconds, must be positive.
    pub timeout_secs: u64,
    pub input_schema: Value,
    pub output_schema: Value,
    /// Path to the executable backing this manifest. Set by the loader, not
    /// part of the manifest file itself.
    #[serde(default)]
    pub executable: Option<String>,
    /// Names of input_schema properties that the sandbox must treat as
    /// filesystem paths subject to canonicalization + allowlist checks.
    #[serde(default)]
    pub path_fields: Vec<String>,
}

impl ToolManifest {
    /// Validate structural well-formedness independent of registry state
    /// (uniqueness is checked by the registry at load time).
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("manifest name must not be empty".into());
        }
        if semver_parse(&self.version).is_none() {
            return Err(format!("manifest '{}': version '{}' is not parseable semver", self.name, self.version));
        }
        if self.timeout_secs == 0 {
            return Err(format!("manifest '{}': timeout_secs must be positive", self.name));
        }
        if !self.input_schema.is_object() {
            return Err(format!("manifest '{}': input_schema must be a JSON object", self.name));
        }
        if !self.output_schema.is_object() {
            return Err(format!("manifest '{}': output_schema must be a JSON object", self.name));
        }
        for p in &self.allowed_paths {
            if !p.starts_with('/') {
                return Err(format!("manifest '{}': allowed_paths entries must be absolute, got '{}'", self.name, p));
            }
        }
        Ok(())
    }

    pub fn requires_filesystem(&self) -> bool {
        self.permissions
            .iter()
            .any(|p| matches!(p, Permission::FilesystemRead | Permission::FilesystemWrite))
    }
}

/// Minimal `MAJOR.MINOR.PATCH` semver check — sufficient to reject garbage
/// version strings without pulling in a full semver parser for three fields.
fn semver_parse(v: &str) -> Option<(u64, u64, u64)> {
    let mut parts = v.split('.');
    let major: u64 = parts.next()?.parse().ok()?;
    let minor: u64 = parts.next()?.parse().ok()?;
    let patch: u64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((major, minor, patch))
}

/// Record of one tool invocation, independent of success/failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocationRecord {
    pub tool_name: String,
    pub input: Value,
    /// `Ok(output)` on success, `Err(kind_name)` on failure.
    pub outcome: Result<Value, String>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: chrono::DateTime<chrono::Utc>,
    pub exit_status: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manifest() -> ToolManifest {
        ToolManifest {
            name: "read_file".into(),
            version: "1.0.0".into(),
            description: "reads a file".into(),
            permissions: vec![Permission::FilesystemRead],
            allowed_paths: vec!["/tmp".into()],
            timeout_secs: 5,
            input_schema: json!({"type": "object"}),
            output_schema: json!({"type": "object"}),
            executable: None,
            path_fields: vec!["path".into()],
        }
    }

    #[test]
    fn valid_manifest_passes() {
        assert!(manifest().validate().is_ok());
    }

    #[test]
    fn empty_name_rejected() {
        let mut m = manifest();
        m.name = "".into();
        assert!(m.validate().is_err());
    }

    #[test]
    fn unparseable_version_rejected() {
        let mut m = manifest();
        m.version = "not-a-version".into();
        assert!(m.validate().is_err());
    }

    #[test]
    fn zero_timeout_rejected() {
        let mut m = manifest();
        m.timeout_secs = 0;
        assert!(m.validate().is_err());
    }

    #[test]
    fn relative_allowed_path_rejected() {
        let mut m = manifest();
        m.allowed_paths = vec!["tmp/relative".into()];
        assert!(m.validate().is_err());
    }

    #[test]
    fn non_object_schema_rejected() {
        let mut m = manifest();
        m.input_schema = json!("not an object");
        assert!(m.validate().is_err());
    }

    #[test]
    fn requires_filesystem_true_for_read_permission() {
        assert!(manifest().requires_filesystem());
    }

    #[test]
    fn requires_filesystem_false_for_network_only() {
        let mut m = manifest();
        m.permissions = vec![Permission::Network];
        assert!(!m.requires_filesystem());
    }
}
