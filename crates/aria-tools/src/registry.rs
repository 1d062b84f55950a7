// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Tool registry: loads and validates manifests from plugin directories.
//!
//! Each plugin directory contains a `manifest.json` describing the tool and
//! an executable (named by the manifest's `executable` field, or defaulting
//! to `run` in the same directory) that speaks the stdio protocol in
//! [`crate::sandbox`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use aria_types::ToolManifest;
use tracing::warn;

/// Outcome of loading a single plugin directory.
#[derive(Debug)]
pub enum LoadOutcome {
    Registered(String),
    Rejected { path: PathBuf, reason: String },
}

/// Immutable post-load registry of validated tool manifests.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    manifests: HashMap<String, ToolManifest>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan `dir` for plugin subdirectories, each containing `manifest.json`.
    /// Invalid or duplicate manifests are rejected and logged; already
    /// registered tools are unaffected.
    pub fn load_dir(&mut self, dir: &Path) -> Vec<LoadOutcome> {
        let mut outcomes = Vec::new();
        let entries = match std::fs::read_dir(dir) {
            Ok(e) => e,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "could not read plugin directory");
                return outcomes;
            }
        };
        let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
        paths.sort();
        for path in paths {
            if !path.is_dir() {
                continue;
            }
            let manifest_path = path.join("manifest.json");
            outcomes.push(self.load_one(&manifest_path));
        }
        outcomes
    }

    fn load_one(&mut self, manifest_path: &Path) -> LoadOutcome {
        let reject = |reason: String| LoadOutcome::Rejected { path: manifest_path.to_path_buf(), reason };

        let text = match std::fs::read_to_string(manifest_path) {
            Ok(t) => t,
            Err(e) => return reject(format!("reading manifest: {e}")),
        };
        let mut manifest: ToolManifest = match serde_json::from_str(&text) {
            Ok(m) => m,
            Err(e) => return reject(format!("parsing manifest: {e}")),
        };
        if let Err(e) = manifest.validate() {
            return reject(e);
        }
        if self.manifests.contains_key(&manifest.name) {
            return reject(format!("duplicate tool name '{}'", manifest.name));
        }

        let plugin_dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));
        let exe_name = manifest.executable.clone().unwrap_or_else(|| "run".to_string());
        let exe_path = plugin_dir.join(&exe_name);
        manifest.executable = Some(exe_path.to_string_lossy().into_owned());

        let name = manifest.name.clone();
        self.manifests.insert(name.clone(), manifest);
        LoadOutcome::Registered(name)
    }

    /// Register a manifest directly (used by tests and by hosts that embed
    /// manifests rather than loading them from disk).
    pub fn register(&mut self, manifest: ToolManifest) -> Result<(), String> {
        manifest.validate()?;
        if self.manifests.contains_key(&manifest.name) {
            return Err(format!("duplicate tool name '{}'", manifest.name));
        }
        self.manifests.insert(manifest.name.clone(), manifest);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ToolManifest> {
        self.manifests.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.manifests.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn manifests(&self) -> Vec<&ToolManifest> {
        let mut v: Vec<&ToolManifest> = self.manifests.values().collect();
        v.sort_by(|a, b| a.name.cmp(&b.name));
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aria_types::Permission;
    use serde_json::json;
    use std::io::Write;

    fn sample_manifest(name: &str) -> ToolManifest {
        ToolManifest {
            name: name.into(),
            version: "1.0.0".into(),
            description: "test tool".into(),
            permissions: vec![Permission::None],
            allowed_paths: vec![],
            timeout_secs: 5,
            input_schema: json!({"type": "object"}),
            output_schema: json!({"type": "object"}),
            executable: None,
            path_fields: vec![],
        }
    }

    #[test]
    fn register_then_get() {
        let mut reg = ToolRegistry::new();
        reg.register(sample_manifest("echo")).unwrap();
        assert!(reg.get("echo").is_some());
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut reg = ToolRegistry::new();
        reg.register(sample_manifest("echo")).unwrap();
        let err = reg.register(sample_manifest("echo"));
        assert!(err.is_err());
        // Already-registered tool remains usable.
        assert!(reg.get("echo").is_some());
    }

    #[test]
    fn invalid_manifest_rejected_before_insertion() {
        let mut reg = ToolRegistry::new();
        let mut m = sample_manifest("bad");
        m.timeout_secs = 0;
        assert!(reg.register(m).is_err());
        assert!(reg.get("bad").is_none());
    }

    #[test]
    fn names_sorted() {
        let mut reg = ToolRegistry::new();
        reg.register(sample_manifest("zzz")).unwrap();
        reg.register(sample_manifest("aaa")).unwrap();
        assert_eq!(reg.names(), vec!["aaa", "zzz"]);
    }

    #[test]
    fn load_dir_registers_valid_plugin() {
        let dir = tempfile::tempdir().unwrap();
        let plugin_dir = dir.path().join("echo");
        std::fs::create_dir(&plugin_dir).unwrap();
        let manifest = sample_manifest("echo");
        let mut f = std::fs::File::create(plugin_dir.join("manifest.json")).unwrap();
        write!(f, "{}", serde_json::to_string(&manifest).unwrap()).unwrap();

        let mut reg = ToolRegistry::new();
        let outcomes = reg.load_dir(dir.path());
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0], LoadOutcome::Registered(_)));
        let loaded = reg.get("echo").unwrap();
        assert!(loaded.executable.as_ref().unwrap().ends_with("run"));
    }

    #[test]
    fn load_dir_rejects_malformed_json_but_continues() {
        let dir = tempfile::tempdir().unwrap();
        let bad_dir = dir.path().join("bad");
        std::fs::create_dir(&bad_dir).unwrap();
        std::fs::write(bad_dir.join("manifest.json"), "not json").unwrap();
        let good_dir = dir.path().join("good");
        std::fs::create_dir(&good_dir).unwrap();
        std::fs::write(
            good_dir.join("manifest.json"),
            serde_json::to_string(&sample_manifest("good")).unwrap(),
        )
        .unwrap();

        let mut reg = ToolRegistry::new();
        let outcomes = reg.load_dir(dir.path());
        assert!(outcomes.iter().any(|o| matches!(o, LoadOutcome::Rejected { .. })));
        assert!(reg.get("good").is_some());
        assert!(reg.get("bad").is_none());
    }
}
