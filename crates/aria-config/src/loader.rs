// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::schema::LogLevel;
use crate::Config;

/// Ordered list of config file locations searched from lowest to highest
/// priority. Later files override earlier ones; environment variables (see
/// [`apply_env_overrides`]) always win over every file.
fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    paths.push(PathBuf::from("/etc/aria/config.yaml"));
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config/aria/config.yaml"));
    }
    if let Some(cfg) = dirs::config_dir() {
        paths.push(cfg.join("aria/config.yaml"));
    }
    paths.push(PathBuf::from(".aria.yaml"));
    paths.push(PathBuf::from("aria.yaml"));

    paths
}

/// Load configuration by merging all discovered YAML files, then applying
/// `ARIA_*`/`ANTHROPIC_API_KEY` environment variables on top. The `extra`
/// argument may provide an explicit path (e.g. a `--config` CLI flag).
pub fn load(extra: Option<&Path>) -> anyhow::Result<Config> {
    let mut merged = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());

    for path in config_search_paths() {
        if path.is_file() {
            debug!(path = %path.display(), "loading config layer");
            let text = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
            let layer: serde_yaml::Value = serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
            merge_yaml(&mut merged, layer);
        }
    }

    if let Some(p) = extra {
        debug!(path = %p.display(), "loading explicit config");
        let text = std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
        let layer: serde_yaml::Value = serde_yaml::from_str(&text).with_context(|| format!("parsing {}", p.display()))?;
        merge_yaml(&mut merged, layer);
    }

    let mut config: Config = if matches!(merged, serde_yaml::Value::Mapping(ref m) if m.is_empty()) {
        Config::default()
    } else {
        serde_yaml::from_value(merged).unwrap_or_default()
    };

    apply_env_overrides(&mut config)?;
    Ok(config)
}

/// Apply the environment variables named in the external-interfaces contract.
/// Each one, when present, overrides whatever the file layers produced.
fn apply_env_overrides(config: &mut Config) -> anyhow::Result<()> {
    if let Ok(v) = std::env::var("ANTHROPIC_API_KEY") {
        config.model.api_key = Some(v);
    }
    if let Ok(v) = std::env::var("ARIA_PRIMARY_PROVIDER") {
        config.model.provider = v;
    }
    if let Ok(v) = std::env::var("ARIA_PRIMARY_MODEL") {
        config.model.name = v;
    }
    if let Ok(v) = std::env::var("ARIA_MAX_STEPS") {
        config.budget.max_steps = v.parse().with_context(|| format!("ARIA_MAX_STEPS must be a positive integer, got {v:?}"))?;
    }
    if let Ok(v) = std::env::var("ARIA_MAX_COST_USD") {
        config.budget.max_cost_usd = v.parse().with_context(|| format!("ARIA_MAX_COST_USD must be a non-negative real, got {v:?}"))?;
    }
    if let Ok(v) = std::env::var("ARIA_DB_PATH") {
        config.storage.db_path = v;
    }
    if let Ok(v) = std::env::var("ARIA_LOG_PATH") {
        config.logging.log_path = v;
    }
    if let Ok(v) = std::env::var("ARIA_LOG_LEVEL") {
        config.logging.level = v.parse::<LogLevel>().map_err(anyhow::Error::msg)?;
    }
    Ok(())
}

/// Deep-merge `src` into `dst`; src wins on scalar conflicts.
fn merge_yaml(dst: &mut serde_yaml::Value, src: serde_yaml::Value) {
    match (dst, src) {
        (serde_yaml::Value::Mapping(d), serde_yaml::Value::Mapping(s)) => {
            for (k, v) in s {
                let entry = d.entry(k).or_insert(serde_yaml::Value::Mapping(serde_yaml::Mapping::new()));
                merge_yaml(entry, v);
            }
        }
        (dst, src) => *dst = src,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn val(s: &str) -> serde_yaml::Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn merge_scalar_src_wins() {
        let mut dst = val("x: 1");
        let src = val("x: 2");
        merge_yaml(&mut dst, src);
        assert_eq!(dst["x"].as_i64(), Some(2));
    }

    #[test]
    fn merge_nested_tables() {
        let mut dst = val("model:\n  provider: anthropic\n  name: claude-sonnet-4-5");
        let src = val("model:\n  name: claude-opus-4-5");
        merge_yaml(&mut dst, src);
        assert_eq!(dst["model"]["provider"].as_str(), Some("anthropic"));
        assert_eq!(dst["model"]["name"].as_str(), Some("claude-opus-4-5"));
    }

    #[test]
    fn load_returns_error_when_explicit_path_missing() {
        let result = load(Some(Path::new("/tmp/aria_nonexistent_config_xyz.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn load_explicit_file_overrides_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("ARIA_PRIMARY_PROVIDER");
        std::env::remove_var("ARIA_MAX_STEPS");
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "model:\n  provider: ollama\n  name: llama3").unwrap();
        let cfg = load(Some(f.path())).unwrap();
        assert_eq!(cfg.model.provider, "ollama");
        assert_eq!(cfg.model.name, "llama3");
    }

    #[test]
    fn env_override_wins_over_file() {
        let _guard = ENV_LOCK.lock().unwrap();
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "model:\n  provider: ollama\n  name: llama3").unwrap();
        std::env::set_var("ARIA_PRIMARY_PROVIDER", "anthropic");
        std::env::set_var("ARIA_MAX_STEPS", "42");
        let cfg = load(Some(f.path())).unwrap();
        assert_eq!(cfg.model.provider, "anthropic");
        assert_eq!(cfg.budget.max_steps, 42);
        std::env::remove_var("ARIA_PRIMARY_PROVIDER");
        std::env::remove_var("ARIA_MAX_STEPS");
    }

    #[test]
    fn invalid_max_steps_env_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("ARIA_MAX_STEPS", "not-a-number");
        let result = load(None);
        std::env::remove_var("ARIA_MAX_STEPS");
        assert!(result.is_err());
    }

    #[test]
    fn invalid_log_level_env_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("ARIA_LOG_LEVEL", "VERBOSE");
        let result = load(None);
        std::env::remove_var("ARIA_LOG_LEVEL");
        assert!(result.is_err());
    }
}
