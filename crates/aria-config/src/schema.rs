// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};

fn default_primary_provider() -> String {
    "anthropic".into()
}
fn default_primary_model() -> String {
    "claude-sonnet-4-5".into()
}
fn default_max_steps() -> u32 {
    20
}
fn default_max_cost_usd() -> f64 {
    1.0
}
fn default_db_path() -> String {
    "./aria.db".into()
}
fn default_log_path() -> String {
    "./aria.log".into()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARN" => Ok(Self::Warn),
            "ERROR" => Ok(Self::Error),
            other => Err(format!("invalid log level: {other} (expected DEBUG, INFO, WARN, or ERROR)")),
        }
    }
}

/// Top-level configuration: env vars always win (see [`crate::loader::load`]),
/// but file-based layering is kept as the ambient loading mechanism for
/// fields a fresh environment doesn't set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// `ARIA_PRIMARY_PROVIDER` — "anthropic" | "ollama" | "mock".
    #[serde(default = "default_primary_provider")]
    pub provider: String,
    /// `ARIA_PRIMARY_MODEL`.
    #[serde(default = "default_primary_model")]
    pub name: String,
    /// `ANTHROPIC_API_KEY`, required only when `provider = "anthropic"`.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self { provider: default_primary_provider(), name: default_primary_model(), api_key: None, base_url: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// `ARIA_MAX_STEPS`, positive integer, default 20.
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    /// `ARIA_MAX_COST_USD`, non-negative real, default 1.0.
    #[serde(default = "default_max_cost_usd")]
    pub max_cost_usd: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self { max_steps: default_max_steps(), max_cost_usd: default_max_cost_usd() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// `ARIA_DB_PATH` — path to the audit/memory SQLite database.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { db_path: default_db_path() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `ARIA_LOG_PATH` — distinct from the audit store; structured
    /// operational logs only, never audit records.
    #[serde(default = "default_log_path")]
    pub log_path: String,
    /// `ARIA_LOG_LEVEL`.
    #[serde(default)]
    pub level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { log_path: default_log_path(), level: LogLevel::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default_provider_is_anthropic() {
        assert_eq!(Config::default().model.provider, "anthropic");
    }

    #[test]
    fn config_default_max_steps_is_twenty() {
        assert_eq!(Config::default().budget.max_steps, 20);
    }

    #[test]
    fn config_default_max_cost_is_one_dollar() {
        assert_eq!(Config::default().budget.max_cost_usd, 1.0);
    }

    #[test]
    fn config_default_log_level_is_info() {
        assert_eq!(Config::default().logging.level, LogLevel::Info);
    }

    #[test]
    fn log_level_parses_case_insensitively() {
        assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("WARN".parse::<LogLevel>().unwrap(), LogLevel::Warn);
    }

    #[test]
    fn log_level_rejects_unknown_value() {
        assert!("TRACE".parse::<LogLevel>().is_err());
    }

    #[test]
    fn config_partial_yaml_fills_in_defaults() {
        let yaml = "model:\n  provider: ollama\n  name: llama3\n";
        let c: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(c.model.provider, "ollama");
        assert_eq!(c.budget.max_steps, 20);
        assert_eq!(c.storage.db_path, "./aria.db");
    }

    #[test]
    fn config_round_trips_through_yaml() {
        let mut c = Config::default();
        c.budget.max_steps = 50;
        c.logging.level = LogLevel::Debug;
        let yaml = serde_yaml::to_string(&c).unwrap();
        let back: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.budget.max_steps, 50);
        assert_eq!(back.logging.level, LogLevel::Debug);
    }
}
