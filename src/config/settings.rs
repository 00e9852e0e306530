//! Typed sections of `config.json`.
//!
//! Every section and field is optional; unknown keys are rejected.

use std::path::PathBuf;

use serde::Deserialize;

use crate::command::Point;
use crate::error::ConfigError;
use crate::generator::DEFAULT_BASE_URL;
use crate::prompt::MAX_PROMPT_ENTRIES;

/// Contents of `config.json`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// Generator service settings.
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Context snapshot settings.
    #[serde(default)]
    pub context: ContextConfig,

    /// Executor policy.
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Conversation history settings.
    #[serde(default)]
    pub history: HistoryConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = &self.generator.base_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "Invalid generator base_url '{url}'. Must start with http:// or https://"
                ),
            });
        }

        if self.generator.timeout_s == 0 {
            return Err(ConfigError::ValidationError {
                message: "generator.timeout_s must be greater than 0".to_string(),
            });
        }

        if self.generator.model.as_deref().is_some_and(str::is_empty) {
            return Err(ConfigError::ValidationError {
                message: "generator.model must not be empty".to_string(),
            });
        }

        let cap = self.context.cap_components;
        if !(1..=MAX_PROMPT_ENTRIES).contains(&cap) {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "Invalid context.cap_components {cap}. Must be between 1 and {MAX_PROMPT_ENTRIES}"
                ),
            });
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            });
        }

        Ok(())
    }
}

/// Generator service configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Service base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model override. When unset, a model is picked from the service's list.
    #[serde(default)]
    pub model: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_s")]
    pub timeout_s: u64,

    /// Reserved; requests are not retried.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: None,
            timeout_s: default_timeout_s(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

const fn default_timeout_s() -> u64 {
    30
}

const fn default_max_retries() -> u32 {
    3
}

/// Context snapshot configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContextConfig {
    /// Entries listed per prompt section.
    #[serde(default = "default_cap_components")]
    pub cap_components: usize,

    /// Send file and project paths to the generator.
    #[serde(default = "default_true")]
    pub include_file_paths: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            cap_components: default_cap_components(),
            include_file_paths: default_true(),
        }
    }
}

const fn default_cap_components() -> usize {
    MAX_PROMPT_ENTRIES
}

const fn default_true() -> bool {
    true
}

/// Executor configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutorConfig {
    /// Placement position when a command gives none, as `[x, y]`.
    #[serde(default = "default_position")]
    pub default_position: [i64; 2],
}

impl ExecutorConfig {
    /// The default position as a point.
    #[must_use]
    pub const fn default_point(&self) -> Point {
        Point::new(self.default_position[0], self.default_position[1])
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_position: default_position(),
        }
    }
}

const fn default_position() -> [i64; 2] {
    [100_000, 100_000]
}

/// Conversation history configuration. Only the chat front end reads these.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HistoryConfig {
    /// Persist conversations.
    #[serde(default = "default_true")]
    pub save: bool,

    /// History file location.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            save: default_true(),
            path: None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let json = r"{}";
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.generator.base_url, "http://localhost:11434");
        assert!(config.generator.model.is_none());
    }

    #[test]
    fn parse_full_config() {
        let json = r#"{
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "_comment": "Test config",
            "generator": {
                "base_url": "http://gpu-box:11434",
                "model": "llama3",
                "timeout_s": 120,
                "max_retries": 1
            },
            "context": {
                "cap_components": 40,
                "include_file_paths": false
            },
            "executor": {
                "default_position": [0, 2540]
            },
            "history": {
                "save": false,
                "path": "/tmp/history.json"
            },
            "logging": {
                "level": "debug"
            }
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.generator.model.as_deref(), Some("llama3"));
        assert_eq!(config.generator.timeout_s, 120);
        assert_eq!(config.context.cap_components, 40);
        assert!(!config.context.include_file_paths);
        assert_eq!(config.executor.default_point(), Point::new(0, 2540));
        assert!(!config.history.save);
        assert_eq!(config.history.path, Some(PathBuf::from("/tmp/history.json")));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn section_defaults() {
        let generator = GeneratorConfig::default();
        assert_eq!(generator.timeout_s, 30);
        assert_eq!(generator.max_retries, 3);

        let context = ContextConfig::default();
        assert_eq!(context.cap_components, 100);
        assert!(context.include_file_paths);

        assert_eq!(
            ExecutorConfig::default().default_point(),
            Point::new(100_000, 100_000)
        );
        assert!(HistoryConfig::default().save);
        assert_eq!(LoggingConfig::default().level, "warn");
    }

    #[test]
    fn reject_bad_base_url() {
        let json = r#"{ "generator": { "base_url": "localhost:11434" } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn reject_zero_timeout() {
        let json = r#"{ "generator": { "timeout_s": 0 } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn reject_cap_out_of_range() {
        for cap in [0, 101] {
            let json = format!(r#"{{ "context": {{ "cap_components": {cap} }} }}"#);
            let config: Config = serde_json::from_str(&json).unwrap();
            assert!(config.validate().is_err(), "cap {cap} accepted");
        }
    }

    #[test]
    fn reject_invalid_log_level() {
        let json = r#"{ "logging": { "level": "loud" } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn reject_unknown_fields() {
        let json = r#"{
            "unknown_field": "value"
        }"#;

        let result: Result<Config, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }
}
