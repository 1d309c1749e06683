//! Configuration file handling.
//!
//! This module handles loading `.testlens.toml`, merging it with CLI
//! arguments, and resolving the API credential at the edge of the program.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::AnalysisError;
use crate::polling::FixedInterval;
use crate::remote::gemini::{DEFAULT_API_BASE, DEFAULT_MODEL};
use crate::remote::GeminiConfig;
use crate::runner::RunnerConfig;
use crate::schema::ResponseShape;

/// Environment variable holding the Gemini API key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".testlens.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Input and output paths.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Readiness polling settings.
    #[serde(default)]
    pub polling: PollingConfig,
}

/// Input and output paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Diff to analyze.
    #[serde(default = "default_diff")]
    pub diff: PathBuf,

    /// Test-case listing to score.
    #[serde(default = "default_test_cases")]
    pub test_cases: PathBuf,

    /// Where the JSON result is written.
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            diff: default_diff(),
            test_cases: default_test_cases(),
            output: default_output(),
        }
    }
}

fn default_diff() -> PathBuf {
    PathBuf::from("dff.txt")
}

fn default_test_cases() -> PathBuf {
    PathBuf::from("test_case.txt")
}

fn default_output() -> PathBuf {
    PathBuf::from("llm.txt")
}

/// Gemini model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name.
    #[serde(default = "default_model")]
    pub name: String,

    /// API base URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Shape the model is asked to return.
    #[serde(default)]
    pub response_shape: ResponseShape,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            api_base: default_api_base(),
            timeout_seconds: default_timeout(),
            response_shape: ResponseShape::default(),
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_timeout() -> u64 {
    600 // generation over two uploaded files can take minutes
}

/// Readiness polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Seconds between status checks.
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,

    /// Give up after this many status checks. Unset polls until the file
    /// leaves the processing state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval(),
            max_attempts: None,
        }
    }
}

fn default_interval() -> u64 {
    2
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only values given explicitly on the command line (or via their
    /// environment variables) override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref diff) = args.diff {
            self.general.diff = diff.clone();
        }
        if let Some(ref test_cases) = args.test_cases {
            self.general.test_cases = test_cases.clone();
        }
        if let Some(ref output) = args.output {
            self.general.output = output.clone();
        }

        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref api_base) = args.api_base {
            self.model.api_base = api_base.clone();
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }
        if let Some(shape) = args.response_shape {
            self.model.response_shape = shape;
        }

        if let Some(interval) = args.poll_interval {
            self.polling.interval_seconds = interval;
        }
        if let Some(max) = args.max_polls {
            self.polling.max_attempts = Some(max);
        }
    }

    /// Settings for the runner.
    pub fn runner_config(&self, show_progress: bool) -> RunnerConfig {
        RunnerConfig {
            diff: self.general.diff.clone(),
            test_cases: self.general.test_cases.clone(),
            output: self.general.output.clone(),
            response_shape: self.model.response_shape,
            show_progress,
        }
    }

    /// Wait strategy between status checks.
    pub fn wait_strategy(&self) -> FixedInterval {
        FixedInterval::new(
            Duration::from_secs(self.polling.interval_seconds),
            self.polling.max_attempts,
        )
    }

    /// Client settings, given an already resolved key.
    pub fn gemini_config(&self, api_key: SecretString) -> GeminiConfig {
        let mut gemini = GeminiConfig::new(api_key);
        gemini.api_base = self.model.api_base.clone();
        gemini.model = self.model.name.clone();
        gemini.timeout_seconds = self.model.timeout_seconds;
        gemini
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

/// Turn the raw credential value into a secret, rejecting absent or blank keys.
pub fn resolve_api_key(raw: Option<&str>) -> Result<SecretString, AnalysisError> {
    match raw.map(str::trim) {
        Some(key) if !key.is_empty() => Ok(SecretString::from(key.to_string())),
        _ => Err(AnalysisError::Configuration(format!(
            "{} not found in environment variables",
            API_KEY_ENV
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use secrecy::ExposeSecret;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.diff, PathBuf::from("dff.txt"));
        assert_eq!(config.general.test_cases, PathBuf::from("test_case.txt"));
        assert_eq!(config.general.output, PathBuf::from("llm.txt"));
        assert_eq!(config.model.name, "gemini-2.5-pro");
        assert_eq!(config.model.response_shape, ResponseShape::List);
        assert_eq!(config.polling.interval_seconds, 2);
        assert_eq!(config.polling.max_attempts, None);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
diff = "changes.diff"
output = "scores.json"

[model]
name = "gemini-2.5-flash"
response_shape = "map"

[polling]
interval_seconds = 5
max_attempts = 30
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.diff, PathBuf::from("changes.diff"));
        assert_eq!(config.general.test_cases, PathBuf::from("test_case.txt"));
        assert_eq!(config.general.output, PathBuf::from("scores.json"));
        assert_eq!(config.model.name, "gemini-2.5-flash");
        assert_eq!(config.model.response_shape, ResponseShape::Map);
        assert_eq!(config.polling.interval_seconds, 5);
        assert_eq!(config.polling.max_attempts, Some(30));

        let wait = config.wait_strategy();
        assert_eq!(wait.interval, Duration::from_secs(5));
        assert_eq!(wait.max_attempts, Some(30));
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut config: Config = toml::from_str(
            r#"
[model]
name = "gemini-2.5-flash"

[polling]
interval_seconds = 5
"#,
        )
        .unwrap();
        let args = crate::cli::Args::parse_from([
            "testlens",
            "--output",
            "out.json",
            "--poll-interval",
            "0",
            "--response-shape",
            "map",
        ]);

        config.merge_with_args(&args);

        assert_eq!(config.general.output, PathBuf::from("out.json"));
        assert_eq!(config.polling.interval_seconds, 0);
        assert_eq!(config.model.response_shape, ResponseShape::Map);
        // Not given on the command line, so the file value stays.
        assert_eq!(config.general.diff, PathBuf::from("dff.txt"));
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[model]"));
        assert!(toml_str.contains("[polling]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model.name, "gemini-2.5-pro");
    }

    #[test]
    fn test_resolve_api_key() {
        assert!(matches!(
            resolve_api_key(None),
            Err(AnalysisError::Configuration(_))
        ));
        assert!(matches!(
            resolve_api_key(Some("   ")),
            Err(AnalysisError::Configuration(_))
        ));
        let key = resolve_api_key(Some(" abc ")).unwrap();
        assert_eq!(key.expose_secret(), "abc");
    }

    #[test]
    fn test_default_wait_strategy_polls_every_two_seconds() {
        use crate::polling::WaitStrategy;

        let wait = Config::default().wait_strategy();
        assert_eq!(wait.interval, Duration::from_secs(2));
        assert_eq!(wait.max_attempts(), None);
    }

    #[test]
    fn test_runner_config_from_config() {
        let config = Config::default();
        let runner = config.runner_config(false);
        assert_eq!(runner.output, PathBuf::from("llm.txt"));
        assert!(!runner.show_progress);
    }
}
