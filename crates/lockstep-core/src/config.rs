//! Configuration loading from YAML into typed structs.
//!
//! Every field carries a default so a partial file (or no file at all)
//! still yields a runnable configuration.

use std::path::Path;

use lockstep_llm::LlmConfig;
use serde::Deserialize;

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read configuration file")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The file contents are not valid YAML for the expected shape.
    #[error("failed to parse configuration: {message}")]
    Yaml {
        /// Parser error description.
        message: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(error: serde_yml::Error) -> Self {
        Self::Yaml {
            message: error.to_string(),
        }
    }
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    /// Tick loop settings.
    #[serde(default)]
    pub simulation: SimulationSettings,
    /// Simulated clock settings.
    #[serde(default)]
    pub clock: ClockConfig,
    /// Language model provider settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Agents to create at startup.
    #[serde(default)]
    pub agents: Vec<AgentSpec>,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] on malformed input.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(contents)?)
    }
}

/// Tick loop settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationSettings {
    /// Real milliseconds between tick starts.
    #[serde(default = "default_step_interval_ms")]
    pub step_interval_ms: u64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            step_interval_ms: default_step_interval_ms(),
        }
    }
}

/// Simulated clock settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClockConfig {
    /// Simulation seconds per real second.
    #[serde(default = "default_clock_speed")]
    pub speed: f64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            speed: default_clock_speed(),
        }
    }
}

/// One agent to create at startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentSpec {
    /// Stable unique identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Persona text used as the agent's system prompt.
    #[serde(default)]
    pub persona: String,
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level filter (e.g. `"info"`, `"lockstep_core=debug"`).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON-formatted log lines instead of human-readable ones.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_step_interval_ms() -> u64 {
    1000
}

fn default_clock_speed() -> f64 {
    1.0
}

fn default_log_level() -> String {
    String::from("info")
}
