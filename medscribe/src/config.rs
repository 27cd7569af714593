//! Configuration management.
//!
//! Sources, later ones winning: built-in defaults, `config/default.*`,
//! `config/local.*`, an explicit file, then `MEDSCRIBE__<SECTION>__<KEY>`
//! environment variables. The model API key may also come from
//! `GEMINI_API_KEY`.

use crate::errors::ConfigError;
use crate::providers::{RetryConfig, DEFAULT_ENDPOINT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable consulted when `model.api_key` is unset.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MedscribeConfig {
    /// Where recordings and artifacts live.
    pub storage: StorageConfig,
    /// Model client settings.
    pub model: ModelConfig,
    /// Retry policy for transient model failures.
    pub retry: RetryConfig,
    /// Composer settings.
    pub orchestration: OrchestrationConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

/// Directory roots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding uploaded recordings.
    pub upload_dir: PathBuf,
    /// Root of the artifact store.
    pub processing_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("upload"),
            processing_dir: PathBuf::from("processing_files"),
        }
    }
}

/// Model client settings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Base URL of the generateContent API.
    pub endpoint: String,
    /// API key.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Model used by the agents.
    pub agent_model: String,
    /// Model used for transcription.
    pub transcription_model: String,
    /// Bound on model round-trips per agent.
    pub max_tool_turns: usize,
    /// Per-request HTTP timeout.
    pub request_timeout_secs: u64,
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("agent_model", &self.agent_model)
            .field("transcription_model", &self.transcription_model)
            .field("max_tool_turns", &self.max_tool_turns)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            agent_model: "gemini-2.0-flash".to_string(),
            transcription_model: "gemini-2.0-flash".to_string(),
            max_tool_turns: 8,
            request_timeout_secs: 120,
        }
    }
}

impl ModelConfig {
    /// Returns the request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Composer settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestrationConfig {
    /// Wall-time bound per fan-out branch. Unbounded when unset.
    pub branch_timeout_secs: Option<u64>,
}

impl OrchestrationConfig {
    /// Returns the branch timeout.
    #[must_use]
    pub fn branch_timeout(&self) -> Option<Duration> {
        self.branch_timeout_secs.map(Duration::from_secs)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Plain,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `medscribe=debug`.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Plain,
        }
    }
}

impl MedscribeConfig {
    /// Loads configuration from files and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be read or deserialized, if
    /// `explicit` does not exist, or if the result fails validation.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false));
        if let Some(path) = explicit {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix("MEDSCRIBE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut loaded: Self = settings.try_deserialize()?;
        if loaded.model.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            loaded.model.api_key = std::env::var(API_KEY_ENV).ok();
        }
        loaded.validate()?;
        Ok(loaded)
    }

    /// Checks values that deserialize fine but cannot work.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.upload_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("storage.upload_dir is empty".to_string()));
        }
        if self.storage.processing_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("storage.processing_dir is empty".to_string()));
        }
        if self.model.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("model.endpoint is empty".to_string()));
        }
        if self.model.max_tool_turns == 0 {
            return Err(ConfigError::Invalid("model.max_tool_turns must be at least 1".to_string()));
        }
        if self.model.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "model.request_timeout_secs must be positive".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".to_string()));
        }
        if self.orchestration.branch_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "orchestration.branch_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
