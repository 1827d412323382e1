//! Configuration management for the Parley engine.
//!
//! Loads settings from /etc/parley/config.toml or uses defaults.

use anyhow::{Context, Result};
use parley_shared::clarify::DEFAULT_MAX_QUESTIONS;
use parley_shared::health::DEFAULT_TURN_CEILING;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Config file path
pub const CONFIG_PATH: &str = "/etc/parley/config.toml";

/// Extraction call budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Per-call timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Attempts before the turn degrades to a fallback question
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First backoff delay; doubles on every retry
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Extra attempts after a schema violation before the turn is rejected
    #[serde(default = "default_validation_retries")]
    pub validation_retries: u32,

    /// Deadline for the whole extraction phase of a turn
    #[serde(default = "default_turn_timeout_ms")]
    pub turn_timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    8_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    200
}

fn default_validation_retries() -> u32 {
    1
}

fn default_turn_timeout_ms() -> u64 {
    30_000
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            validation_retries: default_validation_retries(),
            turn_timeout_ms: default_turn_timeout_ms(),
        }
    }
}

impl ExtractionConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn turn_timeout(&self) -> Duration {
        Duration::from_millis(self.turn_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClarificationConfig {
    #[serde(default = "default_max_questions")]
    pub max_questions: usize,
}

fn default_max_questions() -> usize {
    DEFAULT_MAX_QUESTIONS
}

impl Default for ClarificationConfig {
    fn default() -> Self {
        Self {
            max_questions: default_max_questions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Turns allowed before a conversation short of confirmation is stuck
    #[serde(default = "default_turn_ceiling")]
    pub turn_ceiling: u32,
}

fn default_turn_ceiling() -> u32 {
    DEFAULT_TURN_CEILING
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            turn_ceiling: default_turn_ceiling(),
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub clarification: ClarificationConfig,
    #[serde(default)]
    pub health: HealthConfig,
}

impl EngineConfig {
    /// Load from the default path, falling back to defaults
    pub fn load() -> Self {
        Self::load_or_default(Path::new(CONFIG_PATH))
    }

    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::load_from(path) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                warn!("Failed to load config from {}: {:#}, using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: EngineConfig = toml::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<()> {
        if self.extraction.max_attempts == 0 {
            anyhow::bail!("extraction.max_attempts must be at least 1");
        }
        if self.clarification.max_questions == 0 {
            anyhow::bail!("clarification.max_questions must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.extraction.max_attempts, 3);
        assert_eq!(config.extraction.validation_retries, 1);
        assert_eq!(config.clarification.max_questions, 3);
        assert_eq!(config.health.turn_ceiling, 6);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[clarification]\nmax_questions = 2\n\n[extraction]\ntimeout_ms = 500"
        )
        .unwrap();
        let config = EngineConfig::load_from(file.path()).unwrap();
        assert_eq!(config.clarification.max_questions, 2);
        assert_eq!(config.extraction.timeout_ms, 500);
        assert_eq!(config.extraction.max_attempts, 3);
        assert_eq!(config.health.turn_ceiling, 6);
    }

    #[test]
    fn test_invalid_file_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[extraction]\nmax_attempts = 0").unwrap();
        assert!(EngineConfig::load_from(file.path()).is_err());
        let config = EngineConfig::load_or_default(file.path());
        assert_eq!(config.extraction.max_attempts, 3);
    }
}
