//! Configuration module for the disorder simulator
//!
//! Configuration is loaded from a TOML file and may be overridden from the
//! command line. All parameters are validated eagerly before the pipeline
//! starts; invalid values name the offending parameter.
//!
//! # Example
//! ```ignore
//! let config = Config::load("disorder.toml")?;
//! config.validate()?;
//! let window = config.disorder_window()?;
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::loader::RecordLimit;
use crate::simulator::{DisorderWindow, SelectionPolicy};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse TOML: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

impl ConfigError {
    /// Create an invalid-parameter error
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub disorder: DisorderConfig,
    #[serde(default)]
    pub sink: SinkConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Check every parameter; call before building the pipeline
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.path.as_os_str().is_empty() {
            return Err(ConfigError::invalid("source.path", "must not be empty"));
        }
        self.disorder_window()?;
        if self.sink.path.as_os_str().is_empty() {
            return Err(ConfigError::invalid("sink.path", "must not be empty"));
        }
        Ok(())
    }

    /// Validated disorder window
    pub fn disorder_window(&self) -> Result<DisorderWindow, ConfigError> {
        DisorderWindow::new(self.disorder.window)
    }

    /// Selection policy with its seed applied
    pub fn selection_policy(&self) -> SelectionPolicy {
        match self.disorder.policy {
            PolicyKind::Random => SelectionPolicy::Random {
                seed: self.disorder.seed,
            },
            PolicyKind::RoundRobin => SelectionPolicy::RoundRobin,
        }
    }

    /// Record limit (absent means read to exhaustion)
    pub fn record_limit(&self) -> RecordLimit {
        RecordLimit::from(self.source.record_limit)
    }
}

// =============================================================================
// Source Configuration
// =============================================================================

/// Input dataset configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Path of the comma-delimited source file
    #[serde(default = "default_source_path")]
    pub path: PathBuf,

    /// Stop after this many accepted events (absent = unbounded)
    #[serde(default)]
    pub record_limit: Option<u64>,

    /// Producer/consumer buffer capacity (0 = unbounded)
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: default_source_path(),
            record_limit: None,
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_source_path() -> PathBuf {
    PathBuf::from("./data/input.csv")
}

fn default_channel_capacity() -> usize {
    10_000
}

// =============================================================================
// Disorder Configuration
// =============================================================================

/// Selection policy name as written in the config file
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    #[default]
    Random,
    RoundRobin,
}

/// What the consumer does with the loaded stream
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// Emit a bounded out-of-order permutation
    #[default]
    Disorder,
    /// Collect everything and emit in chronological order
    Sorted,
}

/// Disorder simulation parameters
#[derive(Debug, Clone, Deserialize)]
pub struct DisorderConfig {
    /// Maximum positional displacement (must be >= 0)
    #[serde(default = "default_window")]
    pub window: i64,

    /// Which buffered event to emit next
    #[serde(default)]
    pub policy: PolicyKind,

    /// Seed for the random policy
    #[serde(default)]
    pub seed: u64,

    #[serde(default)]
    pub mode: RunMode,
}

impl Default for DisorderConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            policy: PolicyKind::default(),
            seed: 0,
            mode: RunMode::default(),
        }
    }
}

fn default_window() -> i64 {
    5
}

// =============================================================================
// Sink Configuration
// =============================================================================

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    /// Output CSV path
    #[serde(default = "default_sink_path")]
    pub path: PathBuf,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            path: default_sink_path(),
        }
    }
}

fn default_sink_path() -> PathBuf {
    PathBuf::from("./data/output.csv")
}

// =============================================================================
// Tests
// =============================================================================
