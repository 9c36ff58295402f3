//! Stage configuration.
//!
//! Each stage takes its configuration as an explicit value; nothing here reads
//! environment variables. A JSON file with optional `crawl` and `quality`
//! sections can be loaded with [`HarvesterConfig::load`]; missing fields fall
//! back to the defaults below.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::batch::{DEFAULT_CONCURRENCY, MAX_CONCURRENCY, MIN_CONCURRENCY};
use crate::fetch::DEFAULT_MAX_BODY_BYTES;
use crate::quality::DEFAULT_MAX_PROMPT_TOKENS;

/// Default model for quality scoring.
pub const DEFAULT_MODEL_ID: &str = "gpt-4o-mini";

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Config path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON for this schema.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Config path.
        path: PathBuf,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// A value is out of range.
    #[error("Invalid config value for `{field}`: {value}. Expected {expected}")]
    Invalid {
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: String,
        /// Accepted values.
        expected: &'static str,
    },
}

fn validate_concurrency(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if (MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&value) {
        return Ok(());
    }
    Err(ConfigError::Invalid {
        field,
        value: value.to_string(),
        expected: "range 1..=100",
    })
}

fn validate_positive(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value > 0 {
        return Ok(());
    }
    Err(ConfigError::Invalid {
        field,
        value: value.to_string(),
        expected: "a value greater than 0",
    })
}

/// Settings for the crawl stage.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Maximum concurrent fetches.
    pub concurrency: usize,
    /// Per-request timeout.
    pub request_timeout_ms: u64,
    /// Pause after each fetch before its slot is released.
    pub pacing_ms: u64,
    /// Cap on page body size.
    pub max_body_bytes: usize,
    /// Retry sweeps over transient fetch failures.
    pub retry_sweeps: u32,
    /// Wall-clock budget for each crawl pass.
    pub deadline_ms: Option<u64>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            request_timeout_ms: 30_000,
            pacing_ms: 500,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            retry_sweeps: 0,
            deadline_ms: None,
        }
    }
}

impl CrawlConfig {
    /// Validates value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_concurrency("crawl.concurrency", self.concurrency)?;
        validate_positive("crawl.request_timeout_ms", self.request_timeout_ms)?;
        validate_positive(
            "crawl.max_body_bytes",
            u64::try_from(self.max_body_bytes).unwrap_or(u64::MAX),
        )?;
        if let Some(deadline) = self.deadline_ms {
            validate_positive("crawl.deadline_ms", deadline)?;
        }
        Ok(())
    }

    /// Per-request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Post-fetch pacing.
    #[must_use]
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    /// Per-pass deadline.
    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }
}

/// Settings for the quality scoring stage.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Model used by the model tier.
    pub model_id: String,
    /// Maximum concurrent completion requests.
    pub concurrency: usize,
    /// Answer every model-tier request with a fixed 0.5 score, offline.
    pub use_mock: bool,
    /// Prompt budget in tokens.
    pub max_prompt_tokens: usize,
    /// Pause after each first-pass completion.
    pub first_pass_pacing_ms: u64,
    /// Pause after each completion in the first retry sweep.
    pub retry_pacing_ms: u64,
    /// Retry sweeps over unresolved documents.
    pub retry_sweeps: u32,
    /// Wall-clock budget for each model-tier pass.
    pub deadline_ms: Option<u64>,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            use_mock: false,
            max_prompt_tokens: DEFAULT_MAX_PROMPT_TOKENS,
            first_pass_pacing_ms: 7_000,
            retry_pacing_ms: 20_000,
            retry_sweeps: 1,
            deadline_ms: None,
        }
    }
}

impl QualityConfig {
    /// Validates value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model_id.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "quality.model_id",
                value: format!("{:?}", self.model_id),
                expected: "a non-empty model id",
            });
        }
        validate_concurrency("quality.concurrency", self.concurrency)?;
        validate_positive(
            "quality.max_prompt_tokens",
            u64::try_from(self.max_prompt_tokens).unwrap_or(u64::MAX),
        )?;
        if let Some(deadline) = self.deadline_ms {
            validate_positive("quality.deadline_ms", deadline)?;
        }
        Ok(())
    }

    /// First-pass pacing.
    #[must_use]
    pub fn first_pass_pacing(&self) -> Duration {
        Duration::from_millis(self.first_pass_pacing_ms)
    }

    /// First retry sweep pacing.
    #[must_use]
    pub fn retry_pacing(&self) -> Duration {
        Duration::from_millis(self.retry_pacing_ms)
    }

    /// Per-pass deadline.
    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }
}

/// Configuration file contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HarvesterConfig {
    /// Crawl stage settings.
    pub crawl: CrawlConfig,
    /// Quality stage settings.
    pub quality: QualityConfig,
}

impl HarvesterConfig {
    /// Loads and validates a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns read, parse or validation errors.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validates both sections.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError::Invalid`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.crawl.validate()?;
        self.quality.validate()
    }
}
