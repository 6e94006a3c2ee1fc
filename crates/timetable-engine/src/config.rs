//! Engine configuration.

use std::path::Path;

use chrono::TimeDelta;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TimetableError};
use crate::rule::DEFAULT_MAX_INSTANCES;

/// Prefix of environment variables overriding the configuration
/// (`TIMETABLE_MAX_BATCH_SIZE`, ...).
pub const ENV_PREFIX: &str = "TIMETABLE";

/// Tunables shared by the reconciler and the collision detector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Largest number of instants bound into a single existence query.
    /// Overlap queries are flushed every `max_batch_size / 5` occurrences.
    pub max_batch_size: usize,
    /// Precision, in seconds, below which instants are truncated.
    pub granularity_secs: i64,
    /// Cap on the number of instants one rule expansion may produce.
    pub max_instances: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 500,
            granularity_secs: 1,
            max_instances: DEFAULT_MAX_INSTANCES,
        }
    }
}

impl EngineConfig {
    /// Load the configuration from an optional TOML file, then apply
    /// `TIMETABLE_*` environment overrides.
    ///
    /// # Errors
    /// Returns `TimetableError::Config` if the file cannot be read, a value
    /// fails to deserialize, or the result does not pass [`validate`](Self::validate).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = Self::default();
        let mut builder = Config::builder()
            .set_default("max_batch_size", defaults.max_batch_size as u64)
            .and_then(|b| b.set_default("granularity_secs", defaults.granularity_secs))
            .and_then(|b| b.set_default("max_instances", defaults.max_instances as u64))
            .map_err(config_error)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let loaded: Self = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(config_error)?;

        loaded.validate()?;
        tracing::debug!(config = ?loaded, "Loaded engine configuration");
        Ok(loaded)
    }

    /// # Errors
    /// Returns `TimetableError::Config` for a zero batch size, a non-positive
    /// granularity, or a zero instance cap.
    pub fn validate(&self) -> Result<()> {
        if self.max_batch_size == 0 {
            return Err(TimetableError::Config(
                "max_batch_size must be at least 1".to_string(),
            ));
        }
        if self.granularity_secs <= 0 {
            return Err(TimetableError::Config(format!(
                "granularity_secs must be positive, got {}",
                self.granularity_secs
            )));
        }
        if self.max_instances == 0 {
            return Err(TimetableError::Config(
                "max_instances must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    pub fn with_granularity_secs(mut self, granularity_secs: i64) -> Self {
        self.granularity_secs = granularity_secs;
        self
    }

    pub fn with_max_instances(mut self, max_instances: usize) -> Self {
        self.max_instances = max_instances;
        self
    }

    /// Chunk size for existence queries, never zero.
    pub fn batch_size(&self) -> usize {
        self.max_batch_size.max(1)
    }

    /// Number of occurrences folded into one overlap query before it is run.
    ///
    /// Each occurrence contributes about five bound parameters.
    pub fn overlap_flush_every(&self) -> usize {
        (self.batch_size() / 5).max(1)
    }

    pub fn granularity(&self) -> TimeDelta {
        TimeDelta::seconds(self.granularity_secs.max(1))
    }
}

fn config_error(err: config::ConfigError) -> TimetableError {
    TimetableError::Config(err.to_string())
}
