use std::time::Duration;

use thiserror::Error;
use tracing::trace;

use crate::classifier::ClassifierConfig;
use crate::sensor::SensorConfig;
use crate::storage::Namespace;
use crate::util::apply_overrides;

/// Errors detected while validating configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("peak probability must lie in [0, 1] (got {0})")]
    InvalidProbability(f64),

    #[error("{name} must satisfy 0 <= low <= high with finite bounds (got [{low}, {high}])")]
    InvalidRange {
        name: &'static str,
        low: f64,
        high: f64,
    },

    #[error("alert threshold must be a number (got {0})")]
    InvalidThreshold(f64),

    #[error("interval must be a non-negative number of seconds (got {0})")]
    InvalidInterval(f64),
}

/// Storage backend configuration
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-process document store (no persistence across restarts)
    Memory {
        #[serde(default = "default_database")]
        database: String,

        #[serde(default = "default_collection")]
        collection: String,
    },

    /// SQLite-backed document store
    Sqlite {
        /// Connection target, either a `sqlite:` URL or a plain file path
        #[serde(default = "default_sqlite_uri")]
        uri: String,

        #[serde(default = "default_database")]
        database: String,

        #[serde(default = "default_collection")]
        collection: String,

        /// How long to wait for the store before giving up
        #[serde(default = "default_connect_timeout_ms")]
        connect_timeout_ms: u64,
    },
}

impl StorageConfig {
    pub fn sqlite(uri: impl Into<String>) -> Self {
        StorageConfig::Sqlite {
            uri: uri.into(),
            database: default_database(),
            collection: default_collection(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }

    pub fn memory() -> Self {
        StorageConfig::Memory {
            database: default_database(),
            collection: default_collection(),
        }
    }

    pub fn namespace(&self) -> Namespace {
        match self {
            StorageConfig::Memory {
                database,
                collection,
            }
            | StorageConfig::Sqlite {
                database,
                collection,
                ..
            } => Namespace::new(database.clone(), collection.clone()),
        }
    }

    /// Human-readable connection target, for logs
    pub fn target(&self) -> String {
        match self {
            StorageConfig::Memory { .. } => "memory".to_string(),
            StorageConfig::Sqlite { uri, .. } => uri.clone(),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let Namespace {
            database,
            collection,
        } = self.namespace();

        if database.trim().is_empty() {
            return Err(ConfigError::EmptyField("storage.database"));
        }
        if collection.trim().is_empty() {
            return Err(ConfigError::EmptyField("storage.collection"));
        }
        if let StorageConfig::Sqlite { uri, .. } = self
            && uri.trim().is_empty()
        {
            return Err(ConfigError::EmptyField("storage.uri"));
        }

        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::sqlite(default_sqlite_uri())
    }
}

pub fn default_database() -> String {
    "energy_db".to_string()
}

pub fn default_collection() -> String {
    "measures".to_string()
}

fn default_sqlite_uri() -> String {
    "sqlite://energy.db".to_string()
}

pub fn default_connect_timeout_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, PartialEq, Default, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sensor: SensorConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct PipelineConfig {
    /// Pause between two iterations, in seconds (fractional values allowed)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: f64,

    /// Stop after this many iterations (runs until interrupted if unset)
    pub max_iterations: Option<u64>,
}

impl PipelineConfig {
    /// Pause between iterations
    ///
    /// Values rejected by [`Config::validate`] fall back to the default.
    pub fn interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.interval_secs)
            .unwrap_or_else(|_| Duration::from_secs_f64(default_interval_secs()))
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_iterations: None,
        }
    }
}

fn default_interval_secs() -> f64 {
    2.0
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sensor.validate()?;

        if self.classifier.alert_threshold.is_nan() {
            return Err(ConfigError::InvalidThreshold(
                self.classifier.alert_threshold,
            ));
        }

        if Duration::try_from_secs_f64(self.pipeline.interval_secs).is_err() {
            return Err(ConfigError::InvalidInterval(self.pipeline.interval_secs));
        }

        self.storage.validate()
    }
}

/// Settings given on the command line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub alert_threshold: Option<f64>,
    pub interval_secs: Option<f64>,
    pub max_iterations: Option<u64>,

    /// Swap the configured store for the in-memory one, keeping its namespace
    pub in_memory: bool,
}

/// Build the effective configuration
///
/// Layers, lowest first: defaults, the config file (`base`), the
/// environment as seen through `lookup`, then `overrides`. The result is
/// validated.
pub fn resolve(
    base: Option<Config>,
    lookup: impl Fn(&str) -> Option<String>,
    overrides: &Overrides,
) -> Result<Config, ConfigError> {
    let mut config = base.unwrap_or_default();

    apply_overrides(&mut config, lookup);

    if let Some(threshold) = overrides.alert_threshold {
        config.classifier.alert_threshold = threshold;
    }
    if let Some(interval) = overrides.interval_secs {
        config.pipeline.interval_secs = interval;
    }
    if let Some(iterations) = overrides.max_iterations {
        config.pipeline.max_iterations = Some(iterations);
    }
    if overrides.in_memory {
        let Namespace {
            database,
            collection,
        } = config.storage.namespace();
        config.storage = StorageConfig::Memory {
            database,
            collection,
        };
    }

    config.validate()?;
    trace!("effective config: {config:?}");
    Ok(config)
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
