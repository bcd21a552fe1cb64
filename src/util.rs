use tracing::debug;

use crate::config::{Config, StorageConfig, default_connect_timeout_ms};

const DB_URI: &str = "ENERGY_DB_URI";
const DB_NAME: &str = "ENERGY_DB_NAME";
const DB_COLLECTION: &str = "ENERGY_DB_COLLECTION";
const ALERT_THRESHOLD: &str = "ENERGY_ALERT_THRESHOLD";

/// Read an environment variable through a lookup function
///
/// Empty values count as unset.
fn lookup_non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|value| !value.trim().is_empty())
}

/// Lookup function backed by the process environment
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Apply overrides taken from `lookup` (usually the process environment)
///
/// Setting a database URI forces the SQLite backend. Values that cannot be
/// parsed leave the configured value untouched.
pub fn apply_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(new_uri) = lookup_non_empty(&lookup, DB_URI) {
        debug!("{DB_URI} overrides storage target");
        config.storage = match std::mem::take(&mut config.storage) {
            StorageConfig::Sqlite {
                database,
                collection,
                connect_timeout_ms,
                ..
            } => StorageConfig::Sqlite {
                uri: new_uri,
                database,
                collection,
                connect_timeout_ms,
            },
            StorageConfig::Memory {
                database,
                collection,
            } => StorageConfig::Sqlite {
                uri: new_uri,
                database,
                collection,
                connect_timeout_ms: default_connect_timeout_ms(),
            },
        };
    }

    if let Some(name) = lookup_non_empty(&lookup, DB_NAME) {
        match &mut config.storage {
            StorageConfig::Memory { database, .. } | StorageConfig::Sqlite { database, .. } => {
                *database = name
            }
        }
    }

    if let Some(name) = lookup_non_empty(&lookup, DB_COLLECTION) {
        match &mut config.storage {
            StorageConfig::Memory { collection, .. }
            | StorageConfig::Sqlite { collection, .. } => *collection = name,
        }
    }

    if let Some(threshold) =
        lookup_non_empty(&lookup, ALERT_THRESHOLD).and_then(|res| res.parse::<f64>().ok())
    {
        config.classifier.alert_threshold = threshold;
    }
}
