//! Document stores for annotated readings
//!
//! This module provides a trait-based abstraction over the document store
//! that receives one document per pipeline iteration.
//!
//! ## Backends
//!
//! - **SQLite** (default): documents stored as JSON rows, schema managed by
//!   sqlx migrations
//! - **In-Memory**: no persistence, for dry runs and tests
//!
//! ## Usage
//!
//! ```no_run
//! use energy_monitor::config::StorageConfig;
//! use energy_monitor::storage;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = storage::open(&StorageConfig::sqlite("sqlite://energy.db")).await?;
//!     let id = store.insert_one(serde_json::json!({ "value_kwh": 1.2 })).await?;
//!     println!("inserted {id}");
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use tracing::instrument;

use crate::config::StorageConfig;

pub mod backend;
pub mod error;
pub mod memory;
pub mod schema;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

pub use backend::{DocumentStore, HealthStatus};
pub use error::{StorageError, StorageResult};
pub use schema::{DocumentId, Namespace, StoredDocument};

/// Open the document store described by `config`
///
/// Connecting is bounded by the configured timeout for backends that need
/// one.
#[instrument(skip_all, fields(target = %config.target()))]
pub async fn open(config: &StorageConfig) -> StorageResult<Box<dyn DocumentStore>> {
    let namespace = config.namespace();

    match config {
        StorageConfig::Memory { .. } => Ok(Box::new(memory::MemoryStore::new(namespace))),

        #[cfg(feature = "storage-sqlite")]
        StorageConfig::Sqlite {
            uri,
            connect_timeout_ms,
            ..
        } => {
            let timeout = Duration::from_millis(*connect_timeout_ms);
            let store = sqlite::SqliteStore::connect(uri, namespace, timeout).await?;
            Ok(Box::new(store))
        }

        #[cfg(not(feature = "storage-sqlite"))]
        StorageConfig::Sqlite { .. } => Err(StorageError::InvalidConfig(
            "built without the storage-sqlite feature".to_string(),
        )),
    }
}
