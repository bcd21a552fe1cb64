//! Document store trait definition

use std::collections::HashMap;

use async_trait::async_trait;

use super::error::StorageResult;
use super::schema::{DocumentId, Namespace, StoredDocument};

/// Health status of a document store
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Is the backend operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional backend-specific metadata
    pub metadata: HashMap<String, String>,
}

/// A collection of JSON documents inside a logical database
///
/// Each store instance is bound to one [`Namespace`] at construction, in the
/// way a document database client is bound to a database and collection.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync` so the pipeline can hold them
/// behind a `Box<dyn DocumentStore>` across await points.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Namespace the store writes into
    fn namespace(&self) -> &Namespace;

    /// Insert a single document and return the id the store assigned to it
    ///
    /// A returned id means the write was acknowledged.
    async fn insert_one(&self, document: serde_json::Value) -> StorageResult<DocumentId>;

    /// Number of documents in the collection
    async fn count_documents(&self) -> StorageResult<u64>;

    /// The `limit` most recently inserted documents, oldest first
    async fn find_latest(&self, limit: usize) -> StorageResult<Vec<StoredDocument>>;

    /// Lightweight check that the store is operational
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Release connections held by the store
    ///
    /// Every operation after `close` fails with `StorageError::Closed`.
    async fn close(&self) -> StorageResult<()>;
}
