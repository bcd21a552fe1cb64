//! In-memory document store (no persistence)
//!
//! Documents are kept in a bounded ring buffer. This store is useful for:
//! - Testing without database dependencies
//! - Dry runs where nothing should touch disk
//!
//! ## Limitations
//!
//! - **No persistence**: All data lost on restart
//! - **Limited capacity**: Oldest documents are evicted once the buffer is full

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use super::backend::{DocumentStore, HealthStatus};
use super::error::{StorageError, StorageResult};
use super::schema::{DocumentId, Namespace, StoredDocument};

/// Maximum documents kept in memory
const MAX_DOCUMENTS: usize = 10_000;

#[derive(Debug, Default)]
struct MemoryState {
    documents: VecDeque<StoredDocument>,
    next_id: i64,
    closed: bool,
}

/// In-memory document store
pub struct MemoryStore {
    namespace: Namespace,
    capacity: usize,
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new(namespace: Namespace) -> Self {
        Self::with_capacity(namespace, MAX_DOCUMENTS)
    }

    pub fn with_capacity(namespace: Namespace, capacity: usize) -> Self {
        Self {
            namespace,
            capacity: capacity.max(1),
            state: RwLock::new(MemoryState {
                next_id: 1,
                ..MemoryState::default()
            }),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    async fn insert_one(&self, document: serde_json::Value) -> StorageResult<DocumentId> {
        let mut state = self.state.write().await;
        if state.closed {
            return Err(StorageError::Closed);
        }

        let id = DocumentId(state.next_id);
        state.next_id += 1;

        if state.documents.len() == self.capacity {
            state.documents.pop_front();
            trace!("evicted oldest document from {}", self.namespace);
        }

        state.documents.push_back(StoredDocument {
            id,
            inserted_at: Utc::now(),
            body: document,
        });

        Ok(id)
    }

    async fn count_documents(&self) -> StorageResult<u64> {
        let state = self.state.read().await;
        if state.closed {
            return Err(StorageError::Closed);
        }

        Ok(state.documents.len() as u64)
    }

    async fn find_latest(&self, limit: usize) -> StorageResult<Vec<StoredDocument>> {
        let state = self.state.read().await;
        if state.closed {
            return Err(StorageError::Closed);
        }

        let skip = state.documents.len().saturating_sub(limit);
        Ok(state.documents.iter().skip(skip).cloned().collect())
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let state = self.state.read().await;

        Ok(HealthStatus {
            healthy: !state.closed,
            message: if state.closed {
                "In-memory storage closed".to_string()
            } else {
                "In-memory storage operational".to_string()
            },
            metadata: HashMap::from([
                ("backend".to_string(), "memory".to_string()),
                ("namespace".to_string(), self.namespace.to_string()),
                ("documents".to_string(), state.documents.len().to_string()),
            ]),
        })
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("closing in-memory store {}", self.namespace);
        self.state.write().await.closed = true;
        Ok(())
    }
}
