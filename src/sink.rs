//! Persistence boundary of the pipeline
//!
//! The sink wraps a [`DocumentStore`] and turns every storage failure into a
//! logged diagnostic plus a `false` return value. Nothing that happens behind
//! this boundary can stop the measurement loop.

use async_trait::async_trait;
use tracing::{debug, error, info, instrument, warn};

use crate::AnnotatedReading;
use crate::config::StorageConfig;
use crate::storage::{self, DocumentStore};

/// Destination for annotated readings
#[async_trait]
pub trait ReadingSink: Send {
    /// Try to store one reading; `true` only on an acknowledged write
    async fn insert(&mut self, reading: &AnnotatedReading) -> bool;

    /// Release the underlying connection; safe to call more than once
    async fn close(&mut self);
}

/// Sink backed by a document store, degrading to a no-op when disconnected
pub struct PersistenceSink {
    store: Option<Box<dyn DocumentStore>>,
    target: String,
}

impl PersistenceSink {
    /// Connect to the store described by `config`
    ///
    /// Never fails: if the store cannot be reached the sink starts in the
    /// disconnected state and every insert returns `false`.
    #[instrument(skip_all, fields(target = %config.target()))]
    pub async fn connect(config: &StorageConfig) -> Self {
        let target = config.target();
        let namespace = config.namespace();

        match storage::open(config).await {
            Ok(store) => {
                info!("connected to document store '{namespace}'");
                Self::with_store(store, target)
            }
            Err(e) => {
                error!("could not connect to document store '{namespace}': {e}. Is the server running?");
                Self::disconnected(target)
            }
        }
    }

    pub fn with_store(store: Box<dyn DocumentStore>, target: impl Into<String>) -> Self {
        Self {
            store: Some(store),
            target: target.into(),
        }
    }

    pub fn disconnected(target: impl Into<String>) -> Self {
        Self {
            store: None,
            target: target.into(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.store.is_some()
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Access the underlying store, if connected
    pub fn store(&self) -> Option<&dyn DocumentStore> {
        self.store.as_deref()
    }
}

#[async_trait]
impl ReadingSink for PersistenceSink {
    #[instrument(skip_all, fields(target = %self.target))]
    async fn insert(&mut self, reading: &AnnotatedReading) -> bool {
        let Some(store) = &self.store else {
            warn!("no database connection, reading not saved");
            return false;
        };

        let document = match reading.to_document() {
            Ok(document) => document,
            Err(e) => {
                error!("failed to serialize reading: {e}");
                return false;
            }
        };

        match store.insert_one(document).await {
            Ok(id) => {
                debug!("reading inserted with id {id}");
                true
            }
            Err(e) => {
                error!("error inserting reading: {e}");
                false
            }
        }
    }

    #[instrument(skip_all, fields(target = %self.target))]
    async fn close(&mut self) {
        let Some(store) = self.store.take() else {
            debug!("sink already closed or never connected");
            return;
        };

        match store.close().await {
            Ok(()) => info!("document store connection closed"),
            Err(e) => warn!("error while closing document store: {e}"),
        }
    }
}
