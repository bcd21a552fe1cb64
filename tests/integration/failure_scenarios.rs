//! Failure tests for the persistence boundary
//!
//! These tests verify that storage problems never stop the measurement loop:
//! - Unreachable stores leave the sink disconnected
//! - Rejected writes are counted and skipped
//! - Closing is always safe

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use energy_monitor::{
    AnnotatedReading, Reading,
    classifier::Classification,
    config::StorageConfig,
    pipeline::{Pipeline, StopReason, stop_signal},
    sink::{PersistenceSink, ReadingSink},
    storage::{
        DocumentId, DocumentStore, HealthStatus, Namespace, StorageError, StorageResult,
        StoredDocument,
    },
};

use crate::helpers::*;

fn unreachable_store() -> StorageConfig {
    StorageConfig::Sqlite {
        uri: "/nonexistent-energy-monitor-dir/nested/energy.db".to_string(),
        database: "energy_db".to_string(),
        collection: "measures".to_string(),
        connect_timeout_ms: 2000,
    }
}

fn annotated() -> AnnotatedReading {
    let reading = Reading::new("Test-Sensor", "Test Lab", 10.5, 123_456_789.0).unwrap();
    AnnotatedReading::new(reading, Classification::normal())
}

/// Store that fails every second write
struct FlakyStore {
    namespace: Namespace,
    calls: AtomicU64,
}

#[async_trait]
impl DocumentStore for FlakyStore {
    fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    async fn insert_one(&self, _document: serde_json::Value) -> StorageResult<DocumentId> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call % 2 == 1 {
            return Err(StorageError::QueryFailed("write rejected".to_string()));
        }
        Ok(DocumentId(call as i64))
    }

    async fn count_documents(&self) -> StorageResult<u64> {
        Ok(0)
    }

    async fn find_latest(&self, _limit: usize) -> StorageResult<Vec<StoredDocument>> {
        Ok(vec![])
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        Ok(HealthStatus {
            healthy: true,
            message: "flaky".to_string(),
            metadata: Default::default(),
        })
    }

    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}

#[cfg(feature = "storage-sqlite")]
#[tokio::test]
async fn test_unreachable_store_degrades_to_disconnected() {
    let mut sink = PersistenceSink::connect(&unreachable_store()).await;

    assert!(!sink.is_connected());
    assert!(!sink.insert(&annotated()).await);

    sink.close().await;
    sink.close().await;
}

#[tokio::test]
async fn test_pipeline_keeps_measuring_without_store() {
    let sink = PersistenceSink::connect(&unreachable_store()).await;

    let mut pipeline = Pipeline::new(
        seeded_sensor(1),
        RecordingClassifier::new(12.0, EventLog::default()),
        Box::new(sink),
        Box::new(RecordingReporter::default()),
        bounded(5),
    );

    let (_stop_tx, stop_rx) = stop_signal();
    let summary = pipeline.run(stop_rx).await.unwrap();

    assert_eq!(summary.reason, StopReason::IterationLimit(5));
    assert_eq!(summary.iterations, 5);
    assert_eq!(summary.persisted, 0);
    assert_eq!(summary.failed_writes, 5);
}

#[tokio::test]
async fn test_rejected_writes_are_counted() {
    let store = FlakyStore {
        namespace: Namespace::new("energy_db", "measures"),
        calls: AtomicU64::new(0),
    };
    let sink = PersistenceSink::with_store(Box::new(store), "flaky");

    let mut pipeline = Pipeline::new(
        seeded_sensor(2),
        RecordingClassifier::new(12.0, EventLog::default()),
        Box::new(sink),
        Box::new(RecordingReporter::default()),
        bounded(6),
    );

    let (_stop_tx, stop_rx) = stop_signal();
    let summary = pipeline.run(stop_rx).await.unwrap();

    assert_eq!(summary.iterations, 6);
    assert_eq!(summary.persisted, 3);
    assert_eq!(summary.failed_writes, 3);
}

#[tokio::test]
async fn test_rejecting_sink_does_not_stop_pipeline() {
    let log = EventLog::default();

    let mut pipeline = Pipeline::new(
        seeded_sensor(4),
        RecordingClassifier::new(12.0, log.clone()),
        Box::new(RecordingSink::rejecting(log.clone())),
        Box::new(RecordingReporter::default()),
        bounded(4),
    );

    let (_stop_tx, stop_rx) = stop_signal();
    let summary = pipeline.run(stop_rx).await.unwrap();

    assert_eq!(summary.failed_writes, 4);
    assert_eq!(log.count("insert"), 4);
    assert_eq!(log.count("close"), 1);
}
