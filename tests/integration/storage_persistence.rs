//! Pipeline runs against a real SQLite document store

use energy_monitor::{
    classifier::ThresholdClassifier,
    config::StorageConfig,
    pipeline::{Pipeline, stop_signal},
    sink::PersistenceSink,
    storage,
};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

use crate::helpers::*;

#[tokio::test]
async fn test_readings_persist_across_reconnect() {
    let temp_dir = tempdir().unwrap();
    let uri = format!("sqlite://{}", temp_dir.path().join("energy.db").display());
    let config = StorageConfig::sqlite(&uri);

    let sink = PersistenceSink::connect(&config).await;
    assert!(sink.is_connected());

    let mut pipeline = Pipeline::new(
        seeded_sensor(42),
        ThresholdClassifier::with_threshold(12.0),
        Box::new(sink),
        Box::new(RecordingReporter::default()),
        bounded(20),
    );

    let (_stop_tx, stop_rx) = stop_signal();
    let summary = pipeline.run(stop_rx).await.unwrap();
    assert_eq!(summary.persisted, 20);
    assert_eq!(summary.failed_writes, 0);

    let store = storage::open(&config).await.unwrap();
    assert_eq!(store.count_documents().await.unwrap(), 20);

    let documents = store.find_latest(100).await.unwrap();
    assert_eq!(documents.len(), 20);

    let mut anomalies = 0;
    for document in &documents {
        let value = document.body["value_kwh"].as_f64().unwrap();
        let is_anomaly = document.body["is_anomaly"].as_bool().unwrap();

        assert_eq!(is_anomaly, value > 12.0);
        assert_eq!(document.body["sensor_id"], "Sensor-LARI-01");
        assert_eq!(document.body["location"], "LARI Research Lab");
        if is_anomaly {
            anomalies += 1;
        }
    }
    assert_eq!(anomalies, summary.anomalies);

    // insertion order follows generation order
    assert!(documents.windows(2).all(|pair| {
        pair[0].id < pair[1].id
            && pair[0].body["timestamp"].as_f64() <= pair[1].body["timestamp"].as_f64()
    }));

    store.close().await.unwrap();
}

#[tokio::test]
async fn test_custom_namespace_is_respected() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("energy.db");
    let config = StorageConfig::Sqlite {
        uri: path.display().to_string(),
        database: "lab_db".to_string(),
        collection: "readings".to_string(),
        connect_timeout_ms: 2000,
    };

    let mut pipeline = Pipeline::new(
        seeded_sensor(9),
        ThresholdClassifier::default(),
        Box::new(PersistenceSink::connect(&config).await),
        Box::new(RecordingReporter::default()),
        bounded(3),
    );

    let (_stop_tx, stop_rx) = stop_signal();
    pipeline.run(stop_rx).await.unwrap();

    let default_namespace = storage::open(&StorageConfig::sqlite(path.display().to_string()))
        .await
        .unwrap();
    assert_eq!(default_namespace.count_documents().await.unwrap(), 0);

    let custom = storage::open(&config).await.unwrap();
    assert_eq!(custom.count_documents().await.unwrap(), 3);
}
