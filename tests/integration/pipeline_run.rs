//! End-to-end runs of the pipeline with recording collaborators
//!
//! These tests verify that:
//! - Every iteration classifies exactly once before inserting
//! - The sink is closed exactly once, after the last insert
//! - Readings reach the sink in generation order

use energy_monitor::pipeline::{Pipeline, PipelineState, StopReason, stop_signal};
use pretty_assertions::assert_eq;

use crate::helpers::*;

#[tokio::test]
async fn test_three_iterations_alternate_classify_and_insert() {
    let log = EventLog::default();

    let mut pipeline = Pipeline::new(
        seeded_sensor(7),
        RecordingClassifier::new(12.0, log.clone()),
        Box::new(RecordingSink::new(log.clone())),
        Box::new(RecordingReporter::default()),
        bounded(3),
    );

    let (_stop_tx, stop_rx) = stop_signal();
    let summary = pipeline.run(stop_rx).await.unwrap();

    assert_eq!(summary.iterations, 3);
    assert_eq!(summary.persisted, 3);
    assert_eq!(summary.reason, StopReason::IterationLimit(3));
    assert_eq!(
        log.snapshot(),
        vec!["classify", "insert", "classify", "insert", "classify", "insert", "close"]
    );
}

#[tokio::test]
async fn test_annotations_match_threshold() {
    let log = EventLog::default();
    let sink = RecordingSink::new(log.clone());
    let accepted = sink.accepted();

    let mut pipeline = Pipeline::new(
        seeded_sensor(11),
        RecordingClassifier::new(5.0, log.clone()),
        Box::new(sink),
        Box::new(RecordingReporter::default()),
        bounded(50),
    );

    let (_stop_tx, stop_rx) = stop_signal();
    let summary = pipeline.run(stop_rx).await.unwrap();

    let readings = accepted.lock().unwrap().clone();
    assert_eq!(readings.len(), 50);

    let anomalies = readings.iter().filter(|r| r.is_anomaly()).count() as u64;
    assert_eq!(anomalies, summary.anomalies);

    for reading in &readings {
        let value = reading.reading().value_kwh();
        assert_eq!(reading.is_anomaly(), value > 5.0);
        if reading.is_anomaly() {
            assert!(reading.status_message().starts_with("ALERT"));
        } else {
            assert_eq!(reading.status_message(), "Consumption is normal.");
        }
    }

    // generation order is preserved
    assert!(
        readings
            .windows(2)
            .all(|pair| pair[0].reading().timestamp() <= pair[1].reading().timestamp())
    );
}

#[tokio::test]
async fn test_reporter_sees_lifecycle() {
    let reporter = RecordingReporter::default();

    let mut pipeline = Pipeline::new(
        seeded_sensor(3),
        RecordingClassifier::new(100.0, EventLog::default()),
        Box::new(RecordingSink::new(EventLog::default())),
        Box::new(reporter.clone()),
        bounded(2),
    )
    .with_location("LARI Research Lab");

    assert_eq!(pipeline.state(), PipelineState::Init);

    let (_stop_tx, stop_rx) = stop_signal();
    pipeline.run(stop_rx).await.unwrap();

    assert_eq!(pipeline.state(), PipelineState::Stopped);
    assert_eq!(
        reporter.log.snapshot(),
        vec![
            "started LARI Research Lab",
            "Consumption is normal.",
            "Consumption is normal.",
            "stopped IterationLimit(2)",
        ]
    );
}

#[tokio::test]
async fn test_interrupt_closes_sink_once() {
    let log = EventLog::default();

    let mut pipeline = Pipeline::new(
        seeded_sensor(5),
        RecordingClassifier::new(12.0, log.clone()),
        Box::new(RecordingSink::new(log.clone())),
        Box::new(RecordingReporter::default()),
        energy_monitor::pipeline::PipelineSettings {
            interval: std::time::Duration::from_millis(10),
            max_iterations: None,
        },
    );

    let (stop_tx, stop_rx) = stop_signal();
    let handle = tokio::spawn(async move { pipeline.run(stop_rx).await });

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    stop_tx.send(true).unwrap();

    let summary = handle.await.unwrap().unwrap();

    assert_eq!(summary.reason, StopReason::Interrupted);
    assert!(summary.iterations >= 1);
    assert_eq!(log.count("close"), 1);
    assert_eq!(log.count("insert") as u64, summary.iterations);
    assert_eq!(log.count("classify") as u64, summary.iterations);
    assert_eq!(log.snapshot().last().map(String::as_str), Some("close"));
}

#[tokio::test]
async fn test_zero_iteration_limit_only_closes_sink() {
    let log = EventLog::default();

    let mut pipeline = Pipeline::new(
        seeded_sensor(8),
        RecordingClassifier::new(12.0, log.clone()),
        Box::new(RecordingSink::new(log.clone())),
        Box::new(RecordingReporter::default()),
        bounded(0),
    );

    let (_stop_tx, stop_rx) = stop_signal();
    let summary = pipeline.run(stop_rx).await.unwrap();

    assert_eq!(summary.iterations, 0);
    assert_eq!(summary.persisted, 0);
    assert_eq!(summary.reason, StopReason::IterationLimit(0));
    assert_eq!(log.snapshot(), vec!["close"]);
}
