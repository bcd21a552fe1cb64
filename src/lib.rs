pub mod classifier;
pub mod config;
pub mod console;
pub mod pipeline;
pub mod sensor;
pub mod sink;
pub mod storage;
pub mod util;

use serde::Serialize;
use thiserror::Error;

use crate::classifier::{Classification, Measurement};

/// Errors raised when a reading would violate its invariants
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReadingError {
    #[error("sensor id must not be empty")]
    EmptySensorId,

    #[error("location must not be empty")]
    EmptyLocation,

    #[error("energy value must be a finite, non-negative number (got {0})")]
    InvalidValue(f64),
}

/// A single energy consumption measurement
///
/// Readings are immutable once produced. Fields are only reachable through
/// accessors so the non-negative and non-empty invariants hold for every
/// instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    sensor_id: String,
    location: String,
    value_kwh: f64,
    /// Seconds since the Unix epoch (fractional)
    timestamp: f64,
}

impl Reading {
    pub fn new(
        sensor_id: impl Into<String>,
        location: impl Into<String>,
        value_kwh: f64,
        timestamp: f64,
    ) -> Result<Self, ReadingError> {
        let sensor_id = sensor_id.into();
        let location = location.into();

        if sensor_id.trim().is_empty() {
            return Err(ReadingError::EmptySensorId);
        }
        if location.trim().is_empty() {
            return Err(ReadingError::EmptyLocation);
        }
        if !value_kwh.is_finite() || value_kwh < 0.0 {
            return Err(ReadingError::InvalidValue(value_kwh));
        }

        Ok(Self {
            sensor_id,
            location,
            value_kwh,
            timestamp,
        })
    }

    pub fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn value_kwh(&self) -> f64 {
        self.value_kwh
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }
}

impl Measurement for Reading {
    fn kwh(&self) -> Option<f64> {
        Some(self.value_kwh)
    }
}

/// A reading enriched with the classifier verdict
///
/// Serializes to a flat document (`sensor_id`, `location`, `value_kwh`,
/// `timestamp`, `is_anomaly`, `status_message`), which is what the
/// document stores persist.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedReading {
    #[serde(flatten)]
    reading: Reading,
    is_anomaly: bool,
    status_message: String,
}

impl AnnotatedReading {
    pub fn new(reading: Reading, classification: Classification) -> Self {
        let Classification {
            is_anomaly,
            message,
        } = classification;

        Self {
            reading,
            is_anomaly,
            status_message: message,
        }
    }

    pub fn reading(&self) -> &Reading {
        &self.reading
    }

    pub fn is_anomaly(&self) -> bool {
        self.is_anomaly
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    /// Render the reading as a JSON document for storage
    pub fn to_document(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}
