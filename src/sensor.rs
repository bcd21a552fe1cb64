//! Simulated energy sensor
//!
//! The sensor models a bimodal consumption profile: most readings fall in a
//! "normal" band, and with a configurable probability a reading is drawn from
//! a higher "peak" band instead.

use chrono::Utc;
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::Deserialize;
use thiserror::Error;
use tracing::trace;

use crate::{Reading, ReadingError, config::ConfigError};

pub const DEFAULT_SENSOR_ID: &str = "Sensor-LARI-01";
pub const DEFAULT_LOCATION: &str = "LARI Research Lab";
pub const DEFAULT_PEAK_PROBABILITY: f64 = 0.40;
pub const DEFAULT_NORMAL_RANGE: KwhRange = KwhRange::new(0.8, 2.5);
pub const DEFAULT_PEAK_RANGE: KwhRange = KwhRange::new(8.0, 15.0);

/// Errors a measurement source may report to the pipeline
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("sensor produced an invalid reading: {0}")]
    InvalidReading(#[from] ReadingError),

    #[error("sensor unavailable: {0}")]
    Unavailable(String),
}

/// Anything that can produce readings on demand
pub trait MeasurementSource {
    fn next_reading(&mut self) -> Result<Reading, SensorError>;
}

/// Inclusive range of energy values, written as `[low, high]` in config files
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "(f64, f64)")]
pub struct KwhRange {
    pub low: f64,
    pub high: f64,
}

impl KwhRange {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    fn validate(&self, name: &'static str) -> Result<(), ConfigError> {
        // values are rounded through `value * 100.0`, which must stay finite
        let valid = self.low.is_finite()
            && (self.high * 100.0).is_finite()
            && self.low >= 0.0
            && self.low <= self.high;

        if valid {
            Ok(())
        } else {
            Err(ConfigError::InvalidRange {
                name,
                low: self.low,
                high: self.high,
            })
        }
    }
}

impl From<(f64, f64)> for KwhRange {
    fn from((low, high): (f64, f64)) -> Self {
        Self::new(low, high)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SensorConfig {
    #[serde(default = "default_sensor_id")]
    pub sensor_id: String,

    #[serde(default = "default_location")]
    pub location: String,

    /// Probability that a reading is drawn from the peak range
    #[serde(default = "default_peak_probability")]
    pub peak_probability: f64,

    #[serde(default = "default_normal_range")]
    pub normal_range: KwhRange,

    #[serde(default = "default_peak_range")]
    pub peak_range: KwhRange,
}

impl SensorConfig {
    pub fn new(sensor_id: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            location: location.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sensor_id.trim().is_empty() {
            return Err(ConfigError::EmptyField("sensor.sensor_id"));
        }
        if self.location.trim().is_empty() {
            return Err(ConfigError::EmptyField("sensor.location"));
        }
        if !(0.0..=1.0).contains(&self.peak_probability) {
            return Err(ConfigError::InvalidProbability(self.peak_probability));
        }

        self.normal_range.validate("sensor.normal_range")?;
        self.peak_range.validate("sensor.peak_range")
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            sensor_id: default_sensor_id(),
            location: default_location(),
            peak_probability: default_peak_probability(),
            normal_range: default_normal_range(),
            peak_range: default_peak_range(),
        }
    }
}

fn default_sensor_id() -> String {
    DEFAULT_SENSOR_ID.to_string()
}

fn default_location() -> String {
    DEFAULT_LOCATION.to_string()
}

fn default_peak_probability() -> f64 {
    DEFAULT_PEAK_PROBABILITY
}

fn default_normal_range() -> KwhRange {
    DEFAULT_NORMAL_RANGE
}

fn default_peak_range() -> KwhRange {
    DEFAULT_PEAK_RANGE
}

/// Simulated IoT energy sensor
///
/// Generic over the random generator so tests can drive it with a seeded
/// [`StdRng`].
#[derive(Debug)]
pub struct EnergySensor<R = StdRng> {
    config: SensorConfig,
    rng: R,
}

impl EnergySensor<StdRng> {
    /// Create a sensor seeded from the operating system
    pub fn new(config: SensorConfig) -> Result<Self, ConfigError> {
        Self::with_rng(config, StdRng::from_os_rng())
    }
}

impl<R: Rng> EnergySensor<R> {
    pub fn with_rng(config: SensorConfig, rng: R) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, rng })
    }

    pub fn sensor_id(&self) -> &str {
        &self.config.sensor_id
    }

    pub fn location(&self) -> &str {
        &self.config.location
    }

    fn sample_kwh(&mut self) -> f64 {
        let SensorConfig {
            peak_probability,
            normal_range,
            peak_range,
            ..
        } = self.config;

        let range = if self.rng.random::<f64>() < peak_probability {
            peak_range
        } else {
            normal_range
        };

        let value = self.rng.random_range(range.low..=range.high);
        round_to_hundredths(value)
    }
}

impl<R: Rng> MeasurementSource for EnergySensor<R> {
    fn next_reading(&mut self) -> Result<Reading, SensorError> {
        let value_kwh = self.sample_kwh();
        let timestamp = epoch_seconds_now();

        trace!(value_kwh, timestamp, "generated reading");

        let reading = Reading::new(
            self.config.sensor_id.clone(),
            self.config.location.clone(),
            value_kwh,
            timestamp,
        )?;

        Ok(reading)
    }
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Current wall-clock time as fractional seconds since the Unix epoch
pub fn epoch_seconds_now() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
