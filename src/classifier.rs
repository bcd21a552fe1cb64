//! Anomaly classification for energy readings

use serde::Deserialize;
use tracing::trace;

/// Value assumed when a measurement does not carry `value_kwh`
pub const DEFAULT_VALUE_KWH: f64 = 0.0;

/// Threshold used when none is configured
pub const DEFAULT_ALERT_THRESHOLD: f64 = 12.0;

/// Message attached to readings at or below the threshold
pub const NORMAL_MESSAGE: &str = "Consumption is normal.";

/// Anything that may carry an energy value in kWh
///
/// Loosely typed inputs (raw JSON documents) may lack the field; the
/// classifier substitutes [`DEFAULT_VALUE_KWH`] in that case.
pub trait Measurement {
    fn kwh(&self) -> Option<f64>;
}

impl Measurement for serde_json::Value {
    fn kwh(&self) -> Option<f64> {
        self.get("value_kwh").and_then(serde_json::Value::as_f64)
    }
}

impl Measurement for Option<f64> {
    fn kwh(&self) -> Option<f64> {
        *self
    }
}

/// Outcome of classifying a single measurement
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub is_anomaly: bool,
    pub message: String,
}

impl Classification {
    pub fn normal() -> Self {
        Self {
            is_anomaly: false,
            message: NORMAL_MESSAGE.to_string(),
        }
    }

    pub fn alert(value: f64, threshold: f64) -> Self {
        Self {
            is_anomaly: true,
            message: format!(
                "ALERT: High consumption detected! ({value:?} kWh > {threshold:?} kWh)"
            ),
        }
    }
}

/// Policy deciding whether a measurement is anomalous
pub trait AnomalyPolicy {
    fn classify<M: Measurement + ?Sized>(&self, measurement: &M) -> Classification;
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_alert_threshold")]
    pub alert_threshold: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            alert_threshold: DEFAULT_ALERT_THRESHOLD,
        }
    }
}

fn default_alert_threshold() -> f64 {
    DEFAULT_ALERT_THRESHOLD
}

/// Flags every measurement strictly above a fixed threshold
///
/// Any real threshold is accepted. A threshold at or below zero flags every
/// positive reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdClassifier {
    alert_threshold: f64,
}

impl ThresholdClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            alert_threshold: config.alert_threshold,
        }
    }

    pub fn with_threshold(alert_threshold: f64) -> Self {
        Self { alert_threshold }
    }

    pub fn alert_threshold(&self) -> f64 {
        self.alert_threshold
    }

    pub fn is_anomalous(&self, value: f64) -> bool {
        value > self.alert_threshold
    }
}

impl Default for ThresholdClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

impl AnomalyPolicy for ThresholdClassifier {
    fn classify<M: Measurement + ?Sized>(&self, measurement: &M) -> Classification {
        let value = measurement.kwh().unwrap_or(DEFAULT_VALUE_KWH);

        // equality is not an anomaly
        if self.is_anomalous(value) {
            trace!(value, threshold = self.alert_threshold, "reading exceeds threshold");
            return Classification::alert(value, self.alert_threshold);
        }

        Classification::normal()
    }
}
