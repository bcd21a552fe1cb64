//! Human-readable status output
//!
//! The pipeline reports through the [`StatusReporter`] trait so tests can
//! record status lines instead of capturing stdout.

use std::io::{self, Stdout, Write};

use chrono::{DateTime, Local};
use tracing::warn;

use crate::AnnotatedReading;
use crate::pipeline::StopReason;

const ANOMALY_ICON: &str = "🔴";
const NORMAL_ICON: &str = "🟢";

/// Receives lifecycle and per-reading notifications from the pipeline
pub trait StatusReporter: Send {
    fn started(&mut self, location: &str);

    fn reading(&mut self, reading: &AnnotatedReading);

    fn stopped(&mut self, reason: &StopReason);
}

/// Format a Unix timestamp (fractional seconds) as local `HH:MM:SS`
pub fn local_clock(timestamp: f64) -> String {
    let secs = timestamp.floor();
    let nanos = ((timestamp - secs) * 1e9) as u32;

    DateTime::from_timestamp(secs as i64, nanos)
        .map(|utc| utc.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string())
}

/// Lines printed for one reading
pub fn status_lines(reading: &AnnotatedReading) -> Vec<String> {
    let icon = if reading.is_anomaly() {
        ANOMALY_ICON
    } else {
        NORMAL_ICON
    };

    let mut lines = vec![format!(
        "{icon} [{}] {}",
        local_clock(reading.reading().timestamp()),
        reading.status_message()
    )];

    if reading.is_anomaly() {
        lines.push(format!(
            "    └── ⚠️  Action required at {}!",
            reading.reading().location()
        ));
    }

    lines
}

/// Lines printed when the pipeline stops
pub fn stop_lines(reason: &StopReason) -> Vec<String> {
    let headline = match reason {
        StopReason::Interrupted => "\n[System] 🛑 Simulation stopped by user.".to_string(),
        StopReason::IterationLimit(count) => {
            format!("\n[System] Simulation finished after {count} iterations.")
        }
        StopReason::SourceFailed(e) => format!("\n[System] ❌ Critical Error: {e}"),
    };

    vec![
        headline,
        "[System] Database connection closed. Goodbye.".to_string(),
    ]
}

/// Writes status lines to a terminal (stdout by default)
pub struct ConsoleReporter<W = Stdout> {
    out: W,
}

impl ConsoleReporter<Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write + Send> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, lines: &[String]) {
        let result = lines
            .iter()
            .try_for_each(|line| writeln!(self.out, "{line}"))
            .and_then(|_| self.out.flush());

        if let Err(e) = result {
            warn!("failed to write status output: {e}");
        }
    }
}

impl<W: Write + Send> StatusReporter for ConsoleReporter<W> {
    fn started(&mut self, location: &str) {
        self.emit(&[
            "--- ⚡ Starting Energy Monitoring System ⚡ ---".to_string(),
            format!("[System] Simulation running for: {location}"),
        ]);
    }

    fn reading(&mut self, reading: &AnnotatedReading) {
        self.emit(&status_lines(reading));
    }

    fn stopped(&mut self, reason: &StopReason) {
        self.emit(&stop_lines(reason));
    }
}
