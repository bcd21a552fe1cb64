//! Measurement pipeline driver
//!
//! ## Lifecycle
//!
//! ```text
//! INIT ──run()──► RUNNING ──interrupt / iteration limit / source error──► STOPPED
//! ```
//!
//! ## Iteration
//!
//! ```text
//! stop requested? → next_reading → classify → annotate → sink.insert → report → pause
//!      ↑                                                                          │
//!      └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The stop signal is only observed at the top of an iteration and while
//! pausing, never in the middle of a write. The sink is closed exactly once,
//! when the pipeline enters `STOPPED`.

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, trace};

use crate::AnnotatedReading;
use crate::classifier::AnomalyPolicy;
use crate::config::PipelineConfig;
use crate::console::StatusReporter;
use crate::sensor::{MeasurementSource, SensorError};
use crate::sink::ReadingSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    Running,
    Stopped,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Init => write!(f, "INIT"),
            PipelineState::Running => write!(f, "RUNNING"),
            PipelineState::Stopped => write!(f, "STOPPED"),
        }
    }
}

/// Why the pipeline left the RUNNING state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// An operator asked the pipeline to stop
    Interrupted,

    /// The configured number of iterations completed
    IterationLimit(u64),

    /// The measurement source reported an unrecoverable error
    SourceFailed(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline cannot run from state {0}")]
    NotRunnable(PipelineState),
}

/// Counters collected over one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub iterations: u64,
    pub anomalies: u64,
    pub persisted: u64,
    pub failed_writes: u64,
    pub reason: StopReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Pause between the end of one iteration and the start of the next
    pub interval: Duration,

    /// Stop after this many iterations
    pub max_iterations: Option<u64>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_iterations: None,
        }
    }
}

impl From<&PipelineConfig> for PipelineSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            interval: config.interval(),
            max_iterations: config.max_iterations,
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    iterations: u64,
    anomalies: u64,
    persisted: u64,
    failed_writes: u64,
}

impl Counters {
    fn into_summary(self, reason: StopReason) -> RunSummary {
        RunSummary {
            iterations: self.iterations,
            anomalies: self.anomalies,
            persisted: self.persisted,
            failed_writes: self.failed_writes,
            reason,
        }
    }
}

/// Create the stop signal for a pipeline
///
/// Sending `true` on the sender asks a running pipeline to stop at the next
/// iteration boundary.
pub fn stop_signal() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Drives source → classifier → sink → reporter in a loop
pub struct Pipeline<S, C> {
    source: S,
    classifier: C,
    sink: Box<dyn ReadingSink>,
    reporter: Box<dyn StatusReporter>,
    settings: PipelineSettings,
    location: String,
    state: PipelineState,
}

impl<S, C> Pipeline<S, C>
where
    S: MeasurementSource + Send,
    C: AnomalyPolicy + Send,
{
    pub fn new(
        source: S,
        classifier: C,
        sink: Box<dyn ReadingSink>,
        reporter: Box<dyn StatusReporter>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            source,
            classifier,
            sink,
            reporter,
            settings,
            location: String::new(),
            state: PipelineState::Init,
        }
    }

    /// Location announced in the startup banner
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Run until stopped, then close the sink
    ///
    /// Storage failures never end the run. Only a stop request, the
    /// iteration limit or a source error do.
    #[instrument(skip_all)]
    pub async fn run(
        &mut self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<RunSummary, PipelineError> {
        if self.state != PipelineState::Init {
            return Err(PipelineError::NotRunnable(self.state));
        }

        self.state = PipelineState::Running;
        debug!("pipeline state: {}", self.state);
        self.reporter.started(&self.location);

        let mut counters = Counters::default();
        let reason = loop {
            if *shutdown.borrow() {
                break StopReason::Interrupted;
            }

            if self.limit_reached(&counters) {
                break StopReason::IterationLimit(counters.iterations);
            }

            if let Err(e) = self.iterate(&mut counters).await {
                error!("unrecoverable source error: {e}");
                break StopReason::SourceFailed(e.to_string());
            }

            // no pause after the last permitted iteration
            if self.limit_reached(&counters) {
                break StopReason::IterationLimit(counters.iterations);
            }

            pause(self.settings.interval, &mut shutdown).await;
        };

        self.stop(&reason).await;

        let summary = counters.into_summary(reason);
        info!(
            iterations = summary.iterations,
            anomalies = summary.anomalies,
            persisted = summary.persisted,
            failed_writes = summary.failed_writes,
            "pipeline stopped: {:?}",
            summary.reason
        );

        Ok(summary)
    }

    fn limit_reached(&self, counters: &Counters) -> bool {
        self.settings
            .max_iterations
            .is_some_and(|limit| counters.iterations >= limit)
    }

    #[instrument(skip_all, fields(iteration = counters.iterations + 1))]
    async fn iterate(&mut self, counters: &mut Counters) -> Result<(), SensorError> {
        let reading = self.source.next_reading()?;
        let classification = self.classifier.classify(&reading);
        let annotated = AnnotatedReading::new(reading, classification);

        trace!("annotated reading: {annotated:?}");

        if self.sink.insert(&annotated).await {
            counters.persisted += 1;
        } else {
            counters.failed_writes += 1;
        }

        if annotated.is_anomaly() {
            counters.anomalies += 1;
        }
        counters.iterations += 1;

        self.reporter.reading(&annotated);
        Ok(())
    }

    async fn stop(&mut self, reason: &StopReason) {
        self.sink.close().await;
        self.state = PipelineState::Stopped;
        debug!("pipeline state: {}", self.state);
        self.reporter.stopped(reason);
    }
}

/// Sleep for `interval`, returning early when a stop is requested
async fn pause(interval: Duration, shutdown: &mut watch::Receiver<bool>) {
    let sleep = tokio::time::sleep(interval);
    tokio::pin!(sleep);

    tokio::select! {
        _ = &mut sleep => {}
        changed = shutdown.changed() => {
            // sender gone: nobody can interrupt us any more, finish the pause
            if changed.is_err() {
                sleep.await;
            }
        }
    }
}
