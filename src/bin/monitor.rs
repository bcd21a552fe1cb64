use anyhow::Context;
use clap::Parser;
use energy_monitor::{
    classifier::ThresholdClassifier,
    config::{Config, Overrides, read_config_file, resolve},
    console::ConsoleReporter,
    pipeline::{Pipeline, PipelineSettings, stop_signal},
    sensor::EnergySensor,
    sink::PersistenceSink,
    util::process_env,
};
use tokio::{signal, spawn, sync::watch};
use tracing::{debug, error, info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
#[command(about = "Simulated energy sensor with anomaly detection and persistence")]
struct Args {
    /// Config file (JSON)
    #[arg(short, long)]
    file: Option<String>,

    /// Alert threshold in kWh
    #[arg(long)]
    threshold: Option<f64>,

    /// Seconds between two readings
    #[arg(long)]
    interval: Option<f64>,

    /// Stop after this many readings
    #[arg(long)]
    iterations: Option<u64>,

    /// Keep readings in memory instead of the configured store
    #[arg(long)]
    memory: bool,

    /// Increase diagnostic output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let filter = filter::Targets::new().with_target("energy_monitor", level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

/// Defaults, then the config file, then the environment, then the command line
fn load_config(args: &Args) -> anyhow::Result<Config> {
    let file = args
        .file
        .as_deref()
        .map(|path| {
            read_config_file(path)
                .with_context(|| format!("failed to load configuration from {path}"))
        })
        .transpose()?;

    let overrides = Overrides {
        alert_threshold: args.threshold,
        interval_secs: args.interval,
        max_iterations: args.iterations,
        in_memory: args.memory,
    };

    resolve(file, process_env, &overrides).context("invalid configuration")
}

/// Request a stop on Ctrl-C or SIGTERM
async fn wait_for_interrupt(stop_tx: watch::Sender<bool>) {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        result = signal::ctrl_c() => {
            if let Err(e) = result {
                error!("failed to listen for Ctrl-C: {e}");
                return;
            }
        }
        _ = terminate => {}
    }

    info!("interrupt received, stopping after the current iteration");
    let _ = stop_tx.send(true);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init(args.verbose);
    trace!("started with args: {args:?}");

    let config = load_config(&args)?;
    debug!("effective configuration: {config:?}");

    let sensor =
        EnergySensor::new(config.sensor.clone()).context("invalid sensor configuration")?;
    let classifier = ThresholdClassifier::new(config.classifier);

    // listen before connecting, the store may take a while to answer
    let (stop_tx, stop_rx) = stop_signal();
    spawn(wait_for_interrupt(stop_tx));

    let sink = PersistenceSink::connect(&config.storage).await;

    if let Some(store) = sink.store() {
        match store.health_check().await {
            Ok(status) => debug!("store health: {} ({:?})", status.message, status.metadata),
            Err(e) => error!("store health check failed: {e}"),
        }
    }

    let mut pipeline = Pipeline::new(
        sensor,
        classifier,
        Box::new(sink),
        Box::new(ConsoleReporter::stdout()),
        PipelineSettings::from(&config.pipeline),
    )
    .with_location(config.sensor.location.clone());

    let summary = pipeline.run(stop_rx).await?;
    debug!("run summary: {summary:?}");

    Ok(())
}
