//! RPS calibrator
//!
//! Discovers the instrumented services running on this host and, one
//! scenario at a time, finds the request rate at which each service's
//! container crosses the CPU threshold.

use anyhow::{Context, Result};
use calibrator_lib::{
    observability::{CalibratorMetrics, StructuredLogger},
    scenario::{discover_scenarios, shuffle_scenarios},
    new_run_id, run_timestamp, shutdown, CalibrationDriver, ConfigurationTable, CpuSampler,
    DockerRuntime, K6LoadGenerator, LoadTrialRunner, ProgressLog, ResultsSink, RunFiles,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

const CALIBRATOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting rps-calibrator");

    let config = config::CalibratorConfig::load().context("invalid calibrator configuration")?;
    info!(
        language = %config.language,
        endpoints = ?config.endpoints,
        duration_secs = config.duration_secs,
        "Calibrator configured"
    );

    let run_id = new_run_id();
    let logger = StructuredLogger::new(&run_id);
    let metrics = CalibratorMetrics::new();

    std::fs::create_dir_all(&config.results_dir).with_context(|| {
        format!("failed to create results dir {}", config.results_dir.display())
    })?;
    let files = RunFiles::new(&config.results_dir, &run_timestamp());
    let progress = Arc::new(ProgressLog::create(&files.progress_log)?);

    let runtime = DockerRuntime::connect().context("failed to connect to Docker")?;
    let sampler = CpuSampler::new(Arc::new(runtime)).with_query_timeout(config.query_timeout());

    let table = ConfigurationTable::standard().filter_language(&config.language);
    if table.is_empty() {
        warn!(language = %config.language, "No configurations to calibrate");
        return Ok(());
    }

    let mut scenarios = discover_scenarios(
        &sampler,
        &table,
        &config.endpoints,
        &config.excluded_configs,
        config.port,
    )
    .await?;
    if scenarios.is_empty() {
        warn!("No running services match the configuration table");
        return Ok(());
    }
    shuffle_scenarios(&mut scenarios, config.shuffle_seed);
    logger.log_run_started(scenarios.len(), CALIBRATOR_VERSION);

    let (trigger, shutdown) = shutdown::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("SIGINT received, stopping after the current trial");
            trigger.trigger();
        }
    });

    let generator = Arc::new(K6LoadGenerator::new(&config.k6_binary, &config.k6_script));
    let runner = LoadTrialRunner::new(
        sampler,
        generator,
        config.trial_config(),
        shutdown.clone(),
        logger.clone(),
    )
    .with_progress_log(progress.clone());

    let mut sink = ResultsSink::open([&files.results, &files.shared_results])?;

    let driver = CalibrationDriver::new(runner, config.load_ramp()?, shutdown, logger)
        .with_progress_log(progress.clone());
    let summary = driver.run(&scenarios, &mut sink).await?;

    std::fs::write(&files.metrics, metrics.render()?)
        .with_context(|| format!("failed to write {}", files.metrics.display()))?;

    info!(
        calibrated = summary.calibrated(),
        failed = summary.failed(),
        cancelled = summary.cancelled,
        progress_log = %progress.path().display(),
        "Calibration run finished"
    );

    Ok(())
}
