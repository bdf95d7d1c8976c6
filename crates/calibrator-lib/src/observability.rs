//! Observability infrastructure for the calibrator
//!
//! Provides:
//! - Prometheus metrics (trials, samples, query latency, per-scenario outcome)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, Encoder, GaugeVec, Histogram,
    IntCounter, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for container stats queries (in seconds)
const QUERY_LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<CalibratorMetricsInner> = OnceLock::new();

struct CalibratorMetricsInner {
    trials_total: IntCounter,
    samples_total: IntCounter,
    sample_latency_seconds: Histogram,
    scenarios_calibrated: IntCounter,
    scenarios_failed: IntCounter,
    reached_load: GaugeVec,
    trial_mean_cpu: GaugeVec,
}

impl CalibratorMetricsInner {
    fn new() -> Self {
        Self {
            trials_total: register_int_counter!(
                "calibrator_trials_total",
                "Total number of load trials executed"
            )
            .expect("Failed to register trials_total"),

            samples_total: register_int_counter!(
                "calibrator_cpu_samples_total",
                "Total number of container CPU samples taken"
            )
            .expect("Failed to register cpu_samples_total"),

            sample_latency_seconds: register_histogram!(
                "calibrator_sample_latency_seconds",
                "Time spent querying the container runtime for CPU stats",
                QUERY_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register sample_latency_seconds"),

            scenarios_calibrated: register_int_counter!(
                "calibrator_scenarios_calibrated_total",
                "Scenarios whose calibration loop completed"
            )
            .expect("Failed to register scenarios_calibrated_total"),

            scenarios_failed: register_int_counter!(
                "calibrator_scenarios_failed_total",
                "Scenarios aborted by an error"
            )
            .expect("Failed to register scenarios_failed_total"),

            reached_load: register_gauge_vec!(
                "calibrator_target_load",
                "Load level reported for each calibrated scenario (0 when not reached)",
                &["language", "configuration", "endpoint"]
            )
            .expect("Failed to register target_load"),

            trial_mean_cpu: register_gauge_vec!(
                "calibrator_trial_mean_cpu_percent",
                "Mean CPU utilization of the most recent trial per container",
                &["container_id"]
            )
            .expect("Failed to register trial_mean_cpu_percent"),
        }
    }
}

/// Calibrator metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the same
/// underlying metrics.
#[derive(Clone)]
pub struct CalibratorMetrics {
    _private: (),
}

impl Default for CalibratorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl CalibratorMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(CalibratorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &CalibratorMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_sample_latency(&self, duration_secs: f64) {
        self.inner().samples_total.inc();
        self.inner().sample_latency_seconds.observe(duration_secs);
    }

    pub fn record_trial(&self, container_id: &str, mean_cpu: f64) {
        self.inner().trials_total.inc();
        self.inner()
            .trial_mean_cpu
            .with_label_values(&[container_id])
            .set(mean_cpu);
    }

    pub fn record_scenario(&self, language: &str, configuration: &str, endpoint: &str, load: u32) {
        self.inner().scenarios_calibrated.inc();
        self.inner()
            .reached_load
            .with_label_values(&[language, configuration, endpoint])
            .set(f64::from(load));
    }

    pub fn inc_scenarios_failed(&self) {
        self.inner().scenarios_failed.inc();
    }

    /// Render every registered metric in the text exposition format
    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&prometheus::gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Structured logger for calibration events
///
/// Every event carries the run id so log lines from repeated runs can be
/// told apart.
#[derive(Clone)]
pub struct StructuredLogger {
    run_id: String,
}

impl StructuredLogger {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn log_run_started(&self, scenarios: usize, version: &str) {
        info!(
            event = "run_started",
            run_id = %self.run_id,
            scenarios = scenarios,
            calibrator_version = %version,
            "Calibration run started"
        );
    }

    pub fn log_trial_started(&self, url: &str, container_id: &str, load: u32, duration_secs: u64) {
        info!(
            event = "trial_started",
            run_id = %self.run_id,
            url = %url,
            container_id = %container_id,
            load = load,
            duration_secs = duration_secs,
            "Starting load trial"
        );
    }

    pub fn log_cpu_sample(&self, container_id: &str, offset_secs: f64, utilization: f64) {
        info!(
            event = "cpu_sample",
            run_id = %self.run_id,
            container_id = %container_id,
            offset_secs = offset_secs,
            utilization = utilization,
            "CPU sample"
        );
    }

    pub fn log_trial_completed(
        &self,
        container_id: &str,
        load: u32,
        mean_cpu: f64,
        exceeded: bool,
    ) {
        info!(
            event = "trial_completed",
            run_id = %self.run_id,
            container_id = %container_id,
            load = load,
            mean_cpu = mean_cpu,
            exceeded = exceeded,
            "Load trial completed"
        );
    }

    pub fn log_scenario_calibrated(
        &self,
        host: &str,
        endpoint: &str,
        reached_target: bool,
        final_load: u32,
        avg_cpu_usage: f64,
    ) {
        if reached_target {
            info!(
                event = "scenario_calibrated",
                run_id = %self.run_id,
                host = %host,
                endpoint = %endpoint,
                reached_target = true,
                final_load = final_load,
                avg_cpu_usage = avg_cpu_usage,
                "Reached target CPU utilization"
            );
        } else {
            warn!(
                event = "scenario_calibrated",
                run_id = %self.run_id,
                host = %host,
                endpoint = %endpoint,
                reached_target = false,
                final_load = final_load,
                avg_cpu_usage = avg_cpu_usage,
                "Did not reach target CPU utilization"
            );
        }
    }

    pub fn log_scenario_failed(&self, host: &str, endpoint: &str, error: &str) {
        warn!(
            event = "scenario_failed",
            run_id = %self.run_id,
            host = %host,
            endpoint = %endpoint,
            error = %error,
            "Scenario calibration aborted"
        );
    }

    pub fn log_run_finished(&self, calibrated: usize, failed: usize, cancelled: bool) {
        info!(
            event = "run_finished",
            run_id = %self.run_id,
            calibrated = calibrated,
            failed = failed,
            cancelled = cancelled,
            "Calibration run finished"
        );
    }
}
