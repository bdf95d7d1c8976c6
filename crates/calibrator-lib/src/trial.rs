//! Load trials
//!
//! A trial offers one fixed load for one window: the load generator runs in
//! the background while the runner sleeps to each sampling offset and reads
//! the container's CPU utilization. The samples are then reduced to an
//! "exceeded" decision and a mean.

use crate::error::{CalibrationError, Result};
use crate::load::{LoadGenerator, LoadHandle, LoadRequest};
use crate::models::{CpuSample, TrialOutcome};
use crate::observability::{CalibratorMetrics, StructuredLogger};
use crate::results::ProgressLog;
use crate::runtime::CpuSampler;
use crate::shutdown::Shutdown;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Default grace period for the load generator after the window closes
pub const DEFAULT_LOAD_GRACE: Duration = Duration::from_secs(15);

/// Where in the trial window CPU samples are taken
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingPlan {
    /// Nine samples at `(i + 2) * d / 12`; skips the first sixth of the window
    #[default]
    Twelfths,
    /// Five samples at `d/6, d/3, d/2, 2d/3, 5d/6`
    Sixths,
}

impl SamplingPlan {
    /// Offsets from the trial start, strictly increasing
    pub fn offsets(&self, duration: Duration) -> Vec<Duration> {
        match self {
            Self::Twelfths => (0..9u32).map(|i| duration * (i + 2) / 12).collect(),
            Self::Sixths => (1..=5u32).map(|k| duration * k / 6).collect(),
        }
    }
}

/// How a trial's samples are turned into an "exceeded" verdict
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecisionRule {
    /// Exceeded iff the mean is strictly above `threshold`
    Mean { threshold: f64 },
    /// Exceeded iff at least `required_fraction` of samples are strictly
    /// above `threshold`
    Count {
        threshold: f64,
        required_fraction: f64,
    },
}

impl Default for DecisionRule {
    fn default() -> Self {
        Self::Mean { threshold: 75.0 }
    }
}

impl DecisionRule {
    /// Returns `(exceeded, mean)`; the mean is reported under either rule
    pub fn decide(&self, samples: &[f64]) -> Result<(bool, f64)> {
        if samples.is_empty() {
            return Err(CalibrationError::NoSamples);
        }
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;

        let exceeded = match *self {
            Self::Mean { threshold } => mean > threshold,
            Self::Count {
                threshold,
                required_fraction,
            } => {
                let over = samples.iter().filter(|&&s| s > threshold).count();
                over as f64 >= samples.len() as f64 * required_fraction
            }
        };

        Ok((exceeded, mean))
    }
}

/// What a trial runs against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialTarget {
    pub url: String,
    pub container_id: String,
}

/// Runs one trial at a fixed load
#[async_trait]
pub trait TrialRunner: Send + Sync {
    async fn run_trial(&self, target: &TrialTarget, load: u32) -> Result<TrialOutcome>;
}

/// Configuration for trials
#[derive(Debug, Clone)]
pub struct TrialConfig {
    pub duration: Duration,
    pub time_unit: String,
    pub plan: SamplingPlan,
    pub rule: DecisionRule,
    /// Extra time the load generator gets after the window before it is killed
    pub load_grace: Duration,
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(60),
            time_unit: "1s".to_string(),
            plan: SamplingPlan::default(),
            rule: DecisionRule::default(),
            load_grace: DEFAULT_LOAD_GRACE,
        }
    }
}

/// Trial runner that drives a real load generator and samples real CPU
pub struct LoadTrialRunner {
    sampler: CpuSampler,
    generator: Arc<dyn LoadGenerator>,
    config: TrialConfig,
    shutdown: Shutdown,
    logger: StructuredLogger,
    metrics: CalibratorMetrics,
    progress: Option<Arc<ProgressLog>>,
}

impl LoadTrialRunner {
    pub fn new(
        sampler: CpuSampler,
        generator: Arc<dyn LoadGenerator>,
        config: TrialConfig,
        shutdown: Shutdown,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            sampler,
            generator,
            config,
            shutdown,
            logger,
            metrics: CalibratorMetrics::new(),
            progress: None,
        }
    }

    pub fn with_progress_log(mut self, progress: Arc<ProgressLog>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &TrialConfig {
        &self.config
    }

    fn progress(&self, message: impl std::fmt::Display) -> Result<()> {
        match &self.progress {
            Some(log) => log.line(message),
            None => Ok(()),
        }
    }

    /// Sleep to each offset and take one sample there
    async fn collect_samples(
        &self,
        target: &TrialTarget,
        started: Instant,
    ) -> Result<Vec<CpuSample>> {
        let mut shutdown = self.shutdown.clone();
        let offsets = self.config.plan.offsets(self.config.duration);
        let mut samples = Vec::with_capacity(offsets.len());

        for offset in offsets {
            tokio::select! {
                _ = tokio::time::sleep_until(started + offset) => {}
                _ = shutdown.triggered() => return Err(CalibrationError::Cancelled),
            }

            let utilization = self.sampler.sample(&target.container_id).await?;
            self.logger
                .log_cpu_sample(&target.container_id, offset.as_secs_f64(), utilization);
            self.progress(format_args!(
                "CPU usage at point {}s: {}",
                offset.as_secs_f64(),
                utilization
            ))?;
            samples.push(CpuSample {
                offset,
                utilization,
            });
        }

        Ok(samples)
    }
}

#[async_trait]
impl TrialRunner for LoadTrialRunner {
    async fn run_trial(&self, target: &TrialTarget, load: u32) -> Result<TrialOutcome> {
        let duration_secs = self.config.duration.as_secs();
        self.logger
            .log_trial_started(&target.url, &target.container_id, load, duration_secs);
        self.progress(format_args!(
            "Testing with {} RPS for {} seconds, targeting {}, on container {}",
            load, duration_secs, target.url, target.container_id
        ))?;

        let request = LoadRequest {
            url: target.url.clone(),
            load,
            duration: self.config.duration,
            time_unit: self.config.time_unit.clone(),
        };
        let started = Instant::now();
        let handle = match self.generator.start(&request) {
            Ok(handle) => handle,
            Err(e) => {
                // The verdict comes from CPU samples only; keep sampling
                warn!(load = load, error = %e, "Load generator did not start");
                LoadHandle::detached()
            }
        };

        let samples = match self.collect_samples(target, started).await {
            Ok(samples) => samples,
            Err(e) => {
                handle.cancel().await;
                return Err(e);
            }
        };

        let remaining = self.config.duration.saturating_sub(started.elapsed());
        let exit = handle.finish(remaining + self.config.load_grace).await;
        debug!(load = load, exit = ?exit, "Load generator finished");

        let values: Vec<f64> = samples.iter().map(|s| s.utilization).collect();
        let (exceeded, mean_cpu) = self.config.rule.decide(&values)?;

        self.metrics.record_trial(&target.container_id, mean_cpu);
        self.logger
            .log_trial_completed(&target.container_id, load, mean_cpu, exceeded);
        self.progress(format_args!("Average CPU Usage: {}", mean_cpu))?;

        Ok(TrialOutcome {
            load,
            exceeded,
            mean_cpu,
            samples,
        })
    }
}
