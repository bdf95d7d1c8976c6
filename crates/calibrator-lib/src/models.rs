//! Core data models for the calibrator

use crate::error::{CalibrationError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default port the benchmark services listen on
pub const DEFAULT_SERVICE_PORT: u16 = 8080;

/// One (language, configuration, endpoint) combination to calibrate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub language: String,
    pub configuration: String,
    pub endpoint: String,
    pub container_id: String,
    pub host: String,
    pub port: u16,
}

impl Scenario {
    pub fn builder() -> ScenarioBuilder {
        ScenarioBuilder::default()
    }

    /// Hostname the service container is expected to carry
    pub fn expected_hostname(&self) -> String {
        format!("{}-{}", self.language, self.configuration)
    }
}

/// Builder for [`Scenario`]
#[derive(Debug, Default)]
pub struct ScenarioBuilder {
    language: Option<String>,
    configuration: Option<String>,
    endpoint: Option<String>,
    container_id: Option<String>,
    host: Option<String>,
    port: Option<u16>,
}

impl ScenarioBuilder {
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn configuration(mut self, configuration: impl Into<String>) -> Self {
        self.configuration = Some(configuration.into());
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn container_id(mut self, container_id: impl Into<String>) -> Self {
        self.container_id = Some(container_id.into());
        self
    }

    /// Set the target host (defaults to the expected hostname)
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn build(self) -> Result<Scenario> {
        let language = self
            .language
            .ok_or(CalibrationError::MissingField("language"))?;
        let configuration = self
            .configuration
            .ok_or(CalibrationError::MissingField("configuration"))?;
        let endpoint = self
            .endpoint
            .ok_or(CalibrationError::MissingField("endpoint"))?;
        let container_id = self
            .container_id
            .ok_or(CalibrationError::MissingField("container_id"))?;
        let host = self
            .host
            .unwrap_or_else(|| format!("{}-{}", language, configuration));

        Ok(Scenario {
            language,
            configuration,
            endpoint,
            container_id,
            host,
            port: self.port.unwrap_or(DEFAULT_SERVICE_PORT),
        })
    }
}

/// A running container as reported by the container runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningContainer {
    pub id: String,
    pub hostname: String,
}

/// Cumulative CPU counters for one container, with the values of the
/// preceding accounting period
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuSnapshot {
    pub container_usage: u64,
    pub precpu_container_usage: u64,
    pub system_usage: u64,
    pub precpu_system_usage: u64,
    pub online_cpus: u32,
}

impl CpuSnapshot {
    /// Utilization in percent of one core (can exceed 100 on multi-core hosts)
    ///
    /// Counters that went backwards, e.g. after a container restart, count as
    /// no usage.
    pub fn utilization(&self) -> f64 {
        let cpu_delta = self
            .container_usage
            .saturating_sub(self.precpu_container_usage);
        let system_delta = self.system_usage.saturating_sub(self.precpu_system_usage);
        cpu_utilization(cpu_delta as f64, system_delta as f64, self.online_cpus)
    }
}

/// `(cpu_delta / system_delta) * online_cpus * 100`, or zero when no system
/// time elapsed between the two readings
pub fn cpu_utilization(cpu_delta: f64, system_delta: f64, online_cpus: u32) -> f64 {
    if system_delta <= 0.0 {
        return 0.0;
    }
    (cpu_delta / system_delta) * f64::from(online_cpus) * 100.0
}

/// A single CPU reading taken during a trial
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CpuSample {
    /// Offset from the trial start at which the sample was scheduled
    pub offset: Duration,
    pub utilization: f64,
}

/// Result of running one load level for one trial window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialOutcome {
    pub load: u32,
    pub exceeded: bool,
    pub mean_cpu: f64,
    pub samples: Vec<CpuSample>,
}

/// Result of the calibration loop for one scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub reached_target: bool,
    /// Load at termination; one increment past the last tried load when exhausted
    pub final_load: u32,
    /// Mean CPU of the last trial
    pub avg_cpu_usage: f64,
    /// Every load level probed, in order
    pub probed_loads: Vec<u32>,
}

impl CalibrationResult {
    /// Load reported in result files: the reached load, or zero
    pub fn target_load(&self) -> u32 {
        if self.reached_target {
            self.final_load
        } else {
            0
        }
    }

    pub fn trials(&self) -> usize {
        self.probed_loads.len()
    }
}

/// A calibrated scenario, ready to be appended to the results file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRecord {
    pub run_id: String,
    pub scenario: Scenario,
    pub result: CalibrationResult,
}
