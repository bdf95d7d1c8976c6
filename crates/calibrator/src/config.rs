//! Calibrator configuration

use anyhow::{bail, Result};
use calibrator_lib::scenario::{ALL_LANGUAGES, DEFAULT_ENDPOINTS};
use calibrator_lib::trial::DEFAULT_LOAD_GRACE;
use calibrator_lib::{DecisionRule, LoadRamp, SamplingPlan, TrialConfig, DEFAULT_SERVICE_PORT};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const MEAN_RULE_THRESHOLD: f64 = 75.0;
const COUNT_RULE_THRESHOLD: f64 = 80.0;

/// Which decision rule trials use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionRuleKind {
    #[default]
    Mean,
    Count,
}

/// Calibrator configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CalibratorConfig {
    /// Language to calibrate, or `all`
    #[serde(default = "default_language")]
    pub language: String,

    /// Port every service listens on
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,

    #[serde(default = "default_initial_load")]
    pub initial_load: u32,

    #[serde(default = "default_max_load")]
    pub max_load: u32,

    #[serde(default = "default_load_increment")]
    pub load_increment: u32,

    /// Length of each trial in seconds
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,

    /// k6 arrival-rate time unit
    #[serde(default = "default_time_unit")]
    pub time_unit: String,

    #[serde(default)]
    pub sampling_plan: SamplingPlan,

    #[serde(default)]
    pub decision_rule: DecisionRuleKind,

    /// CPU utilization threshold in percent; 75 for the mean rule, 80 for count
    #[serde(default)]
    pub cpu_threshold: Option<f64>,

    /// Fraction of samples over the threshold for the count rule
    #[serde(default = "default_required_fraction")]
    pub required_fraction: f64,

    #[serde(default = "default_k6_binary")]
    pub k6_binary: PathBuf,

    #[serde(default = "default_k6_script")]
    pub k6_script: PathBuf,

    /// Directory for result files, progress logs and metrics
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,

    /// Deadline for a single container runtime query
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,

    /// Extra time k6 gets after the trial window before it is killed
    #[serde(default = "default_load_grace_secs")]
    pub load_grace_secs: u64,

    /// Configuration variants to skip, e.g. `elastic`
    #[serde(default)]
    pub excluded_configs: Vec<String>,

    /// Fixed seed for the scenario shuffle
    #[serde(default)]
    pub shuffle_seed: Option<u64>,
}

fn default_language() -> String {
    ALL_LANGUAGES.to_string()
}

fn default_port() -> u16 {
    DEFAULT_SERVICE_PORT
}

fn default_endpoints() -> Vec<String> {
    DEFAULT_ENDPOINTS.iter().map(|e| e.to_string()).collect()
}

fn default_initial_load() -> u32 {
    100
}

fn default_max_load() -> u32 {
    5000
}

fn default_load_increment() -> u32 {
    100
}

fn default_duration_secs() -> u64 {
    60
}

fn default_time_unit() -> String {
    "1s".to_string()
}

fn default_required_fraction() -> f64 {
    0.5
}

fn default_k6_binary() -> PathBuf {
    PathBuf::from("k6")
}

/// The script bundled with this crate
fn default_k6_script() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/k6/script.js"))
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("results")
}

fn default_query_timeout_secs() -> u64 {
    30
}

fn default_load_grace_secs() -> u64 {
    DEFAULT_LOAD_GRACE.as_secs()
}

impl CalibratorConfig {
    /// Load configuration from an optional `calibrator` file and the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("calibrator").required(false))
            .add_source(
                config::Environment::with_prefix("CALIBRATOR")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("endpoints")
                    .with_list_parse_key("excluded_configs"),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.duration_secs == 0 {
            bail!("duration_secs must be greater than zero");
        }
        if self.endpoints.is_empty() {
            bail!("at least one endpoint is required");
        }
        if !(0.0..=1.0).contains(&self.required_fraction) {
            bail!(
                "required_fraction must be within 0..=1, got {}",
                self.required_fraction
            );
        }
        self.load_ramp()?;
        Ok(())
    }

    pub fn load_ramp(&self) -> Result<LoadRamp> {
        Ok(LoadRamp::new(
            self.initial_load,
            self.max_load,
            self.load_increment,
        )?)
    }

    pub fn decision_rule(&self) -> DecisionRule {
        match self.decision_rule {
            DecisionRuleKind::Mean => DecisionRule::Mean {
                threshold: self.cpu_threshold.unwrap_or(MEAN_RULE_THRESHOLD),
            },
            DecisionRuleKind::Count => DecisionRule::Count {
                threshold: self.cpu_threshold.unwrap_or(COUNT_RULE_THRESHOLD),
                required_fraction: self.required_fraction,
            },
        }
    }

    pub fn trial_config(&self) -> TrialConfig {
        TrialConfig {
            duration: Duration::from_secs(self.duration_secs),
            time_unit: self.time_unit.clone(),
            plan: self.sampling_plan,
            rule: self.decision_rule(),
            load_grace: Duration::from_secs(self.load_grace_secs),
        }
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}
