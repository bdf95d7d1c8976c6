//! Scenario discovery
//!
//! Scenarios are the cross product of the services that are actually
//! running (matched by the `{language}-{configuration}` hostname convention)
//! and the endpoint list.

use crate::calibration::LoadRamp;
use crate::error::{CalibrationError, Result};
use crate::models::Scenario;
use crate::runtime::CpuSampler;
use crate::trial::TrialTarget;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;
use tracing::{info, warn};
use url::Url;

/// Endpoint that takes a fixed `queries` parameter
pub const QUERIES_ENDPOINT: &str = "queries";

/// Value of the `queries` parameter
pub const QUERIES_PER_REQUEST: u32 = 10;

/// Endpoints calibrated when none are configured
pub const DEFAULT_ENDPOINTS: &[&str] = &["json", "db", "updates", "queries"];

/// Language filter value that keeps every language
pub const ALL_LANGUAGES: &str = "all";

/// Languages and the configuration variants deployed for each
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationTable {
    entries: BTreeMap<String, Vec<String>>,
}

impl ConfigurationTable {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// The uninstrumented / OpenTelemetry / Elastic APM variants per language
    pub fn standard() -> Self {
        Self::new()
            .with_language("python", &["flask-standard", "flask-otel", "flask-elastic"])
            .with_language("go", &["standard", "otel", "elastic"])
            .with_language("java", &["spring-standard", "spring-otel", "spring-elastic"])
    }

    pub fn with_language(mut self, language: &str, configurations: &[&str]) -> Self {
        self.entries.insert(
            language.to_string(),
            configurations.iter().map(|c| c.to_string()).collect(),
        );
        self
    }

    /// Keep a single language, or everything for `all`
    ///
    /// An unknown language yields an empty table.
    pub fn filter_language(&self, language: &str) -> Self {
        if language == ALL_LANGUAGES {
            return self.clone();
        }
        match self.entries.get(language) {
            Some(configurations) => Self {
                entries: BTreeMap::from([(language.to_string(), configurations.clone())]),
            },
            None => {
                warn!(language = %language, "Language not found in the configuration table");
                Self::new()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn languages(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(language, configs)| (language.as_str(), configs.as_slice()))
    }

    /// Hostnames of every non-excluded variant
    pub fn expected_hostnames(&self, excluded: &[String]) -> Vec<String> {
        self.entries
            .iter()
            .flat_map(|(language, configs)| {
                configs
                    .iter()
                    .filter(|config| !excluded.contains(config))
                    .map(move |config| format!("{}-{}", language, config))
            })
            .collect()
    }
}

impl Default for ConfigurationTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Split `{language}-{configuration}` at the first dash
pub fn split_hostname(hostname: &str) -> Option<(&str, &str)> {
    match hostname.split_once('-') {
        Some((language, configuration)) if !language.is_empty() && !configuration.is_empty() => {
            Some((language, configuration))
        }
        _ => None,
    }
}

/// Build scenarios for every running container that matches the table
pub async fn discover_scenarios(
    sampler: &CpuSampler,
    table: &ConfigurationTable,
    endpoints: &[String],
    excluded: &[String],
    port: u16,
) -> Result<Vec<Scenario>> {
    let expected = table.expected_hostnames(excluded);
    let running = sampler.list_running().await?;

    let mut scenarios = Vec::new();
    for container in running {
        if !expected.contains(&container.hostname) {
            continue;
        }
        let Some((language, configuration)) = split_hostname(&container.hostname) else {
            continue;
        };

        for endpoint in endpoints {
            scenarios.push(
                Scenario::builder()
                    .language(language)
                    .configuration(configuration)
                    .endpoint(endpoint)
                    .container_id(&container.id)
                    .host(&container.hostname)
                    .port(port)
                    .build()?,
            );
        }
    }

    info!(
        expected = expected.len(),
        scenarios = scenarios.len(),
        "Discovered calibration scenarios"
    );
    Ok(scenarios)
}

/// Shuffle so scenario order does not bias results
pub fn shuffle_scenarios(scenarios: &mut [Scenario], seed: Option<u64>) {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    scenarios.shuffle(&mut rng);
}

/// `http://{host}:{port}/{endpoint}`, plus `?queries=10` for the queries endpoint
pub fn target_url(scenario: &Scenario) -> Result<String> {
    let raw = format!(
        "http://{}:{}/{}",
        scenario.host, scenario.port, scenario.endpoint
    );
    let mut url =
        Url::parse(&raw).map_err(|e| CalibrationError::InvalidTarget(format!("{raw}: {e}")))?;
    if scenario.endpoint == QUERIES_ENDPOINT {
        url.query_pairs_mut()
            .append_pair("queries", &QUERIES_PER_REQUEST.to_string());
    }
    Ok(url.to_string())
}

pub fn trial_target(scenario: &Scenario) -> Result<TrialTarget> {
    Ok(TrialTarget {
        url: target_url(scenario)?,
        container_id: scenario.container_id.clone(),
    })
}

/// Starting load and step size for a scenario
///
/// Database-heavy endpoints saturate at far lower rates than JSON
/// serialization, so they start lower and step finer; python services get
/// the smallest steps.
pub fn load_ramp_for(scenario: &Scenario, defaults: &LoadRamp) -> Result<LoadRamp> {
    let is_python = scenario.language == "python";
    let step = match scenario.endpoint.as_str() {
        "updates" | "queries" if is_python => Some(25),
        "updates" | "queries" => Some(50),
        "json" if !is_python => Some(200),
        _ => None,
    };

    match step {
        Some(step) => LoadRamp::new(step, defaults.max.max(step), step),
        None => Ok(*defaults),
    }
}
