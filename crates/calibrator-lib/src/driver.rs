//! Sequential calibration driver
//!
//! Runs the calibration loop for each scenario in turn. Scenarios never
//! overlap since they share the host's CPU. A scenario that fails is logged
//! and skipped; result-file errors and shutdown end the run.

use crate::calibration::{calibrate, LoadRamp};
use crate::error::{CalibrationError, Result};
use crate::models::{Scenario, ScenarioRecord};
use crate::observability::{CalibratorMetrics, StructuredLogger};
use crate::results::{ProgressLog, RecordSink};
use crate::scenario::{load_ramp_for, trial_target};
use crate::shutdown::Shutdown;
use crate::trial::TrialRunner;
use std::sync::Arc;
use tracing::info;

/// Fresh identifier attached to every row of a run
pub fn new_run_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Outcome of a full run
#[derive(Debug, Default)]
pub struct RunSummary {
    pub records: Vec<ScenarioRecord>,
    /// Scenarios that errored, with the error message
    pub failures: Vec<(Scenario, String)>,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn calibrated(&self) -> usize {
        self.records.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

pub struct CalibrationDriver<R> {
    runner: R,
    defaults: LoadRamp,
    shutdown: Shutdown,
    logger: StructuredLogger,
    metrics: CalibratorMetrics,
    progress: Option<Arc<ProgressLog>>,
}

impl<R: TrialRunner> CalibrationDriver<R> {
    pub fn new(
        runner: R,
        defaults: LoadRamp,
        shutdown: Shutdown,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            runner,
            defaults,
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

    fn progress(&self, message: impl std::fmt::Display) -> Result<()> {
        match &self.progress {
            Some(log) => log.line(message),
            None => Ok(()),
        }
    }

    async fn calibrate_scenario(&self, scenario: &Scenario) -> Result<ScenarioRecord> {
        let target = trial_target(scenario)?;
        let ramp = load_ramp_for(scenario, &self.defaults)?;
        let result = calibrate(&self.runner, &target, &ramp, &self.shutdown).await?;

        Ok(ScenarioRecord {
            run_id: self.logger.run_id().to_string(),
            scenario: scenario.clone(),
            result,
        })
    }

    /// Calibrate every scenario, appending each result as soon as it is known
    pub async fn run(
        &self,
        scenarios: &[Scenario],
        sink: &mut dyn RecordSink,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        for scenario in scenarios {
            self.progress(format_args!("{:?}", scenario))?;
        }

        for (index, scenario) in scenarios.iter().enumerate() {
            if self.shutdown.is_triggered() {
                summary.cancelled = true;
                break;
            }

            info!(
                index = index + 1,
                total = scenarios.len(),
                host = %scenario.host,
                endpoint = %scenario.endpoint,
                "Calibrating scenario"
            );
            self.progress(format_args!("=====Running scenario {:?}=====", scenario))?;

            match self.calibrate_scenario(scenario).await {
                Ok(record) => {
                    let result = &record.result;
                    if result.reached_target {
                        self.progress(format_args!(
                            "Reached target CPU utilization with {} RPS\n",
                            result.final_load
                        ))?;
                    } else {
                        self.progress(format_args!(
                            "Did not reach target CPU Utilization for port {} \
                             and endpoint {} and container_id {}\n",
                            scenario.port, scenario.endpoint, scenario.container_id
                        ))?;
                    }
                    self.logger.log_scenario_calibrated(
                        &scenario.host,
                        &scenario.endpoint,
                        result.reached_target,
                        result.final_load,
                        result.avg_cpu_usage,
                    );
                    self.metrics.record_scenario(
                        &scenario.language,
                        &scenario.configuration,
                        &scenario.endpoint,
                        result.target_load(),
                    );

                    sink.append(&record)?;
                    summary.records.push(record);
                }
                Err(CalibrationError::Cancelled) => {
                    self.progress("Calibration cancelled")?;
                    summary.cancelled = true;
                    break;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    let message = e.to_string();
                    self.logger
                        .log_scenario_failed(&scenario.host, &scenario.endpoint, &message);
                    self.metrics.inc_scenarios_failed();
                    self.progress(format_args!(
                        "Scenario {} {} failed: {}\n",
                        scenario.host, scenario.endpoint, message
                    ))?;
                    summary.failures.push((scenario.clone(), message));
                }
            }
        }

        self.progress("\n\n=====FINAL RESULTS=====\n\n")?;
        for record in &summary.records {
            self.progress(format_args!(
                "{:?} targetRPS={} avgCPUUsage={}",
                record.scenario,
                record.result.target_load(),
                record.result.avg_cpu_usage
            ))?;
        }

        self.logger
            .log_run_finished(summary.calibrated(), summary.failed(), summary.cancelled);
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::stub::ScriptedRunner;
    use crate::results::{read_results, ResultsSink};
    use crate::shutdown;
    use tempfile::TempDir;

    #[derive(Default)]
    struct MemorySink {
        records: Vec<ScenarioRecord>,
        fail: bool,
    }

    impl RecordSink for MemorySink {
        fn append(&mut self, record: &ScenarioRecord) -> Result<()> {
            if self.fail {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full").into());
            }
            self.records.push(record.clone());
            Ok(())
        }
    }

    fn scenario(container_id: &str, endpoint: &str) -> Scenario {
        Scenario::builder()
            .language("python")
            .configuration("flask-otel")
            .endpoint(endpoint)
            .container_id(container_id)
            .build()
            .unwrap()
    }

    fn driver(runner: ScriptedRunner) -> CalibrationDriver<ScriptedRunner> {
        CalibrationDriver::new(
            runner,
            LoadRamp::new(100, 500, 100).unwrap(),
            Shutdown::never(),
            StructuredLogger::new("run-42"),
        )
    }

    #[test]
    fn test_run_ids_are_unique() {
        let id = new_run_id();
        assert_eq!(id.len(), 36);
        assert_ne!(id, new_run_id());
    }

    #[tokio::test]
    async fn test_failed_scenario_does_not_stop_others() {
        let runner = ScriptedRunner::default()
            .with(300, true, 80.0)
            .failing_for("c2");
        let scenarios = vec![
            scenario("c1", "db"),
            scenario("c2", "db"),
            scenario("c3", "db"),
            scenario("c4", "db"),
        ];

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results.csv");
        let mut sink = ResultsSink::open([&path]).unwrap();

        let summary = driver(runner).run(&scenarios, &mut sink).await.unwrap();

        assert_eq!(summary.calibrated(), 3);
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.failures[0].0.container_id, "c2");
        assert!(!summary.cancelled);

        let rows = read_results(&path).unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.container_id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c3", "c4"]);
        assert!(rows.iter().all(|r| r.target_rps == 300 && r.run_id == "run-42"));
    }

    #[tokio::test]
    async fn test_records_use_per_endpoint_ramp() {
        // python queries ramps 25, 50, 75, ...
        let runner = ScriptedRunner::default().with(75, true, 79.0);
        let mut sink = MemorySink::default();

        let summary = driver(runner)
            .run(&[scenario("c1", "queries")], &mut sink)
            .await
            .unwrap();

        assert_eq!(sink.records.len(), 1);
        assert_eq!(summary.records[0].result.probed_loads, vec![25, 50, 75]);
        assert_eq!(summary.records[0].result.final_load, 75);
    }

    #[tokio::test]
    async fn test_sink_failure_is_fatal() {
        let runner = ScriptedRunner::default().with(100, true, 90.0);
        let mut sink = MemorySink {
            fail: true,
            ..Default::default()
        };

        let err = driver(runner)
            .run(&[scenario("c1", "db"), scenario("c2", "db")], &mut sink)
            .await
            .unwrap_err();

        assert!(matches!(err, CalibrationError::Io(_)));
    }

    #[tokio::test]
    async fn test_shutdown_stops_run() {
        let runner = ScriptedRunner::default();
        let (trigger, shutdown) = shutdown::channel();
        trigger.trigger();
        let driver = CalibrationDriver::new(
            runner,
            LoadRamp::new(100, 500, 100).unwrap(),
            shutdown,
            StructuredLogger::new("run-1"),
        );
        let mut sink = MemorySink::default();

        let summary = driver
            .run(&[scenario("c1", "db"), scenario("c2", "db")], &mut sink)
            .await
            .unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.calibrated(), 0);
        assert!(sink.records.is_empty());
    }

    #[tokio::test]
    async fn test_progress_log_summarises_run() {
        let runner = ScriptedRunner::default().with(200, true, 77.0);
        let dir = TempDir::new().unwrap();
        let progress = Arc::new(ProgressLog::create(dir.path().join("log.txt")).unwrap());
        let mut sink = MemorySink::default();

        driver(runner)
            .with_progress_log(progress.clone())
            .run(&[scenario("c1", "db")], &mut sink)
            .await
            .unwrap();

        let log = std::fs::read_to_string(progress.path()).unwrap();
        assert!(log.contains("=====Running scenario"));
        assert!(log.contains("Reached target CPU utilization with 200 RPS"));
        assert!(log.contains("=====FINAL RESULTS====="));
        assert!(log.contains("targetRPS=200"));
    }
}
