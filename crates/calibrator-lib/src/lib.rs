//! RPS calibration library
//!
//! Finds, for each containerized service and endpoint, the offered request
//! rate at which the service's container crosses a CPU utilization
//! threshold. This crate provides:
//! - Container CPU sampling through the Docker engine API
//! - Constant-arrival-rate load generation with k6
//! - Timed trials and the linear load-search loop
//! - Scenario discovery from running containers
//! - CSV result files, the progress log and report aggregations
//! - Structured logging and Prometheus metrics

pub mod calibration;
pub mod driver;
pub mod error;
pub mod load;
pub mod models;
pub mod observability;
pub mod report;
pub mod results;
pub mod runtime;
pub mod scenario;
pub mod shutdown;
pub mod trial;

pub use calibration::{calibrate, CalibrationState, LoadRamp};
pub use driver::{new_run_id, CalibrationDriver, RunSummary};
pub use error::{CalibrationError, Result};
pub use load::{K6LoadGenerator, LoadGenerator, LoadHandle, LoadRequest};
pub use models::*;
pub use observability::{CalibratorMetrics, StructuredLogger};
pub use results::{run_timestamp, ProgressLog, RecordSink, ResultRow, ResultsSink, RunFiles};
pub use runtime::{ContainerRuntime, CpuSampler, DockerRuntime};
pub use scenario::ConfigurationTable;
pub use trial::{DecisionRule, LoadTrialRunner, SamplingPlan, TrialConfig, TrialRunner, TrialTarget};
