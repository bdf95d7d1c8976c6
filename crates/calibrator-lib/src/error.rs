//! Error taxonomy for calibration runs

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while calibrating a scenario
///
/// Everything except the result-file errors and cancellation is scoped to a single scenario: the
/// driver logs it and moves on to the next one. Result-file failures abort
/// the whole run.
#[derive(Debug, Error)]
pub enum CalibrationError {
    /// The container does not exist or is not running
    #[error("container {0} not found")]
    ContainerNotFound(String),

    /// Any other failure reported by the container runtime
    #[error("container runtime error: {0}")]
    Runtime(String),

    /// A runtime query or subprocess exceeded its deadline
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    /// The run was asked to shut down
    #[error("calibration cancelled")]
    Cancelled,

    /// A trial finished without a single CPU sample
    #[error("trial produced no CPU samples")]
    NoSamples,

    #[error("invalid load ramp: {0}")]
    InvalidRamp(String),

    #[error("invalid target url: {0}")]
    InvalidTarget(String),

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("failed to start load generator: {0}")]
    LoadGenerator(#[source] std::io::Error),

    /// An existing results file was written with a different column layout
    #[error("results file {} has columns {found:?}, expected {expected:?}", path.display())]
    ResultsLayout {
        path: PathBuf,
        found: Vec<String>,
        expected: Vec<String>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl CalibrationError {
    /// Whether this error must abort the whole run instead of one scenario
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Csv(_) | Self::ResultsLayout { .. } | Self::Cancelled
        )
    }
}

pub type Result<T, E = CalibrationError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_errors_are_not_fatal() {
        assert!(!CalibrationError::ContainerNotFound("abc".into()).is_fatal());
        assert!(!CalibrationError::Runtime("boom".into()).is_fatal());
        assert!(!CalibrationError::NoSamples.is_fatal());
    }

    #[test]
    fn test_sink_errors_are_fatal() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        assert!(CalibrationError::from(io).is_fatal());
        assert!(CalibrationError::Cancelled.is_fatal());
        let layout = CalibrationError::ResultsLayout {
            path: PathBuf::from("results.csv"),
            found: vec!["language".into()],
            expected: vec!["run_id".into()],
        };
        assert!(layout.is_fatal());
    }

    #[test]
    fn test_timeout_message() {
        let err = CalibrationError::Timeout {
            operation: "cpu stats query",
            timeout: Duration::from_secs(30),
        };
        assert_eq!(err.to_string(), "cpu stats query timed out after 30s");
    }
}
