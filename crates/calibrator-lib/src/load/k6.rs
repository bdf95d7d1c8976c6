//! k6 load generator
//!
//! Runs `k6 run` against a constant-arrival-rate script. The script reads
//! its parameters from `-e` environment flags (RPS, DURATION, TIMEUNIT, URL).

use super::{LoadGenerator, LoadHandle, LoadRequest};
use crate::error::{CalibrationError, Result};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

pub struct K6LoadGenerator {
    binary: PathBuf,
    script: PathBuf,
}

impl K6LoadGenerator {
    pub fn new(binary: impl Into<PathBuf>, script: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            script: script.into(),
        }
    }

    /// Build the k6 invocation for a request
    pub fn command(&self, request: &LoadRequest) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg("run")
            .arg("--vus")
            .arg(request.load.to_string())
            .arg("-e")
            .arg(format!("RPS={}", request.load))
            .arg("-e")
            .arg(format!("DURATION={}", request.duration.as_secs()))
            .arg("-e")
            .arg(format!("TIMEUNIT={}", request.time_unit))
            .arg("-e")
            .arg(format!("URL={}", request.url))
            .arg(&self.script)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        command
    }
}

impl LoadGenerator for K6LoadGenerator {
    fn start(&self, request: &LoadRequest) -> Result<LoadHandle> {
        debug!(
            binary = %self.binary.display(),
            load = request.load,
            url = %request.url,
            "Spawning k6"
        );
        let child = self
            .command(request)
            .spawn()
            .map_err(CalibrationError::LoadGenerator)?;
        Ok(LoadHandle::from_child(child))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;
    use std::time::Duration;

    fn request() -> LoadRequest {
        LoadRequest {
            url: "http://go-otel:8080/queries?queries=10".to_string(),
            load: 300,
            duration: Duration::from_secs(60),
            time_unit: "1s".to_string(),
        }
    }

    #[test]
    fn test_command_arguments() {
        let generator = K6LoadGenerator::new("k6", "script.js");
        let command = generator.command(&request());
        let args: Vec<&OsStr> = command.as_std().get_args().collect();

        assert_eq!(command.as_std().get_program(), OsStr::new("k6"));
        assert_eq!(
            args,
            [
                "run",
                "--vus",
                "300",
                "-e",
                "RPS=300",
                "-e",
                "DURATION=60",
                "-e",
                "TIMEUNIT=1s",
                "-e",
                "URL=http://go-otel:8080/queries?queries=10",
                "script.js",
            ]
            .iter()
            .map(OsStr::new)
            .collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_load_generator_error() {
        let generator = K6LoadGenerator::new("/nonexistent/k6-binary", "script.js");
        let err = generator.start(&request()).unwrap_err();
        assert!(matches!(err, CalibrationError::LoadGenerator(_)));
    }
}
