//! Load generation
//!
//! A trial starts the load generator and keeps the returned [`LoadHandle`]
//! until sampling is done. The process exit status is reported but never
//! feeds into the trial decision.

mod k6;

pub use k6::K6LoadGenerator;

use crate::error::Result;
use std::time::Duration;
use tokio::process::Child;
use tracing::{debug, warn};

/// Parameters of one load-generation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub url: String,
    /// Used both as the virtual-user count and the target rate
    pub load: u32,
    pub duration: Duration,
    /// Rate time unit passed through to the generator, e.g. `1s`
    pub time_unit: String,
}

/// Anything that can drive HTTP load against a URL
pub trait LoadGenerator: Send + Sync {
    /// Start generating load; must not wait for the run to finish
    fn start(&self, request: &LoadRequest) -> Result<LoadHandle>;
}

/// How a load-generation run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadExit {
    /// No process was attached to the handle
    Detached,
    Exited(Option<i32>),
    /// Still running past its deadline and killed
    Killed,
    Failed(String),
}

/// Handle to a running load generator process
///
/// Dropping the handle kills the process.
#[derive(Debug)]
pub struct LoadHandle {
    child: Option<Child>,
}

impl LoadHandle {
    pub fn from_child(child: Child) -> Self {
        Self { child: Some(child) }
    }

    /// A handle with nothing behind it
    pub fn detached() -> Self {
        Self { child: None }
    }

    pub fn is_detached(&self) -> bool {
        self.child.is_none()
    }

    /// Wait up to `wait` for the process to exit, then kill it
    pub async fn finish(mut self, wait: Duration) -> LoadExit {
        let Some(mut child) = self.child.take() else {
            return LoadExit::Detached;
        };

        match tokio::time::timeout(wait, child.wait()).await {
            Ok(Ok(status)) => {
                debug!(code = ?status.code(), "Load generator exited");
                LoadExit::Exited(status.code())
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to wait for load generator");
                LoadExit::Failed(e.to_string())
            }
            Err(_) => {
                warn!(wait_secs = wait.as_secs(), "Load generator overran its window, killing");
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "Failed to kill load generator");
                }
                LoadExit::Killed
            }
        }
    }

    /// Kill the process immediately
    pub async fn cancel(mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Failed to kill load generator");
            }
        }
    }
}
