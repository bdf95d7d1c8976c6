//! Container runtime access
//!
//! The calibrator needs two things from the runtime: a CPU accounting
//! snapshot for one container, and the list of running containers with their
//! hostnames for scenario discovery. Both sit behind [`ContainerRuntime`] so
//! the sampler and discovery can be exercised without a Docker daemon.

mod docker;

pub use docker::DockerRuntime;

use crate::error::{CalibrationError, Result};
use crate::models::{CpuSnapshot, RunningContainer};
use crate::observability::CalibratorMetrics;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

pub use async_trait::async_trait;

/// Default deadline for a single runtime query
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Trait for container runtime clients
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Fetch current and previous-period CPU counters for a container
    async fn cpu_snapshot(&self, container_id: &str) -> Result<CpuSnapshot>;

    /// List all running containers
    async fn list_running(&self) -> Result<Vec<RunningContainer>>;
}

/// Takes instantaneous CPU utilization readings for containers
///
/// Failures are never retried; a failed query fails the trial.
#[derive(Clone)]
pub struct CpuSampler {
    runtime: Arc<dyn ContainerRuntime>,
    query_timeout: Duration,
    metrics: CalibratorMetrics,
}

impl CpuSampler {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            runtime,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            metrics: CalibratorMetrics::new(),
        }
    }

    pub fn with_query_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    /// Utilization percentage for the container right now
    pub async fn sample(&self, container_id: &str) -> Result<f64> {
        let start = Instant::now();
        let snapshot = tokio::time::timeout(
            self.query_timeout,
            self.runtime.cpu_snapshot(container_id),
        )
        .await
        .map_err(|_| CalibrationError::Timeout {
            operation: "cpu stats query",
            timeout: self.query_timeout,
        })??;

        self.metrics
            .observe_sample_latency(start.elapsed().as_secs_f64());

        let utilization = snapshot.utilization();
        debug!(
            container_id = %container_id,
            online_cpus = snapshot.online_cpus,
            utilization = utilization,
            "Sampled container CPU"
        );
        Ok(utilization)
    }

    /// Running containers, bounded by the same deadline as samples
    pub async fn list_running(&self) -> Result<Vec<RunningContainer>> {
        tokio::time::timeout(self.query_timeout, self.runtime.list_running())
            .await
            .map_err(|_| CalibrationError::Timeout {
                operation: "container listing",
                timeout: self.query_timeout,
            })?
    }

    pub fn runtime(&self) -> &Arc<dyn ContainerRuntime> {
        &self.runtime
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// In-memory runtime returning scripted snapshots per container
    #[derive(Default)]
    pub struct MockRuntime {
        snapshots: Mutex<HashMap<String, VecDeque<CpuSnapshot>>>,
        containers: Vec<RunningContainer>,
        pub delay: Option<Duration>,
    }

    impl MockRuntime {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_container(mut self, id: &str, hostname: &str) -> Self {
            self.containers.push(RunningContainer {
                id: id.to_string(),
                hostname: hostname.to_string(),
            });
            self
        }

        /// Queue snapshots that yield the given utilizations on a 1-cpu host
        pub fn with_utilizations(self, id: &str, values: &[f64]) -> Self {
            {
                let mut snapshots = self.snapshots.lock().unwrap();
                let queue = snapshots.entry(id.to_string()).or_default();
                for value in values {
                    queue.push_back(CpuSnapshot {
                        container_usage: (value * 1_000.0).round() as u64,
                        precpu_container_usage: 0,
                        system_usage: 100_000,
                        precpu_system_usage: 0,
                        online_cpus: 1,
                    });
                }
            }
            self
        }
    }

    #[async_trait]
    impl ContainerRuntime for MockRuntime {
        async fn cpu_snapshot(&self, container_id: &str) -> Result<CpuSnapshot> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let mut snapshots = self.snapshots.lock().unwrap();
            let queue = snapshots
                .get_mut(container_id)
                .ok_or_else(|| CalibrationError::ContainerNotFound(container_id.to_string()))?;
            Ok(queue.pop_front().unwrap_or_default())
        }

        async fn list_running(&self) -> Result<Vec<RunningContainer>> {
            Ok(self.containers.clone())
        }
    }
}
