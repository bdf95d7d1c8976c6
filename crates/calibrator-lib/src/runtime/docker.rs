//! Docker Engine API client
//!
//! Reads the same numbers `docker stats` uses: `cpu_stats` and
//! `precpu_stats` from a single non-streaming stats request.

use super::ContainerRuntime;
use crate::error::{CalibrationError, Result};
use crate::models::{CpuSnapshot, RunningContainer};
use async_trait::async_trait;
use bollard::container::{
    CPUStats, InspectContainerOptions, ListContainersOptions, Stats, StatsOptions,
};
use bollard::Docker;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

/// Container runtime backed by the local Docker daemon
///
/// Construct once and share; the underlying client is connection-pooled.
#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect using `DOCKER_HOST` or the platform's default socket
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| CalibrationError::Runtime(e.to_string()))?;
        Ok(Self { docker })
    }

    pub fn from_client(docker: Docker) -> Self {
        Self { docker }
    }

    /// Online CPUs, falling back to the per-cpu usage vector length
    fn online_cpus(stats: &CPUStats) -> u32 {
        stats
            .online_cpus
            .or_else(|| {
                stats
                    .cpu_usage
                    .percpu_usage
                    .as_ref()
                    .map(|per_cpu| per_cpu.len() as u64)
            })
            .unwrap_or(1) as u32
    }

    fn snapshot_from_stats(stats: &Stats) -> CpuSnapshot {
        Self::snapshot_from_cpu(&stats.cpu_stats, &stats.precpu_stats)
    }

    fn snapshot_from_cpu(cpu: &CPUStats, precpu: &CPUStats) -> CpuSnapshot {
        CpuSnapshot {
            container_usage: cpu.cpu_usage.total_usage,
            precpu_container_usage: precpu.cpu_usage.total_usage,
            system_usage: cpu.system_cpu_usage.unwrap_or(0),
            precpu_system_usage: precpu.system_cpu_usage.unwrap_or(0),
            online_cpus: Self::online_cpus(cpu),
        }
    }
}

/// Map a Docker error to the calibrator taxonomy
fn map_docker_error(container_id: &str, err: bollard::errors::Error) -> CalibrationError {
    match err {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        } => CalibrationError::ContainerNotFound(container_id.to_string()),
        other => CalibrationError::Runtime(other.to_string()),
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn cpu_snapshot(&self, container_id: &str) -> Result<CpuSnapshot> {
        let options = StatsOptions {
            stream: false,
            one_shot: false,
        };
        let stream = self.docker.stats(container_id, Some(options));
        tokio::pin!(stream);

        match stream.next().await {
            Some(Ok(stats)) => Ok(Self::snapshot_from_stats(&stats)),
            Some(Err(e)) => Err(map_docker_error(container_id, e)),
            None => Err(CalibrationError::Runtime(format!(
                "no stats returned for container {}",
                container_id
            ))),
        }
    }

    async fn list_running(&self) -> Result<Vec<RunningContainer>> {
        let options = ListContainersOptions::<String> {
            all: false,
            ..Default::default()
        };
        let summaries = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| CalibrationError::Runtime(e.to_string()))?;

        let mut containers = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let Some(id) = summary.id else {
                continue;
            };

            // The summary does not carry the configured hostname
            let inspect = match self
                .docker
                .inspect_container(&id, None::<InspectContainerOptions>)
                .await
            {
                Ok(inspect) => inspect,
                Err(e) => {
                    // Containers can disappear between list and inspect
                    warn!(container_id = %id, error = %e, "Failed to inspect container");
                    continue;
                }
            };

            if let Some(hostname) = inspect.config.and_then(|config| config.hostname) {
                debug!(container_id = %id, hostname = %hostname, "Found running container");
                containers.push(RunningContainer { id, hostname });
            }
        }

        Ok(containers)
    }
}
