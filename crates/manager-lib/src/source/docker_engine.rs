//! Container stats over the Docker Engine API

use super::ContainerStatsSource;
use crate::error::ManagerError;
use crate::models::ResourceSnapshot;
use crate::usage::DockerStats;
use async_trait::async_trait;
use bollard::container::StatsOptions;
use bollard::Docker;
use futures_util::StreamExt;
use tracing::debug;

/// Reads container stats from a Docker daemon
#[derive(Clone)]
pub struct DockerStatsSource {
    docker: Docker,
}

impl DockerStatsSource {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// Connect to the daemon on a unix socket, or the platform default
    pub fn connect(socket: Option<&str>, timeout_secs: u64) -> Result<Self, ManagerError> {
        let docker = match socket {
            Some(path) => {
                Docker::connect_with_unix(path, timeout_secs, bollard::API_DEFAULT_VERSION)?
            }
            None => Docker::connect_with_local_defaults()?,
        };
        Ok(Self::new(docker))
    }

    /// Check that the daemon answers
    pub async fn ping(&self) -> Result<(), ManagerError> {
        self.docker.ping().await?;
        Ok(())
    }
}

#[async_trait]
impl ContainerStatsSource for DockerStatsSource {
    async fn usage_snapshots(
        &self,
        container_id: &str,
    ) -> Result<(ResourceSnapshot, ResourceSnapshot), ManagerError> {
        // one_shot must stay off or the engine leaves precpu_stats empty
        let options = StatsOptions {
            stream: false,
            one_shot: false,
        };

        let mut stream = Box::pin(self.docker.stats(container_id, Some(options)));
        let stats = stream
            .next()
            .await
            .ok_or_else(|| {
                ManagerError::connection(format!("no stats returned for {}", container_id))
            })??;

        // Re-read through the tolerant model so both entry points share
        // one interpretation of the document
        let value = serde_json::to_value(&stats)
            .map_err(|e| ManagerError::validation(format!("unreadable stats: {}", e)))?;
        let stats: DockerStats = serde_json::from_value(value)
            .map_err(|e| ManagerError::validation(format!("unreadable stats: {}", e)))?;

        debug!(container_id = %container_id, "Fetched container stats");
        Ok(stats.snapshots())
    }
}
