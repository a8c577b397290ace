//! Platform client seams
//!
//! The HTTP layer only sees these traits. Implementations fetch raw data
//! from the container engine or the cluster and hand it to the pure
//! `usage` and `rollout` logic.

mod docker_engine;
mod kubernetes;

pub use docker_engine::DockerStatsSource;
pub use kubernetes::{connect_kube, KubeDeploymentSource};

use crate::error::ManagerError;
use crate::models::{ResourceSnapshot, RevisionRecord, RollbackOutcome};

pub use async_trait::async_trait;

/// Source of container resource counters
#[async_trait]
pub trait ContainerStatsSource: Send + Sync {
    /// Read a `(previous, current)` snapshot pair for one container
    async fn usage_snapshots(
        &self,
        container_id: &str,
    ) -> Result<(ResourceSnapshot, ResourceSnapshot), ManagerError>;
}

/// Source of deployment revision history
#[async_trait]
pub trait DeploymentSource: Send + Sync {
    /// Revision history of a deployment, most recent first
    async fn history(&self, namespace: &str, name: &str)
        -> Result<Vec<RevisionRecord>, ManagerError>;

    /// Roll a deployment back to `revision`, or to the previous revision
    async fn rollback(
        &self,
        namespace: &str,
        name: &str,
        revision: Option<u64>,
    ) -> Result<RollbackOutcome, ManagerError>;
}
