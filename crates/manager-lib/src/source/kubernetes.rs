//! Deployment history and rollback over the Kubernetes API

use super::DeploymentSource;
use crate::error::ManagerError;
use crate::models::{RevisionRecord, RollbackOutcome};
use crate::rollout::{history_for, plan_rollback};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use kube::api::{Api, ListParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::path::Path;
use tracing::info;

/// Build a client from an explicit kubeconfig, or infer one from the
/// environment (in-cluster service account or `~/.kube/config`)
pub async fn connect_kube(
    kubeconfig: Option<&Path>,
    context: Option<&str>,
) -> Result<Client, ManagerError> {
    let options = KubeConfigOptions {
        context: context.map(str::to_string),
        ..Default::default()
    };

    let config = match (kubeconfig, context) {
        (Some(path), _) => {
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                ManagerError::connection(format!("failed to read {}: {}", path.display(), e))
            })?;
            Config::from_custom_kubeconfig(kubeconfig, &options)
                .await
                .map_err(|e| ManagerError::connection(e.to_string()))?
        }
        (None, Some(_)) => Config::from_kubeconfig(&options)
            .await
            .map_err(|e| ManagerError::connection(e.to_string()))?,
        (None, None) => Config::infer()
            .await
            .map_err(|e| ManagerError::connection(e.to_string()))?,
    };

    Ok(Client::try_from(config)?)
}

/// Deployment operations backed by a kube client
#[derive(Clone)]
pub struct KubeDeploymentSource {
    client: Client,
}

impl KubeDeploymentSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Check that the API server answers, returning its version
    pub async fn ping(&self) -> Result<String, ManagerError> {
        let info = self.client.apiserver_version().await?;
        Ok(info.git_version)
    }

    fn deployments(&self, namespace: &str) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), namespace)
    }

    /// Replica sets matching the deployment's selector; ownership is
    /// checked later by the rollout logic
    async fn replica_sets(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<Vec<ReplicaSet>, ManagerError> {
        let selector = deployment
            .spec
            .as_ref()
            .and_then(|spec| spec.selector.match_labels.as_ref())
            .map(|labels| {
                labels
                    .iter()
                    .map(|(key, value)| format!("{}={}", key, value))
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .unwrap_or_default();

        let api: Api<ReplicaSet> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&ListParams::default().labels(&selector)).await?;
        Ok(list.items)
    }
}

#[async_trait]
impl DeploymentSource for KubeDeploymentSource {
    async fn history(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Vec<RevisionRecord>, ManagerError> {
        let deployment = self.deployments(namespace).get(name).await?;
        let replica_sets = self.replica_sets(namespace, &deployment).await?;
        Ok(history_for(&deployment, &replica_sets))
    }

    async fn rollback(
        &self,
        namespace: &str,
        name: &str,
        revision: Option<u64>,
    ) -> Result<RollbackOutcome, ManagerError> {
        let api = self.deployments(namespace);
        let deployment = api.get(name).await?;
        let replica_sets = self.replica_sets(namespace, &deployment).await?;
        let plan = plan_rollback(&deployment, &replica_sets, revision)?;
        let target = plan.target().clone();

        // replace() carries the resourceVersion we read, so a concurrent
        // edit surfaces as a 409 instead of being overwritten
        let applied = match plan.apply_to(&deployment) {
            Some(updated) => {
                api.replace(name, &PostParams::default(), &updated).await?;
                true
            }
            None => false,
        };

        info!(
            deployment = %name,
            namespace = %namespace,
            revision = target.revision_number,
            applied = applied,
            "Deployment rollback handled"
        );

        Ok(RollbackOutcome {
            deployment: name.to_string(),
            namespace: namespace.to_string(),
            revision: target.revision_number,
            image: target.container_image_reference,
            applied,
        })
    }
}
