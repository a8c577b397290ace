//! ReplicaSet to revision mapping and rollback planning
//!
//! A Deployment keeps one ReplicaSet per template it ever ran; the
//! `deployment.kubernetes.io/revision` annotation orders them. This module
//! turns those ReplicaSets into [`RevisionRecord`]s and computes the pod
//! template a rollback has to write back.

use super::{build_history, select_rollback_target};
use crate::error::ManagerError;
use crate::models::RevisionRecord;
use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use k8s_openapi::api::core::v1::PodTemplateSpec;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::warn;

pub const REVISION_ANNOTATION: &str = "deployment.kubernetes.io/revision";
pub const CHANGE_CAUSE_ANNOTATION: &str = "kubernetes.io/change-cause";
pub const POD_TEMPLATE_HASH_LABEL: &str = "pod-template-hash";

/// What a rollback has to do to the live deployment
#[derive(Debug, Clone, PartialEq)]
pub enum RollbackPlan {
    /// The deployment already runs the selected template
    AlreadyCurrent(RevisionRecord),
    /// Replace the deployment's pod template
    Apply {
        target: RevisionRecord,
        template: PodTemplateSpec,
    },
}

impl RollbackPlan {
    pub fn target(&self) -> &RevisionRecord {
        match self {
            RollbackPlan::AlreadyCurrent(target) => target,
            RollbackPlan::Apply { target, .. } => target,
        }
    }

    /// Apply the plan to a deployment read from the cluster
    ///
    /// Returns `None` when there is nothing to write. The change-cause of
    /// the restored revision is carried over so history stays readable.
    pub fn apply_to(&self, deployment: &Deployment) -> Option<Deployment> {
        let RollbackPlan::Apply { target, template } = self else {
            return None;
        };

        let mut updated = deployment.clone();
        if let Some(spec) = updated.spec.as_mut() {
            spec.template = template.clone();
        }

        let annotations = updated.metadata.annotations.get_or_insert_with(Default::default);
        if target.change_cause.is_empty() {
            annotations.remove(CHANGE_CAUSE_ANNOTATION);
        } else {
            annotations.insert(
                CHANGE_CAUSE_ANNOTATION.to_string(),
                target.change_cause.clone(),
            );
        }

        Some(updated)
    }
}

/// Revision number stored on an object, 0 when absent or unparsable
pub fn revision_of(meta: &ObjectMeta) -> u64 {
    let Some(raw) = meta
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(REVISION_ANNOTATION))
    else {
        return 0;
    };

    raw.trim().parse().unwrap_or_else(|_| {
        warn!(
            object = meta.name.as_deref().unwrap_or_default(),
            value = %raw,
            "Unparsable revision annotation, treating as revision 0"
        );
        0
    })
}

/// Whether the replica set is controlled by the deployment
pub fn owned_by(replica_set: &ReplicaSet, deployment: &Deployment) -> bool {
    let Some(uid) = deployment.metadata.uid.as_deref() else {
        return false;
    };

    replica_set
        .metadata
        .owner_references
        .iter()
        .flatten()
        .any(|owner| owner.controller.unwrap_or(false) && owner.uid == uid)
}

/// Build a revision record from a replica set
pub fn revision_record(replica_set: &ReplicaSet) -> RevisionRecord {
    let meta = &replica_set.metadata;
    let spec = replica_set.spec.as_ref();

    let change_cause = meta
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(CHANGE_CAUSE_ANNOTATION))
        .cloned()
        .unwrap_or_default();

    let container_image_reference = spec
        .and_then(|spec| spec.template.as_ref())
        .and_then(|template| template.spec.as_ref())
        .and_then(|pod| pod.containers.first())
        .and_then(|container| container.image.clone())
        .unwrap_or_default();

    RevisionRecord {
        revision_number: revision_of(meta),
        change_cause,
        created_at: meta.creation_timestamp.as_ref().map(|time| time.0),
        desired_replica_count: non_negative(spec.and_then(|spec| spec.replicas)),
        ready_replica_count: non_negative(
            replica_set
                .status
                .as_ref()
                .and_then(|status| status.ready_replicas),
        ),
        container_image_reference,
        source_name: meta.name.clone().unwrap_or_default(),
    }
}

/// Ordered revision history of a deployment
///
/// Replica sets not controlled by the deployment are ignored; label
/// selectors can overlap between deployments.
pub fn history_for(deployment: &Deployment, replica_sets: &[ReplicaSet]) -> Vec<RevisionRecord> {
    let records: Vec<_> = replica_sets
        .iter()
        .filter(|rs| owned_by(rs, deployment))
        .map(revision_record)
        .collect();

    build_history(&records)
}

/// Pod template of a replica set with the controller's hash label removed
pub fn rollback_template(replica_set: &ReplicaSet) -> Option<PodTemplateSpec> {
    let template = replica_set.spec.as_ref()?.template.clone()?;
    Some(without_hash_label(template))
}

/// Decide what a rollback to `target_revision` has to write
pub fn plan_rollback(
    deployment: &Deployment,
    replica_sets: &[ReplicaSet],
    target_revision: Option<u64>,
) -> Result<RollbackPlan, ManagerError> {
    let paused = deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.paused)
        .unwrap_or(false);
    if paused {
        return Err(ManagerError::validation(format!(
            "deployment {} is paused, resume it before rolling back",
            deployment.metadata.name.as_deref().unwrap_or_default()
        )));
    }

    let history = history_for(deployment, replica_sets);
    let target = select_rollback_target(&history, target_revision)?;

    let source = replica_sets
        .iter()
        .filter(|rs| owned_by(rs, deployment))
        .find(|rs| rs.metadata.name.as_deref() == Some(target.source_name.as_str()))
        .ok_or_else(|| {
            ManagerError::not_found(format!("replica set {} disappeared", target.source_name))
        })?;

    let template = rollback_template(source).ok_or_else(|| {
        ManagerError::validation(format!(
            "replica set {} has no pod template",
            target.source_name
        ))
    })?;

    let current = deployment
        .spec
        .as_ref()
        .map(|spec| without_hash_label(spec.template.clone()));

    if current.as_ref() == Some(&template) {
        return Ok(RollbackPlan::AlreadyCurrent(target));
    }

    Ok(RollbackPlan::Apply { target, template })
}

fn without_hash_label(mut template: PodTemplateSpec) -> PodTemplateSpec {
    if let Some(labels) = template
        .metadata
        .as_mut()
        .and_then(|meta| meta.labels.as_mut())
    {
        labels.remove(POD_TEMPLATE_HASH_LABEL);
    }
    template
}

fn non_negative(value: Option<i32>) -> u32 {
    value.unwrap_or(0).max(0) as u32
}
