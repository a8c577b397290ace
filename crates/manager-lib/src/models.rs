//! Core data models for the manager

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time reading of the resource counters of one container or pod
///
/// CPU counters are cumulative nanoseconds. Missing fields deserialize to
/// zero and unknown fields are ignored, so partial runtime payloads still
/// produce a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceSnapshot {
    pub cpu_total_usage: u64,
    pub cpu_system_usage: u64,
    pub cpu_core_count: u32,
    pub memory_usage: u64,
    /// Zero means no limit configured
    pub memory_limit: u64,
    pub network_rx_bytes: u64,
    pub network_tx_bytes: u64,
    pub block_read_bytes: u64,
    pub block_write_bytes: u64,
}

/// Utilization derived from two snapshots
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsageReport {
    pub cpu_percent: f64,
    pub memory_usage: u64,
    pub memory_limit: u64,
    pub memory_percent: f64,
    pub network_rx: u64,
    pub network_tx: u64,
    pub block_read: u64,
    pub block_write: u64,
    /// A cumulative CPU counter went backwards between the two snapshots
    #[serde(default)]
    pub counter_reset: bool,
}

/// One historical version of a deployment's pod template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionRecord {
    pub revision_number: u64,
    #[serde(default)]
    pub change_cause: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub desired_replica_count: u32,
    #[serde(default)]
    pub ready_replica_count: u32,
    /// Empty when the template has no containers
    #[serde(default)]
    pub container_image_reference: String,
    /// Name of the replica set this record was read from
    #[serde(default)]
    pub source_name: String,
}

/// Result of a rollback request against a live deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackOutcome {
    pub deployment: String,
    pub namespace: String,
    pub revision: u64,
    pub image: String,
    /// False when the deployment already ran the selected template
    pub applied: bool,
}
