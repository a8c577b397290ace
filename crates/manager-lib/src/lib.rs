//! Core library for the KDM container and cluster manager
//!
//! This crate provides:
//! - Usage percentage derivation from container counter snapshots
//! - Deployment revision history and rollback target selection
//! - Docker and Kubernetes client seams feeding that logic
//! - Health checks and observability

pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod rollout;
pub mod source;
pub mod usage;

pub use error::{ErrorKind, ManagerError, RevisionError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ManagerMetrics, StructuredLogger};
pub use rollout::{build_history, select_rollback_target};
pub use usage::compute_usage;
