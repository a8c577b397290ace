//! CLI command implementations

pub mod health;
pub mod rollout;
pub mod usage;
