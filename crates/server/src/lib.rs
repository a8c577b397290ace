//! Management server: configuration and HTTP API
//!
//! The binary in `main.rs` wires these together with the Docker and
//! Kubernetes backends.

pub mod api;
pub mod config;
