//! Resource usage derivation
//!
//! Converts two successive counter snapshots of a running unit into
//! utilization percentages. Degenerate counters never fail the
//! computation: they degrade to 0.0 so dashboards keep rendering.

mod docker;

pub use docker::{
    BlkioEntry, BlkioStats, CpuStats, CpuUsage, DockerStats, MemoryStats, NetworkStats,
};

use crate::models::{ResourceSnapshot, UsageReport};
use tracing::warn;

/// Compute utilization between two snapshots
///
/// Percentages are rounded to two decimals, half-up. Network and block I/O
/// counters are cumulative and copied from `current` unchanged.
pub fn compute_usage(previous: &ResourceSnapshot, current: &ResourceSnapshot) -> UsageReport {
    let counter_reset = current.cpu_total_usage < previous.cpu_total_usage
        || current.cpu_system_usage < previous.cpu_system_usage;

    if counter_reset {
        warn!(
            previous_total = previous.cpu_total_usage,
            current_total = current.cpu_total_usage,
            previous_system = previous.cpu_system_usage,
            current_system = current.cpu_system_usage,
            "CPU counter went backwards, reporting 0% for this sample"
        );
    }

    let cpu_delta = current.cpu_total_usage.saturating_sub(previous.cpu_total_usage);
    let system_delta = current.cpu_system_usage.saturating_sub(previous.cpu_system_usage);

    let cpu_percent = if system_delta > 0 {
        (cpu_delta as f64 / system_delta as f64) * current.cpu_core_count as f64 * 100.0
    } else {
        0.0
    };

    let memory_percent = if current.memory_limit > 0 {
        current.memory_usage as f64 / current.memory_limit as f64 * 100.0
    } else {
        0.0
    };

    UsageReport {
        cpu_percent: round2(cpu_percent),
        memory_usage: current.memory_usage,
        memory_limit: current.memory_limit,
        memory_percent: round2(memory_percent),
        network_rx: current.network_rx_bytes,
        network_tx: current.network_tx_bytes,
        block_read: current.block_read_bytes,
        block_write: current.block_write_bytes,
        counter_reset,
    }
}

/// Round to two decimal places, ties away from zero
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
