//! Docker Engine stats document
//!
//! Tolerant model of the body returned by
//! `GET /containers/{id}/stats?stream=false`. The engine omits or nulls
//! whole sections depending on platform and cgroup version, so every field
//! is optional and unknown fields are ignored.

use crate::models::ResourceSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerStats {
    pub cpu_stats: Option<CpuStats>,
    pub precpu_stats: Option<CpuStats>,
    pub memory_stats: Option<MemoryStats>,
    pub networks: Option<HashMap<String, NetworkStats>>,
    pub blkio_stats: Option<BlkioStats>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuStats {
    pub cpu_usage: Option<CpuUsage>,
    pub system_cpu_usage: Option<u64>,
    pub online_cpus: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuUsage {
    pub total_usage: Option<u64>,
    pub percpu_usage: Option<Vec<u64>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryStats {
    pub usage: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkStats {
    pub rx_bytes: Option<u64>,
    pub tx_bytes: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BlkioStats {
    pub io_service_bytes_recursive: Option<Vec<BlkioEntry>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BlkioEntry {
    pub op: Option<String>,
    pub value: Option<u64>,
}

impl CpuStats {
    fn total_usage(&self) -> u64 {
        self.cpu_usage
            .as_ref()
            .and_then(|usage| usage.total_usage)
            .unwrap_or(0)
    }

    /// Online CPUs, falling back to the length of the per-CPU usage list
    /// which cgroup v2 hosts no longer report
    fn core_count(&self) -> u32 {
        match self.online_cpus {
            Some(count) if count > 0 => count,
            _ => self
                .cpu_usage
                .as_ref()
                .and_then(|usage| usage.percpu_usage.as_ref())
                .map(|percpu| percpu.len() as u32)
                .unwrap_or(0),
        }
    }
}

impl DockerStats {
    /// Parse a stats document from JSON
    pub fn from_json(content: &str) -> serde_json::Result<Self> {
        serde_json::from_str(content)
    }

    /// Split the document into `(previous, current)` snapshots
    ///
    /// `precpu_stats` is the engine's previous read, `cpu_stats` the current
    /// one. Memory and I/O only exist for the current read and are copied
    /// into both snapshots.
    pub fn snapshots(&self) -> (ResourceSnapshot, ResourceSnapshot) {
        let (network_rx_bytes, network_tx_bytes) = self.network_totals();
        let (block_read_bytes, block_write_bytes) = self.block_io_totals();
        let memory = self.memory_stats.clone().unwrap_or_default();

        let base = ResourceSnapshot {
            memory_usage: memory.usage.unwrap_or(0),
            memory_limit: memory.limit.unwrap_or(0),
            network_rx_bytes,
            network_tx_bytes,
            block_read_bytes,
            block_write_bytes,
            ..Default::default()
        };

        let previous = Self::with_cpu(base, self.precpu_stats.as_ref());
        let current = Self::with_cpu(base, self.cpu_stats.as_ref());

        (previous, current)
    }

    fn with_cpu(base: ResourceSnapshot, cpu: Option<&CpuStats>) -> ResourceSnapshot {
        match cpu {
            Some(cpu) => ResourceSnapshot {
                cpu_total_usage: cpu.total_usage(),
                cpu_system_usage: cpu.system_cpu_usage.unwrap_or(0),
                cpu_core_count: cpu.core_count(),
                ..base
            },
            None => base,
        }
    }

    /// Received and transmitted bytes summed over every interface
    fn network_totals(&self) -> (u64, u64) {
        self.networks
            .iter()
            .flat_map(|networks| networks.values())
            .fold((0u64, 0u64), |(rx, tx), net| {
                (
                    rx.saturating_add(net.rx_bytes.unwrap_or(0)),
                    tx.saturating_add(net.tx_bytes.unwrap_or(0)),
                )
            })
    }

    /// Bytes read and written summed over every block device
    fn block_io_totals(&self) -> (u64, u64) {
        let entries = self
            .blkio_stats
            .as_ref()
            .and_then(|blkio| blkio.io_service_bytes_recursive.as_deref())
            .unwrap_or_default();

        let mut read = 0u64;
        let mut write = 0u64;
        for entry in entries {
            let value = entry.value.unwrap_or(0);
            match entry.op.as_deref().map(str::to_ascii_lowercase).as_deref() {
                Some("read") => read = read.saturating_add(value),
                Some("write") => write = write.saturating_add(value),
                _ => {}
            }
        }

        (read, write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::compute_usage;

    const CGROUP_V1_STATS: &str = r#"{
        "read": "2024-05-01T10:00:01.000000000Z",
        "preread": "2024-05-01T10:00:00.000000000Z",
        "pids_stats": {"current": 3},
        "cpu_stats": {
            "cpu_usage": {
                "total_usage": 2000000,
                "percpu_usage": [1000000, 1000000],
                "usage_in_kernelmode": 0,
                "usage_in_usermode": 0
            },
            "system_cpu_usage": 20000000,
            "throttling_data": {"periods": 0, "throttled_periods": 0, "throttled_time": 0}
        },
        "precpu_stats": {
            "cpu_usage": {"total_usage": 1000000, "percpu_usage": [500000, 500000]},
            "system_cpu_usage": 10000000
        },
        "memory_stats": {"usage": 268435456, "limit": 1073741824, "stats": {"cache": 0}},
        "networks": {
            "eth0": {"rx_bytes": 1000, "tx_bytes": 2000, "rx_packets": 10},
            "eth1": {"rx_bytes": 500, "tx_bytes": 250}
        },
        "blkio_stats": {
            "io_service_bytes_recursive": [
                {"major": 8, "minor": 0, "op": "Read", "value": 4096},
                {"major": 8, "minor": 0, "op": "Write", "value": 8192},
                {"major": 8, "minor": 0, "op": "Sync", "value": 12288},
                {"major": 8, "minor": 16, "op": "Read", "value": 1024},
                {"major": 8, "minor": 0, "op": "Total", "value": 12288}
            ]
        }
    }"#;

    #[test]
    fn test_cgroup_v1_document() {
        let stats = DockerStats::from_json(CGROUP_V1_STATS).unwrap();
        let (previous, current) = stats.snapshots();

        assert_eq!(previous.cpu_total_usage, 1000000);
        assert_eq!(previous.cpu_system_usage, 10000000);
        assert_eq!(current.cpu_total_usage, 2000000);
        assert_eq!(current.cpu_system_usage, 20000000);
        // No online_cpus: falls back to percpu_usage length
        assert_eq!(current.cpu_core_count, 2);

        assert_eq!(current.memory_usage, 268435456);
        assert_eq!(current.memory_limit, 1073741824);
        assert_eq!(current.network_rx_bytes, 1500);
        assert_eq!(current.network_tx_bytes, 2250);
        assert_eq!(current.block_read_bytes, 5120);
        assert_eq!(current.block_write_bytes, 8192);
        assert_eq!(previous.network_rx_bytes, current.network_rx_bytes);

        let report = compute_usage(&previous, &current);
        // (1_000_000 / 10_000_000) * 2 * 100
        assert_eq!(report.cpu_percent, 20.0);
        assert_eq!(report.memory_percent, 25.0);
    }

    #[test]
    fn test_cgroup_v2_document_uses_online_cpus() {
        let content = r#"{
            "cpu_stats": {
                "cpu_usage": {"total_usage": 3000, "percpu_usage": null},
                "system_cpu_usage": 40000,
                "online_cpus": 4
            },
            "precpu_stats": {
                "cpu_usage": {"total_usage": 1000},
                "system_cpu_usage": 20000,
                "online_cpus": 4
            },
            "memory_stats": {"usage": 100, "limit": 400},
            "blkio_stats": {
                "io_service_bytes_recursive": [
                    {"major": 259, "minor": 0, "op": "read", "value": 10},
                    {"major": 259, "minor": 0, "op": "write", "value": 20}
                ]
            }
        }"#;

        let stats = DockerStats::from_json(content).unwrap();
        let (previous, current) = stats.snapshots();
        assert_eq!(current.cpu_core_count, 4);
        assert_eq!(current.block_read_bytes, 10);
        assert_eq!(current.block_write_bytes, 20);
        assert_eq!(current.network_rx_bytes, 0);

        let report = compute_usage(&previous, &current);
        assert_eq!(report.cpu_percent, 40.0);
        assert_eq!(report.memory_percent, 25.0);
    }

    #[test]
    fn test_stopped_container_document() {
        // A stopped container reports empty sections and null lists
        let content = r#"{
            "cpu_stats": {"cpu_usage": {"total_usage": 0}, "throttling_data": {}},
            "precpu_stats": {"cpu_usage": {"total_usage": 0}},
            "memory_stats": {},
            "networks": null,
            "blkio_stats": {"io_service_bytes_recursive": null}
        }"#;

        let stats = DockerStats::from_json(content).unwrap();
        let (previous, current) = stats.snapshots();
        assert_eq!(previous, ResourceSnapshot::default());
        assert_eq!(current, ResourceSnapshot::default());

        let report = compute_usage(&previous, &current);
        assert_eq!(report.cpu_percent, 0.0);
        assert_eq!(report.memory_percent, 0.0);
    }

    #[test]
    fn test_empty_document() {
        let stats = DockerStats::from_json("{}").unwrap();
        let (previous, current) = stats.snapshots();
        assert_eq!(previous, ResourceSnapshot::default());
        assert_eq!(current, ResourceSnapshot::default());
    }
}
