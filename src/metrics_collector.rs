//! One-pass host + fleet metrics snapshot, consumed read-only by the
//! Decision engine.
//!
//! CPU and I/O rates need a before/after sampling window to mean anything,
//! so this takes one reading, sleeps, then takes a second and diffs them.

use crate::types::{MachineConfig, Metrics, Node, NodeStatus};
use std::collections::HashMap;
use std::time::Duration;
use sysinfo::{Disks, Networks, System};

const SAMPLE_WINDOW: Duration = Duration::from_secs(1);

#[derive(thiserror::Error, Debug)]
pub enum MetricsCollectorError {
    #[error("antnode binary not found on PATH")]
    BinaryNotOnPath,
}

pub struct MetricsCollector;

impl MetricsCollector {
    pub fn new() -> Self {
        Self
    }

    pub async fn collect(&self, config: &MachineConfig, nodes: &[Node]) -> Result<Metrics, MetricsCollectorError> {
        let binary = resolve_binary_on_path("antnode").ok_or(MetricsCollectorError::BinaryNotOnPath)?;
        let antnode_version = crate::metrics_client::read_antnode_binary_version(&binary)
            .await
            .unwrap_or_else(|| semver::Version::new(0, 0, 0));

        let queen_node_version = nodes
            .iter()
            .min_by_key(|n| n.id)
            .and_then(|n| n.version.clone())
            .unwrap_or_else(|| antnode_version.clone());

        let mut system = System::new_all();
        system.refresh_cpu_usage();
        let mut disks_before = Disks::new_with_refreshed_list();
        let mut networks_before = Networks::new_with_refreshed_list();
        let (hdio_read_before, hdio_write_before) = disk_io_totals(&disks_before);
        let (netio_read_before, netio_write_before) = network_io_totals(&networks_before);

        tokio::time::sleep(SAMPLE_WINDOW).await;

        system.refresh_cpu_usage();
        disks_before.refresh(true);
        networks_before.refresh(true);
        let (hdio_read_after, hdio_write_after) = disk_io_totals(&disks_before);
        let (netio_read_after, netio_write_after) = network_io_totals(&networks_before);

        system.refresh_memory();
        let used_mem_percent = if system.total_memory() == 0 {
            0.0
        } else {
            system.used_memory() as f64 / system.total_memory() as f64 * 100.0
        };

        let (used_hd_percent, total_hd_bytes) = disk_usage(&config.node_storage);

        let load = System::load_average();

        let mut running_nodes = 0u32;
        let mut stopped_nodes = 0u32;
        let mut restarting_nodes = 0u32;
        let mut upgrading_nodes = 0u32;
        let mut migrating_nodes = 0u32;
        let mut removing_nodes = 0u32;
        let mut dead_nodes = 0u32;
        let mut nodes_no_version = 0u32;
        let mut nodes_latest_v = 0u32;
        let mut nodes_by_version: HashMap<String, u32> = HashMap::new();

        for node in nodes {
            match node.status {
                NodeStatus::Running => running_nodes += 1,
                NodeStatus::Stopped => stopped_nodes += 1,
                NodeStatus::Restarting => restarting_nodes += 1,
                NodeStatus::Upgrading => upgrading_nodes += 1,
                NodeStatus::Migrating => migrating_nodes += 1,
                NodeStatus::Removing => removing_nodes += 1,
                NodeStatus::Dead => dead_nodes += 1,
                NodeStatus::Disabled => {}
            }
            match &node.version {
                Some(v) => {
                    *nodes_by_version.entry(v.to_string()).or_insert(0) += 1;
                    if *v >= antnode_version {
                        nodes_latest_v += 1;
                    }
                }
                None => nodes_no_version += 1,
            }
        }

        let total_nodes = nodes.len() as u32;
        let nodes_to_upgrade = total_nodes.saturating_sub(nodes_latest_v).saturating_sub(nodes_no_version);

        let node_hd_crisis = if total_hd_bytes == 0 || config.hd_remove == 0 {
            0
        } else {
            let slack = total_hd_bytes as f64 * (config.hd_remove as f64 / 100.0);
            ((total_nodes as u64 * config.crisis_bytes) as f64 / slack * 100.0) as i64
        };

        Ok(Metrics {
            system_start: system_start_timestamp(),
            total_nodes,
            running_nodes,
            stopped_nodes,
            restarting_nodes,
            upgrading_nodes,
            migrating_nodes,
            removing_nodes,
            dead_nodes,
            antnode_version,
            queen_node_version,
            nodes_latest_v,
            nodes_no_version,
            nodes_to_upgrade,
            nodes_by_version,
            used_cpu_percent: system.global_cpu_usage() as f64,
            used_mem_percent,
            used_hd_percent,
            total_hd_bytes,
            load_average_1: load.one,
            load_average_5: load.five,
            load_average_15: load.fifteen,
            hdio_read_bytes: hdio_read_after.saturating_sub(hdio_read_before),
            hdio_write_bytes: hdio_write_after.saturating_sub(hdio_write_before),
            netio_read_bytes: netio_read_after.saturating_sub(netio_read_before),
            netio_write_bytes: netio_write_after.saturating_sub(netio_write_before),
            node_hd_crisis,
        })
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn disk_io_totals(disks: &Disks) -> (u64, u64) {
    disks.iter().fold((0, 0), |(read, write), disk| {
        let usage = disk.usage();
        (read + usage.total_read_bytes, write + usage.total_written_bytes)
    })
}

fn network_io_totals(networks: &Networks) -> (u64, u64) {
    networks.iter().fold((0, 0), |(rx, tx), (_, data)| {
        (rx + data.total_received(), tx + data.total_transmitted())
    })
}

fn disk_usage(node_storage: &str) -> (f64, u64) {
    let disks = Disks::new_with_refreshed_list();
    let best = disks
        .iter()
        .filter(|d| node_storage.starts_with(d.mount_point().to_string_lossy().as_ref()))
        .max_by_key(|d| d.mount_point().to_string_lossy().len());
    match best {
        Some(disk) => {
            let total = disk.total_space();
            let available = disk.available_space();
            let used_percent = if total == 0 {
                0.0
            } else {
                (total - available) as f64 / total as f64 * 100.0
            };
            (used_percent, total)
        }
        None => (0.0, 0),
    }
}

fn system_start_timestamp() -> i64 {
    System::boot_time() as i64
}

fn resolve_binary_on_path(name: &str) -> Option<String> {
    let path = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path) {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate.to_string_lossy().to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_binary_on_path_finds_existing_executable() {
        // `sh` is present on every CI / dev host this crate targets.
        assert!(resolve_binary_on_path("sh").is_some() || resolve_binary_on_path("cmd.exe").is_some());
    }

    #[test]
    fn test_resolve_binary_on_path_returns_none_for_bogus_name() {
        assert!(resolve_binary_on_path("definitely-not-a-real-binary-xyz").is_none());
    }

    #[test]
    fn test_disk_usage_unknown_mount_returns_zero() {
        let (percent, total) = disk_usage("/this/path/almost-certainly-does-not-exist-xyz");
        assert_eq!(percent, 0.0);
        assert_eq!(total, 0);
    }
}
