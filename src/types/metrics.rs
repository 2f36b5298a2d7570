use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One-pass snapshot of host resource usage and fleet counters, produced by
/// the Metrics Collector and consumed (read-only) by the Decision engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Metrics {
    pub system_start: i64,
    pub total_nodes: u32,
    pub running_nodes: u32,
    pub stopped_nodes: u32,
    pub restarting_nodes: u32,
    pub upgrading_nodes: u32,
    pub migrating_nodes: u32,
    pub removing_nodes: u32,
    pub dead_nodes: u32,
    pub antnode_version: semver::Version,
    pub queen_node_version: semver::Version,
    pub nodes_latest_v: u32,
    pub nodes_no_version: u32,
    pub nodes_to_upgrade: u32,
    pub nodes_by_version: HashMap<String, u32>,
    pub used_cpu_percent: f64,
    pub used_mem_percent: f64,
    pub used_hd_percent: f64,
    pub total_hd_bytes: u64,
    pub load_average_1: f64,
    pub load_average_5: f64,
    pub load_average_15: f64,
    pub hdio_read_bytes: u64,
    pub hdio_write_bytes: u64,
    pub netio_read_bytes: u64,
    pub netio_write_bytes: u64,
    /// Observational only; the decision engine never reads this (see
    /// DESIGN.md's Open Question resolution).
    pub node_hd_crisis: i64,
}

impl Metrics {
    /// `in_flight = upgrading + restarting + removing + migrating`, the
    /// quantity the global concurrency cap is measured against.
    pub fn in_flight(&self) -> u32 {
        self.upgrading_nodes + self.restarting_nodes + self.removing_nodes + self.migrating_nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Metrics {
        Metrics {
            system_start: 0,
            total_nodes: 0,
            running_nodes: 0,
            stopped_nodes: 0,
            restarting_nodes: 1,
            upgrading_nodes: 2,
            migrating_nodes: 0,
            removing_nodes: 3,
            dead_nodes: 0,
            antnode_version: semver::Version::new(0, 1, 0),
            queen_node_version: semver::Version::new(0, 1, 0),
            nodes_latest_v: 0,
            nodes_no_version: 0,
            nodes_to_upgrade: 0,
            nodes_by_version: HashMap::new(),
            used_cpu_percent: 0.0,
            used_mem_percent: 0.0,
            used_hd_percent: 0.0,
            total_hd_bytes: 0,
            load_average_1: 0.0,
            load_average_5: 0.0,
            load_average_15: 0.0,
            hdio_read_bytes: 0,
            hdio_write_bytes: 0,
            netio_read_bytes: 0,
            netio_write_bytes: 0,
            node_hd_crisis: 0,
        }
    }

    #[test]
    fn test_in_flight_sums_transitional_counters() {
        assert_eq!(sample().in_flight(), 6);
    }
}
