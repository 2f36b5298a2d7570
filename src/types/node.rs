use super::{NodeId, NodeStatus};
use serde::{Deserialize, Serialize};

/// Which `ProcessManager` backend owns a node's on-host artifacts.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ManagerType {
    Systemd,
    Launchd,
    Docker,
    Background,
    ExternalCli,
}

impl ManagerType {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Systemd => "systemd",
            Self::Launchd => "launchd",
            Self::Docker => "docker",
            Self::Background => "background",
            Self::ExternalCli => "external_cli",
        }
    }
}

#[derive(thiserror::Error, Debug)]
#[error("unrecognized manager type: {0}")]
pub struct ParseManagerTypeError(String);

impl std::str::FromStr for ManagerType {
    type Err = ParseManagerTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "systemd" => Self::Systemd,
            "launchd" => Self::Launchd,
            "docker" => Self::Docker,
            "background" => Self::Background,
            "external_cli" => Self::ExternalCli,
            other => return Err(ParseManagerTypeError(other.to_string())),
        })
    }
}

/// One row in the `Node` table: a single managed antnode instance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub node_name: String,
    pub service: String,
    pub manager_type: ManagerType,
    pub user: String,
    pub binary: String,
    pub version: Option<semver::Version>,
    pub root_dir: String,
    pub port: u32,
    pub metrics_port: u32,
    pub network: String,
    pub wallet: String,
    pub peer_id: String,
    pub status: NodeStatus,
    /// Unix timestamp (seconds) of the last status change; delay expiry is
    /// measured against this field.
    pub timestamp: i64,
    pub records: u64,
    pub uptime: u64,
    pub shunned: u64,
    /// mtime of the node's `secret-key` file, or 0 if never observed.
    pub age: i64,
    pub host: String,
}

impl Node {
    /// `true` once `version` has actually been observed.
    pub fn has_version(&self) -> bool {
        self.version.is_some()
    }

    pub fn mark_status(&mut self, status: NodeStatus, now: i64) {
        self.status = status;
        self.timestamp = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Node {
        Node {
            id: NodeId(1),
            node_name: "0001".to_string(),
            service: "antnode0001.service".to_string(),
            manager_type: ManagerType::Systemd,
            user: "ant".to_string(),
            binary: "/var/antctl/services/antnode0001/antnode".to_string(),
            version: None,
            root_dir: "/var/antctl/services/antnode0001".to_string(),
            port: 55_001,
            metrics_port: 13_001,
            network: "evm-arbitrum-one".to_string(),
            wallet: "0xabc".to_string(),
            peer_id: String::new(),
            status: NodeStatus::Stopped,
            timestamp: 0,
            records: 0,
            uptime: 0,
            shunned: 0,
            age: 0,
            host: "127.0.0.1".to_string(),
        }
    }

    #[test]
    fn test_has_version() {
        let mut node = sample();
        assert!(!node.has_version());
        node.version = Some(semver::Version::new(0, 1, 0));
        assert!(node.has_version());
    }

    #[test]
    fn test_mark_status_updates_both_fields() {
        let mut node = sample();
        node.mark_status(NodeStatus::Restarting, 1_000);
        assert_eq!(node.status, NodeStatus::Restarting);
        assert_eq!(node.timestamp, 1_000);
    }

    #[test]
    fn test_manager_type_round_trip() {
        use std::str::FromStr;
        for mt in [
            ManagerType::Systemd,
            ManagerType::Launchd,
            ManagerType::Docker,
            ManagerType::Background,
            ManagerType::ExternalCli,
        ] {
            assert_eq!(ManagerType::from_str(mt.as_db_str()).unwrap(), mt);
        }
    }
}
