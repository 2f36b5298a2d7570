//! Initial/after-reboot adoption of on-host nodes into fresh `Node` rows.
//!
//! Each backend reports what it already manages on disk via `survey`;
//! this module turns those raw specs into full `Node` rows by probing
//! `/metadata`, falling back to `--version`, and marking a node `DEAD`
//! when its root directory itself is gone.

use crate::metrics_client::{read_antnode_binary_version, MetricsClient};
use crate::process_manager::{NodeSpec, ProcessManager, ProcessManagers};
use crate::types::{ManagerType, MachineConfig, Node, NodeId, NodeStatus};

pub struct Surveyor {
    metrics: MetricsClient,
}

impl Surveyor {
    pub fn new() -> Self {
        Self {
            metrics: MetricsClient::new(),
        }
    }

    /// Surveys every backend and returns fully populated `Node` records
    /// ready for bulk insertion. A backend with nothing to adopt (no specs
    /// from `survey`) simply contributes nothing.
    pub async fn survey_all(&self, managers: &ProcessManagers, config: &MachineConfig) -> Vec<Node> {
        let mut nodes = Vec::new();
        for manager_type in [
            ManagerType::Systemd,
            ManagerType::Launchd,
            ManagerType::Docker,
            ManagerType::Background,
            ManagerType::ExternalCli,
        ] {
            let backend = managers.for_node(manager_type);
            let Ok(specs) = backend.survey(config).await else {
                continue;
            };
            for spec in specs {
                nodes.push(self.adopt(manager_type, spec).await);
            }
        }
        nodes
    }

    async fn adopt(&self, manager_type: ManagerType, spec: NodeSpec) -> Node {
        let metadata = self.metrics.read_metadata(&spec.host, spec.metrics_port).await;
        let now = chrono::Utc::now().timestamp();

        if metadata.reachable {
            let metrics = self.metrics.read_metrics(&spec.host, spec.metrics_port).await;
            return Node {
                id: NodeId(spec.id),
                node_name: spec.node_name.clone(),
                service: NodeId(spec.id).service_name(),
                manager_type,
                user: spec.user,
                binary: spec.binary,
                version: metadata.version,
                root_dir: spec.root_dir.clone(),
                port: spec.port,
                metrics_port: spec.metrics_port,
                network: spec.network,
                wallet: spec.wallet,
                peer_id: metadata.peer_id,
                status: NodeStatus::Running,
                timestamp: now,
                records: metrics.records,
                uptime: metrics.uptime,
                shunned: metrics.shunned,
                age: secret_key_age(&spec.root_dir).await,
                host: spec.host,
            };
        }

        let root_dir_exists = tokio::fs::metadata(&spec.root_dir).await.is_ok();
        let (status, version) = if root_dir_exists {
            (NodeStatus::Stopped, read_antnode_binary_version(&spec.binary).await)
        } else {
            (NodeStatus::Dead, None)
        };

        Node {
            id: NodeId(spec.id),
            node_name: spec.node_name.clone(),
            service: NodeId(spec.id).service_name(),
            manager_type,
            user: spec.user,
            binary: spec.binary,
            version,
            root_dir: spec.root_dir.clone(),
            port: spec.port,
            metrics_port: spec.metrics_port,
            network: spec.network,
            wallet: spec.wallet,
            peer_id: String::new(),
            status,
            timestamp: now,
            records: 0,
            uptime: 0,
            shunned: 0,
            age: secret_key_age(&spec.root_dir).await,
            host: spec.host,
        }
    }
}

impl Default for Surveyor {
    fn default() -> Self {
        Self::new()
    }
}

/// mtime of `<root_dir>/secret-key`, in Unix seconds, or 0 if missing.
async fn secret_key_age(root_dir: &str) -> i64 {
    let path = format!("{root_dir}/secret-key");
    match tokio::fs::metadata(&path).await.and_then(|m| m.modified()) {
        Ok(mtime) => mtime
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0),
        Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_secret_key_age_is_zero_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let age = secret_key_age(dir.path().to_str().unwrap()).await;
        assert_eq!(age, 0);
    }

    #[tokio::test]
    async fn test_secret_key_age_reads_mtime_when_present() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("secret-key"), b"k").await.unwrap();
        let age = secret_key_age(dir.path().to_str().unwrap()).await;
        assert!(age > 0);
    }
}
