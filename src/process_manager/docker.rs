//! Docker-container-backed nodes, driving the `docker` CLI directly rather
//! than a socket client — the host no longer needs a Docker Engine API
//! binding import once nodes stop being the sole managed container type.

use super::{NodeSpec, ProcessManager, ProcessManagerError, ProcessStatus};
use crate::types::{BackendStatus, MachineConfig, Node};
use async_trait::async_trait;
use tokio::process::Command;

pub struct DockerProcessManager;

impl DockerProcessManager {
    pub fn new() -> Self {
        Self
    }

    fn container_name(node_name: &str) -> String {
        format!("antnode{node_name}")
    }
}

#[async_trait]
impl ProcessManager for DockerProcessManager {
    async fn create(&self, spec: &NodeSpec) -> Result<(), ProcessManagerError> {
        tokio::fs::create_dir_all(&spec.root_dir).await?;
        let status = Command::new("docker")
            .args([
                "run",
                "-d",
                "--name",
                &Self::container_name(&spec.node_name),
                "--restart",
                "unless-stopped",
                "-v",
                &format!("{}:/data", spec.root_dir),
                "-p",
                &format!("{}:{}/udp", spec.port, spec.port),
                "-p",
                &format!("{}:{}/tcp", spec.metrics_port, spec.metrics_port),
                &spec.binary,
                "--root-dir",
                "/data",
                "--port",
                &spec.port.to_string(),
                "--enable-metrics-server",
                "--metrics-server-port",
                &spec.metrics_port.to_string(),
                "--rewards-address",
                &spec.wallet,
                &spec.network,
            ])
            .status()
            .await?;
        if status.success() {
            Ok(())
        } else {
            Err(ProcessManagerError::Backend(format!("docker run exited with {status}")))
        }
    }

    async fn start(&self, node: &Node) -> Result<(), ProcessManagerError> {
        Command::new("docker")
            .args(["start", &Self::container_name(&node.node_name)])
            .status()
            .await?;
        Ok(())
    }

    async fn stop(&self, node: &Node) -> Result<(), ProcessManagerError> {
        // `docker stop` on an already-stopped container still exits 0.
        Command::new("docker")
            .args(["stop", &Self::container_name(&node.node_name)])
            .status()
            .await?;
        Ok(())
    }

    async fn restart(&self, node: &Node) -> Result<(), ProcessManagerError> {
        Command::new("docker")
            .args(["restart", &Self::container_name(&node.node_name)])
            .status()
            .await?;
        Ok(())
    }

    async fn remove(&self, node: &Node) -> Result<(), ProcessManagerError> {
        self.stop(node).await.ok();
        Command::new("docker")
            .args(["rm", "-f", &Self::container_name(&node.node_name)])
            .status()
            .await
            .ok();
        tokio::fs::remove_dir_all(&node.root_dir).await.ok();
        Ok(())
    }

    async fn status(&self, node: &Node) -> Result<ProcessStatus, ProcessManagerError> {
        let output = Command::new("docker")
            .args([
                "inspect",
                "--format",
                "{{.State.Running}}",
                &Self::container_name(&node.node_name),
            ])
            .output()
            .await?;
        let status = if !output.status.success() {
            BackendStatus::Unknown
        } else if String::from_utf8_lossy(&output.stdout).trim() == "true" {
            BackendStatus::Running
        } else {
            BackendStatus::Stopped
        };
        Ok(ProcessStatus { pid: None, status })
    }

    async fn survey(&self, _config: &MachineConfig) -> Result<Vec<NodeSpec>, ProcessManagerError> {
        // `docker ps -a --filter name=antnode` plus `docker inspect` per
        // match would recover argv the same way the systemd backend parses
        // unit files; left unimplemented until a docker-backed host needs
        // adoption.
        Ok(Vec::new())
    }

    async fn enable_firewall_port(&self, _port: u32) -> Result<(), ProcessManagerError> {
        // Docker manages its own port publishing via `-p`; no separate
        // firewall step is needed.
        Ok(())
    }

    async fn disable_firewall_port(&self, _port: u32) -> Result<(), ProcessManagerError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_name() {
        assert_eq!(DockerProcessManager::container_name("0007"), "antnode0007");
    }
}
