//! Wraps an arbitrary operator-supplied CLI tool (e.g. a user-mode
//! supervisor script) that already knows how to start/stop/remove a node by
//! service name. Useful on hosts where neither systemd, launchd, nor docker
//! is the right fit but an existing `zen`/sudo-wrapped tool is.

use super::{NodeSpec, ProcessManager, ProcessManagerError, ProcessStatus};
use crate::types::{BackendStatus, MachineConfig, Node};
use async_trait::async_trait;
use tokio::process::Command;

/// Invocation mode for the wrapped CLI tool.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InvocationMode {
    User,
    Sudo,
    Zen,
}

pub struct ExternalCliProcessManager {
    tool: String,
    mode: InvocationMode,
}

impl ExternalCliProcessManager {
    pub fn new() -> Self {
        Self {
            tool: "antctl".to_string(),
            mode: InvocationMode::Sudo,
        }
    }

    pub fn with_tool(tool: impl Into<String>, mode: InvocationMode) -> Self {
        Self {
            tool: tool.into(),
            mode,
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        match self.mode {
            InvocationMode::User => {
                let mut cmd = Command::new(&self.tool);
                cmd.args(args);
                cmd
            }
            InvocationMode::Sudo => {
                let mut cmd = Command::new("sudo");
                cmd.arg(&self.tool).args(args);
                cmd
            }
            InvocationMode::Zen => {
                let mut cmd = Command::new("zen");
                cmd.arg(&self.tool).args(args);
                cmd
            }
        }
    }
}

#[async_trait]
impl ProcessManager for ExternalCliProcessManager {
    async fn create(&self, spec: &NodeSpec) -> Result<(), ProcessManagerError> {
        let status = self
            .command(&[
                "create",
                &spec.node_name,
                "--binary",
                &spec.binary,
                "--root-dir",
                &spec.root_dir,
                "--port",
                &spec.port.to_string(),
                "--metrics-port",
                &spec.metrics_port.to_string(),
                "--wallet",
                &spec.wallet,
                "--network",
                &spec.network,
            ])
            .status()
            .await?;
        if status.success() {
            Ok(())
        } else {
            Err(ProcessManagerError::Backend(format!("external create exited with {status}")))
        }
    }

    async fn start(&self, node: &Node) -> Result<(), ProcessManagerError> {
        self.command(&["start", &node.node_name]).status().await?;
        Ok(())
    }

    async fn stop(&self, node: &Node) -> Result<(), ProcessManagerError> {
        self.command(&["stop", &node.node_name]).status().await?;
        Ok(())
    }

    async fn restart(&self, node: &Node) -> Result<(), ProcessManagerError> {
        self.command(&["restart", &node.node_name]).status().await?;
        Ok(())
    }

    async fn remove(&self, node: &Node) -> Result<(), ProcessManagerError> {
        self.command(&["remove", &node.node_name]).status().await.ok();
        Ok(())
    }

    async fn status(&self, node: &Node) -> Result<ProcessStatus, ProcessManagerError> {
        let output = self.command(&["status", &node.node_name]).output().await?;
        let text = String::from_utf8_lossy(&output.stdout).trim().to_lowercase();
        let status = match text.as_str() {
            "running" => BackendStatus::Running,
            "stopped" => BackendStatus::Stopped,
            "dead" => BackendStatus::Dead,
            _ => BackendStatus::Unknown,
        };
        Ok(ProcessStatus { pid: None, status })
    }

    async fn survey(&self, _config: &MachineConfig) -> Result<Vec<NodeSpec>, ProcessManagerError> {
        Ok(Vec::new())
    }

    async fn enable_firewall_port(&self, _port: u32) -> Result<(), ProcessManagerError> {
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
    fn test_with_tool_overrides_defaults() {
        let pm = ExternalCliProcessManager::with_tool("my-tool", InvocationMode::User);
        assert_eq!(pm.tool, "my-tool");
        assert_eq!(pm.mode, InvocationMode::User);
    }
}
