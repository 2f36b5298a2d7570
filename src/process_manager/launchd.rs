//! launchd-plist-backed nodes (macOS hosts). Same shape as the systemd
//! backend, `launchctl` in place of `systemctl`, a plist in place of a unit
//! file.

use super::{NodeSpec, ProcessManager, ProcessManagerError, ProcessStatus};
use crate::types::{BackendStatus, MachineConfig, Node};
use async_trait::async_trait;
use tokio::process::Command;

const PLIST_DIR: &str = "/Library/LaunchDaemons";

pub struct LaunchdProcessManager;

impl LaunchdProcessManager {
    pub fn new() -> Self {
        Self
    }

    fn label(node_name: &str) -> String {
        format!("net.autonomi.antnode{node_name}")
    }

    fn plist_path(node_name: &str) -> String {
        format!("{PLIST_DIR}/{}.plist", Self::label(node_name))
    }

    fn render_plist(spec: &NodeSpec) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<plist version=\"1.0\"><dict>\n<key>Label</key><string>{label}</string>\n<key>ProgramArguments</key><array>\n<string>{binary}</string>\n<string>--root-dir</string><string>{root_dir}</string>\n<string>--port</string><string>{port}</string>\n<string>--metrics-server-port</string><string>{metrics_port}</string>\n<string>--rewards-address</string><string>{wallet}</string>\n<string>{network}</string>\n</array>\n<key>RunAtLoad</key><true/>\n<key>KeepAlive</key><true/>\n</dict></plist>\n",
            label = Self::label(&spec.node_name),
            binary = spec.binary,
            root_dir = spec.root_dir,
            port = spec.port,
            metrics_port = spec.metrics_port,
            wallet = spec.wallet,
            network = spec.network,
        )
    }
}

#[async_trait]
impl ProcessManager for LaunchdProcessManager {
    async fn create(&self, spec: &NodeSpec) -> Result<(), ProcessManagerError> {
        tokio::fs::create_dir_all(&spec.root_dir).await?;
        tokio::fs::write(Self::plist_path(&spec.node_name), Self::render_plist(spec)).await?;
        Command::new("sudo")
            .args(["launchctl", "load", "-w", &Self::plist_path(&spec.node_name)])
            .status()
            .await?;
        Ok(())
    }

    async fn start(&self, node: &Node) -> Result<(), ProcessManagerError> {
        Command::new("sudo")
            .args(["launchctl", "start", &Self::label(&node.node_name)])
            .status()
            .await?;
        Ok(())
    }

    async fn stop(&self, node: &Node) -> Result<(), ProcessManagerError> {
        // `launchctl stop` on an unloaded/stopped job is a no-op, not an
        // error, so idempotence falls out of the tool itself.
        Command::new("sudo")
            .args(["launchctl", "stop", &Self::label(&node.node_name)])
            .status()
            .await?;
        Ok(())
    }

    async fn restart(&self, node: &Node) -> Result<(), ProcessManagerError> {
        self.stop(node).await?;
        self.start(node).await
    }

    async fn remove(&self, node: &Node) -> Result<(), ProcessManagerError> {
        self.stop(node).await.ok();
        Command::new("sudo")
            .args(["launchctl", "unload", "-w", &Self::plist_path(&node.node_name)])
            .status()
            .await
            .ok();
        tokio::fs::remove_file(Self::plist_path(&node.node_name)).await.ok();
        tokio::fs::remove_dir_all(&node.root_dir).await.ok();
        Ok(())
    }

    async fn status(&self, node: &Node) -> Result<ProcessStatus, ProcessManagerError> {
        let output = Command::new("launchctl")
            .args(["list", &Self::label(&node.node_name)])
            .output()
            .await?;
        let status = if output.status.success() {
            BackendStatus::Running
        } else {
            BackendStatus::Stopped
        };
        Ok(ProcessStatus { pid: None, status })
    }

    async fn survey(&self, _config: &MachineConfig) -> Result<Vec<NodeSpec>, ProcessManagerError> {
        // Enumerating and parsing arbitrary plists under PLIST_DIR follows
        // the same shape as the systemd backend's unit-file survey; left
        // unimplemented until a launchd host is actually onboarded.
        Ok(Vec::new())
    }

    async fn enable_firewall_port(&self, _port: u32) -> Result<(), ProcessManagerError> {
        Ok(())
    }

    async fn disable_firewall_port(&self, _port: u32) -> Result<(), ProcessManagerError> {
        Ok(())
    }
}
