//! systemd-unit-backed nodes, the primary backend on Linux hosts.
//!
//! Unit files live at `/etc/systemd/system/antnode<nnnn>.service`, an
//! `ExecStart=` line carries the node's argv, and `ufw` fences the data
//! port.

use super::{NodeSpec, ProcessManager, ProcessManagerError, ProcessStatus};
use crate::types::{BackendStatus, MachineConfig, Node};
use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;

const UNIT_DIR: &str = "/etc/systemd/system";

pub struct SystemdProcessManager;

impl SystemdProcessManager {
    pub fn new() -> Self {
        Self
    }

    fn unit_path(service: &str) -> String {
        format!("{UNIT_DIR}/{service}")
    }

    fn render_unit(spec: &NodeSpec) -> String {
        let env_line = if spec.environment.is_empty() {
            String::new()
        } else {
            format!("Environment=\"{}\"\n", spec.environment)
        };
        format!(
            "[Unit]\nDescription=antnode{node_name}\n[Service]\n{env_line}User={user}\nExecStart={binary} --bootstrap-cache-dir /var/antctl/bootstrap-cache --root-dir {root_dir} --port {port} --enable-metrics-server --metrics-server-port {metrics_port} --log-output-dest /var/log/antnode/antnode{node_name} --max-log-files 1 --max-archived-log-files 1 --rewards-address {wallet} {network} {start_args}\nRestart=always\n",
            node_name = spec.node_name,
            env_line = env_line,
            user = spec.user,
            binary = spec.binary,
            root_dir = spec.root_dir,
            port = spec.port,
            metrics_port = spec.metrics_port,
            wallet = spec.wallet,
            network = spec.network,
            start_args = spec.start_args,
        )
    }

    async fn systemctl(args: &[&str]) -> Result<(), ProcessManagerError> {
        let status = Command::new("sudo")
            .arg("systemctl")
            .args(args)
            .status()
            .await?;
        if status.success() {
            Ok(())
        } else {
            Err(ProcessManagerError::Backend(format!(
                "systemctl {args:?} exited with {status}"
            )))
        }
    }

    /// Parses an `ExecStart=` line for the stable flags documented in the
    /// external interfaces (`--root-dir`, `--port`, `--metrics-server-port`,
    /// `--rewards-address`, optional `--ip`).
    fn parse_unit(service: &str, data: &str, host: &str) -> Option<NodeSpec> {
        let id: u64 = Regex::new(r"antnode(\d+)")
            .unwrap()
            .captures(service)?
            .get(1)?
            .as_str()
            .parse()
            .ok()?;
        let binary = Regex::new(r"ExecStart=(\S+)")
            .unwrap()
            .captures(data)?
            .get(1)?
            .as_str()
            .to_string();
        let user = Regex::new(r"User=(\w+)")
            .unwrap()
            .captures(data)
            .map(|c| c[1].to_string())
            .unwrap_or_default();
        let root_dir = Regex::new(r"--root-dir (\S+)")
            .unwrap()
            .captures(data)?
            .get(1)?
            .as_str()
            .to_string();
        let port: u32 = Regex::new(r"--port (\d+)")
            .unwrap()
            .captures(data)?
            .get(1)?
            .as_str()
            .parse()
            .ok()?;
        let metrics_port: u32 = Regex::new(r"--metrics-server-port (\d+)")
            .unwrap()
            .captures(data)?
            .get(1)?
            .as_str()
            .parse()
            .ok()?;
        let wallet = Regex::new(r"--rewards-address (\S+)")
            .unwrap()
            .captures(data)?
            .get(1)?
            .as_str()
            .to_string();
        let network = Regex::new(r"--rewards-address \S+ (\S+)")
            .unwrap()
            .captures(data)
            .map(|c| c[1].to_string())
            .unwrap_or_default();
        let host = Regex::new(r"--ip (\S+)")
            .unwrap()
            .captures(data)
            .map(|c| {
                if &c[1] == "0.0.0.0" {
                    host.to_string()
                } else {
                    c[1].to_string()
                }
            })
            .unwrap_or_else(|| host.to_string());
        let environment = Regex::new(r#"Environment="(.+)""#)
            .unwrap()
            .captures(data)
            .map(|c| c[1].to_string())
            .unwrap_or_default();

        Some(NodeSpec {
            id,
            node_name: format!("{id:04}"),
            binary,
            root_dir,
            port,
            metrics_port,
            network,
            wallet,
            host,
            environment,
            start_args: String::new(),
            user,
        })
    }
}

#[async_trait]
impl ProcessManager for SystemdProcessManager {
    async fn create(&self, spec: &NodeSpec) -> Result<(), ProcessManagerError> {
        tokio::fs::create_dir_all(&spec.root_dir).await?;
        tokio::fs::write(Self::unit_path(&format!("antnode{}.service", spec.node_name)), Self::render_unit(spec))
            .await?;
        Self::systemctl(&["daemon-reload"]).await?;
        self.enable_firewall_port(spec.port).await.ok();
        Self::systemctl(&["start", &format!("antnode{}.service", spec.node_name)]).await
    }

    async fn start(&self, node: &Node) -> Result<(), ProcessManagerError> {
        self.enable_firewall_port(node.port).await.ok();
        Self::systemctl(&["start", &node.service]).await
    }

    async fn stop(&self, node: &Node) -> Result<(), ProcessManagerError> {
        // Idempotent: `systemctl stop` on an already-stopped unit still
        // exits 0.
        let result = Self::systemctl(&["stop", &node.service]).await;
        self.disable_firewall_port(node.port).await.ok();
        result
    }

    async fn restart(&self, node: &Node) -> Result<(), ProcessManagerError> {
        Self::systemctl(&["restart", &node.service]).await
    }

    async fn remove(&self, node: &Node) -> Result<(), ProcessManagerError> {
        // Idempotent: every step below tolerates a missing artifact.
        self.stop(node).await.ok();
        tokio::fs::remove_dir_all(&node.root_dir).await.ok();
        tokio::fs::remove_file(Self::unit_path(&node.service)).await.ok();
        Self::systemctl(&["daemon-reload"]).await
    }

    async fn status(&self, node: &Node) -> Result<ProcessStatus, ProcessManagerError> {
        let output = Command::new("systemctl")
            .args(["is-active", &node.service])
            .output()
            .await?;
        let state = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let status = match state.as_str() {
            "active" => BackendStatus::Running,
            "inactive" | "failed" => BackendStatus::Stopped,
            _ => BackendStatus::Unknown,
        };
        Ok(ProcessStatus { pid: None, status })
    }

    async fn survey(&self, config: &MachineConfig) -> Result<Vec<NodeSpec>, ProcessManagerError> {
        let mut entries = tokio::fs::read_dir(UNIT_DIR).await?;
        let unit_re = Regex::new(r"^antnode\d+\.service$").unwrap();
        let mut specs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if !unit_re.is_match(&name) {
                continue;
            }
            if let Ok(data) = tokio::fs::read_to_string(Self::unit_path(&name)).await {
                if let Some(spec) = Self::parse_unit(&name, &data, &config.host) {
                    specs.push(spec);
                }
            }
        }
        Ok(specs)
    }

    async fn enable_firewall_port(&self, port: u32) -> Result<(), ProcessManagerError> {
        Command::new("sudo")
            .args(["ufw", "allow", &format!("{port}/udp")])
            .status()
            .await?;
        Ok(())
    }

    async fn disable_firewall_port(&self, port: u32) -> Result<(), ProcessManagerError> {
        Command::new("sudo")
            .args(["ufw", "delete", "allow", &format!("{port}/udp")])
            .status()
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unit_extracts_stable_anchors() {
        let data = r#"[Unit]
Description=antnode0007
[Service]
User=ant
ExecStart=/var/antctl/services/antnode0007/antnode --bootstrap-cache-dir /var/antctl/bootstrap-cache --root-dir /var/antctl/services/antnode0007 --port 55007 --enable-metrics-server --metrics-server-port 13007 --rewards-address 0xabc evm-arbitrum-one
Restart=always
"#;
        let spec = SystemdProcessManager::parse_unit("antnode0007.service", data, "127.0.0.1").unwrap();
        assert_eq!(spec.id, 7);
        assert_eq!(spec.port, 55007);
        assert_eq!(spec.metrics_port, 13007);
        assert_eq!(spec.wallet, "0xabc");
        assert_eq!(spec.network, "evm-arbitrum-one");
        assert_eq!(spec.user, "ant");
    }

    #[test]
    fn test_parse_unit_resolves_wildcard_ip_to_configured_host() {
        let data = "ExecStart=/bin/antnode --root-dir /tmp/n --port 1 --metrics-server-port 2 --rewards-address 0xabc net --ip 0.0.0.0";
        let spec = SystemdProcessManager::parse_unit("antnode0001.service", data, "10.0.0.5").unwrap();
        assert_eq!(spec.host, "10.0.0.5");
    }

    #[test]
    fn test_parse_unit_rejects_non_matching_service_name() {
        assert!(SystemdProcessManager::parse_unit("other.service", "ExecStart=/bin/x", "127.0.0.1").is_none());
    }

    #[test]
    fn test_render_unit_includes_execstart_anchors() {
        let spec = NodeSpec {
            id: 1,
            node_name: "0001".to_string(),
            binary: "/bin/antnode".to_string(),
            root_dir: "/var/antctl/services/antnode0001".to_string(),
            port: 55001,
            metrics_port: 13001,
            network: "evm-arbitrum-one".to_string(),
            wallet: "0xabc".to_string(),
            host: "127.0.0.1".to_string(),
            environment: String::new(),
            start_args: String::new(),
            user: "ant".to_string(),
        };
        let unit = SystemdProcessManager::render_unit(&spec);
        assert!(unit.contains("--root-dir /var/antctl/services/antnode0001"));
        assert!(unit.contains("--port 55001"));
        assert!(unit.contains("--metrics-server-port 13001"));
        assert!(unit.contains("--rewards-address 0xabc evm-arbitrum-one"));
    }
}
