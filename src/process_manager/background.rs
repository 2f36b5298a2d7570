//! Nodes run as plain background OS processes, tracked in-memory by PID.
//!
//! Spawns via `tokio::process::Command`, tracks children in a map, and
//! probes liveness with `sysinfo`.

use super::{NodeSpec, ProcessManager, ProcessManagerError, ProcessStatus};
use crate::types::{BackendStatus, MachineConfig, Node};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use sysinfo::System;
use tokio::process::Command;

pub struct BackgroundProcessManager {
    children: Mutex<HashMap<u64, u32>>,
}

impl BackgroundProcessManager {
    pub fn new() -> Self {
        Self {
            children: Mutex::new(HashMap::new()),
        }
    }

    fn build_args(spec_like: &NodeArgs) -> Vec<String> {
        let mut args = vec![
            "--root-dir".to_string(),
            spec_like.root_dir.clone(),
            "--port".to_string(),
            spec_like.port.to_string(),
            "--enable-metrics-server".to_string(),
            "--metrics-server-port".to_string(),
            spec_like.metrics_port.to_string(),
            "--rewards-address".to_string(),
            spec_like.wallet.clone(),
            spec_like.network.clone(),
        ];
        if !spec_like.start_args.is_empty() {
            args.extend(spec_like.start_args.split_whitespace().map(str::to_string));
        }
        args
    }
}

struct NodeArgs {
    root_dir: String,
    port: u32,
    metrics_port: u32,
    wallet: String,
    network: String,
    start_args: String,
}

#[async_trait]
impl ProcessManager for BackgroundProcessManager {
    async fn create(&self, spec: &NodeSpec) -> Result<(), ProcessManagerError> {
        tokio::fs::create_dir_all(&spec.root_dir).await?;
        let args = Self::build_args(&NodeArgs {
            root_dir: spec.root_dir.clone(),
            port: spec.port,
            metrics_port: spec.metrics_port,
            wallet: spec.wallet.clone(),
            network: spec.network.clone(),
            start_args: spec.start_args.clone(),
        });
        let child = Command::new(&spec.binary).args(&args).spawn()?;
        if let Some(pid) = child.id() {
            self.children.lock().unwrap().insert(spec.id, pid);
        }
        Ok(())
    }

    async fn start(&self, node: &Node) -> Result<(), ProcessManagerError> {
        let args = Self::build_args(&NodeArgs {
            root_dir: node.root_dir.clone(),
            port: node.port,
            metrics_port: node.metrics_port,
            wallet: node.wallet.clone(),
            network: node.network.clone(),
            start_args: String::new(),
        });
        let child = Command::new(&node.binary).args(&args).spawn()?;
        if let Some(pid) = child.id() {
            self.children.lock().unwrap().insert(node.id.0, pid);
        }
        Ok(())
    }

    async fn stop(&self, node: &Node) -> Result<(), ProcessManagerError> {
        let pid = self.children.lock().unwrap().remove(&node.id.0);
        // Idempotent: if we have no tracked pid (already stopped, or we
        // just started after a restart of our own process), there is
        // nothing to kill.
        if let Some(pid) = pid {
            Command::new("kill")
                .arg(pid.to_string())
                .status()
                .await
                .ok();
        }
        Ok(())
    }

    async fn restart(&self, node: &Node) -> Result<(), ProcessManagerError> {
        self.stop(node).await?;
        self.start(node).await
    }

    async fn remove(&self, node: &Node) -> Result<(), ProcessManagerError> {
        self.stop(node).await.ok();
        tokio::fs::remove_dir_all(&node.root_dir).await.ok();
        Ok(())
    }

    async fn status(&self, node: &Node) -> Result<ProcessStatus, ProcessManagerError> {
        let pid = self.children.lock().unwrap().get(&node.id.0).copied();
        let status = match pid {
            Some(pid) => {
                let mut system = System::new();
                system.refresh_all();
                if system.process(sysinfo::Pid::from_u32(pid)).is_some() {
                    BackendStatus::Running
                } else {
                    BackendStatus::Stopped
                }
            }
            None => BackendStatus::Stopped,
        };
        Ok(ProcessStatus { pid, status })
    }

    async fn survey(&self, _config: &MachineConfig) -> Result<Vec<NodeSpec>, ProcessManagerError> {
        // Background-managed nodes have no on-host descriptor independent
        // of our own in-memory table; nothing to adopt across a restart of
        // this tool beyond what the Store already records.
        Ok(Vec::new())
    }

    async fn enable_firewall_port(&self, _port: u32) -> Result<(), ProcessManagerError> {
        Ok(())
    }

    async fn disable_firewall_port(&self, _port: u32) -> Result<(), ProcessManagerError> {
        Ok(())
    }
}
