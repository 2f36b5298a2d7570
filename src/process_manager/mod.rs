//! The polymorphic backend capability set: one trait, several concrete
//! backends selected per-node via `Node::manager_type`.

mod background;
mod docker;
mod external_cli;
mod launchd;
mod systemd;

pub use background::BackgroundProcessManager;
pub use docker::DockerProcessManager;
pub use external_cli::ExternalCliProcessManager;
pub use launchd::LaunchdProcessManager;
pub use systemd::SystemdProcessManager;

use crate::types::{BackendStatus, MachineConfig, ManagerType, Node};
use async_trait::async_trait;

#[derive(thiserror::Error, Debug)]
pub enum ProcessManagerError {
    #[error("spawning/controlling process failed: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("backend call failed: {0}")]
    Backend(String),
}

/// A fully-specified node ready to be materialized by a backend's `create`.
#[derive(Clone, Debug)]
pub struct NodeSpec {
    pub id: u64,
    pub node_name: String,
    pub binary: String,
    pub root_dir: String,
    pub port: u32,
    pub metrics_port: u32,
    pub network: String,
    pub wallet: String,
    pub host: String,
    pub environment: String,
    pub start_args: String,
    pub user: String,
}

#[derive(Clone, Copy, Debug)]
pub struct ProcessStatus {
    pub pid: Option<u32>,
    pub status: BackendStatus,
}

/// Capability set every backend must provide. All operations must be
/// idempotent: `remove` on an already-removed artifact, `stop` on an
/// already-stopped process, and `enable_firewall_port` on an already-open
/// port must all return `Ok(())`.
#[async_trait]
pub trait ProcessManager: Send + Sync {
    async fn create(&self, spec: &NodeSpec) -> Result<(), ProcessManagerError>;
    async fn start(&self, node: &Node) -> Result<(), ProcessManagerError>;
    async fn stop(&self, node: &Node) -> Result<(), ProcessManagerError>;
    async fn restart(&self, node: &Node) -> Result<(), ProcessManagerError>;
    async fn remove(&self, node: &Node) -> Result<(), ProcessManagerError>;
    async fn status(&self, node: &Node) -> Result<ProcessStatus, ProcessManagerError>;
    async fn survey(&self, config: &MachineConfig) -> Result<Vec<NodeSpec>, ProcessManagerError>;
    async fn enable_firewall_port(&self, port: u32) -> Result<(), ProcessManagerError>;
    async fn disable_firewall_port(&self, port: u32) -> Result<(), ProcessManagerError>;
}

/// Picks the right backend instance for a node's `manager_type`. Each
/// backend holds only its own state; there is no global process-manager
/// singleton.
pub struct ProcessManagers {
    pub systemd: SystemdProcessManager,
    pub launchd: LaunchdProcessManager,
    pub docker: DockerProcessManager,
    pub background: BackgroundProcessManager,
    pub external_cli: ExternalCliProcessManager,
}

impl ProcessManagers {
    pub fn new() -> Self {
        Self {
            systemd: SystemdProcessManager::new(),
            launchd: LaunchdProcessManager::new(),
            docker: DockerProcessManager::new(),
            background: BackgroundProcessManager::new(),
            external_cli: ExternalCliProcessManager::new(),
        }
    }

    pub fn for_node(&self, manager_type: ManagerType) -> &dyn ProcessManager {
        match manager_type {
            ManagerType::Systemd => &self.systemd,
            ManagerType::Launchd => &self.launchd,
            ManagerType::Docker => &self.docker,
            ManagerType::Background => &self.background,
            ManagerType::ExternalCli => &self.external_cli,
        }
    }
}

impl Default for ProcessManagers {
    fn default() -> Self {
        Self::new()
    }
}
