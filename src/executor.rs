//! Dispatches the Decision engine's ordered actions against the live
//! `ProcessManager` backends and the Store, or — in dry-run mode — logs
//! what it would have done without touching either.

use crate::id_allocator;
use crate::process_manager::{NodeSpec, ProcessManager, ProcessManagerError, ProcessManagers};
use crate::store::{Store, StoreError};
use crate::surveyor::Surveyor;
use crate::types::{Action, ActionKind, BackendStatus, MachineConfig, Node, NodeStatus};
use std::collections::HashSet;
use tracing::{info, warn};

#[derive(thiserror::Error, Debug)]
pub enum ExecutorError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Backend(#[from] ProcessManagerError),
}

/// Outcome of executing (or simulating) a single action.
#[derive(Clone, Debug)]
pub struct ExecutionResult {
    pub action: Action,
    pub applied: bool,
    pub detail: String,
}

pub struct Executor<'a> {
    store: &'a Store,
    managers: &'a ProcessManagers,
    dry_run: bool,
}

impl<'a> Executor<'a> {
    pub fn new(store: &'a Store, managers: &'a ProcessManagers, dry_run: bool) -> Self {
        Self { store, managers, dry_run }
    }

    /// Executes every action in order, stopping neither on individual
    /// failure (it logs and continues) nor on a dry-run skip. Returns the
    /// first action's result as the run's overall outcome, per the
    /// Supervisor/entry contract.
    pub async fn run(
        &self,
        actions: Vec<Action>,
        config: &mut MachineConfig,
        system_start: i64,
        now: i64,
    ) -> Result<Option<ExecutionResult>, ExecutorError> {
        let mut first = None;
        for action in actions {
            let result = self.execute_one(action, config, system_start, now).await?;
            if first.is_none() {
                first = Some(result);
            }
        }
        Ok(first)
    }

    async fn execute_one(
        &self,
        action: Action,
        config: &mut MachineConfig,
        system_start: i64,
        now: i64,
    ) -> Result<ExecutionResult, ExecutorError> {
        if self.dry_run {
            let detail = format!("would execute {:?} ({})", action.kind, action.reason);
            info!(%detail, "dry-run: skipping side effects");
            return Ok(ExecutionResult { action, applied: false, detail });
        }

        let outcome = match &action.kind {
            ActionKind::ResurveyNodes => self.resurvey_nodes(config, system_start).await,
            ActionKind::RemoveNode { target, .. } => self.remove_node(*target, now).await,
            ActionKind::StopNode { target } => self.stop_node(*target, config, now).await,
            ActionKind::UpgradeNode { target } => self.upgrade_node(*target, now).await,
            ActionKind::StartNode { target } => self.start_node(*target, now).await,
            ActionKind::AddNode => self.add_node(config, now).await,
            ActionKind::SurveyNodes => self.survey_nodes(now).await,
        };

        match outcome {
            Ok(detail) => Ok(ExecutionResult { action, applied: true, detail }),
            Err(err) => {
                warn!(error = %err, target = ?action.target_id(), ?action, "action failed; continuing to next");
                Ok(ExecutionResult { action, applied: false, detail: err.to_string() })
            }
        }
    }

    async fn fresh(&self, id: crate::types::NodeId) -> Result<Node, ExecutorError> {
        Ok(self.store.get_node(id).await?)
    }

    /// Re-discovers the on-host fleet via the `Surveyor` and reconciles the
    /// Store against it. Runs after a host reboot, when systemd/launchd/etc.
    /// state may have drifted from what was last persisted (units restarted
    /// under a different version, or artifacts removed out of band).
    async fn resurvey_nodes(&self, config: &mut MachineConfig, system_start: i64) -> Result<String, ExecutorError> {
        let surveyor = Surveyor::new();
        let discovered = surveyor.survey_all(self.managers, config).await;
        let existing = self.store.all_nodes().await?;
        let existing_ids: HashSet<_> = existing.iter().map(|n| n.id).collect();
        let discovered_ids: HashSet<_> = discovered.iter().map(|n| n.id).collect();

        for node in &discovered {
            self.store.replace_node(node).await?;
        }

        // A row the host no longer reports is promoted to DEAD rather than
        // deleted outright, so the normal removal rules clean it up next run.
        let mut vanished = 0;
        for id in existing_ids.difference(&discovered_ids) {
            if let Ok(node) = self.store.get_node(*id).await {
                if !node.status.is_dead() {
                    self.store.update_node_status(*id, NodeStatus::Dead, system_start).await?;
                    vanished += 1;
                }
            }
        }

        config.last_stopped_at = system_start;
        self.store.set_last_stopped_at(system_start).await?;
        Ok(format!(
            "resurveyed {} nodes ({vanished} vanished, marked DEAD), last_stopped_at advanced to {system_start}",
            discovered.len()
        ))
    }

    async fn remove_node(&self, target: crate::types::NodeId, now: i64) -> Result<String, ExecutorError> {
        let node = self.fresh(target).await?;
        self.managers.for_node(node.manager_type).remove(&node).await?;
        self.store.update_node_status(target, NodeStatus::Removing, now).await?;
        Ok(format!("node {target} removed by backend, marked REMOVING"))
    }

    async fn stop_node(&self, target: crate::types::NodeId, config: &mut MachineConfig, now: i64) -> Result<String, ExecutorError> {
        let node = self.fresh(target).await?;
        if !node.status.is_running() {
            return Ok(format!("node {target} already not running; skipping"));
        }
        self.managers.for_node(node.manager_type).stop(&node).await?;
        self.store.update_node_status(target, NodeStatus::Stopped, now).await?;
        config.last_stopped_at = now;
        self.store.set_last_stopped_at(now).await?;
        Ok(format!("node {target} stopped"))
    }

    async fn upgrade_node(&self, target: crate::types::NodeId, now: i64) -> Result<String, ExecutorError> {
        let node = self.fresh(target).await?;
        self.managers.for_node(node.manager_type).restart(&node).await?;
        self.store.update_node_status(target, NodeStatus::Upgrading, now).await?;
        Ok(format!("node {target} restarted for upgrade, marked UPGRADING"))
    }

    async fn start_node(&self, target: crate::types::NodeId, now: i64) -> Result<String, ExecutorError> {
        let node = self.fresh(target).await?;
        if node.status.is_running() {
            return Ok(format!("node {target} already running; skipping"));
        }
        self.managers.for_node(node.manager_type).start(&node).await?;
        self.store.update_node_status(target, NodeStatus::Restarting, now).await?;
        Ok(format!("node {target} started, marked RESTARTING"))
    }

    async fn add_node(&self, config: &mut MachineConfig, now: i64) -> Result<String, ExecutorError> {
        let id = id_allocator::allocate(self.store, config).await?;
        let port = id_allocator::derive_port(config.port_start, id);
        let metrics_port = id_allocator::derive_metrics_port(config.metrics_port_start, id);
        let node_id = crate::types::NodeId(id);
        let root_dir = format!("{}/antnode{}", config.node_storage, node_id.node_name());
        let binary = format!("{root_dir}/antnode");

        let spec = NodeSpec {
            id,
            node_name: node_id.node_name(),
            binary: binary.clone(),
            root_dir: root_dir.clone(),
            port,
            metrics_port,
            network: config.environment.clone(),
            wallet: config.rewards_address.clone(),
            host: config.host.clone(),
            environment: String::new(),
            start_args: config.start_args.clone(),
            user: "ant".to_string(),
        };

        self.managers.systemd.create(&spec).await?;

        let node = Node {
            id: node_id,
            node_name: spec.node_name,
            service: node_id.service_name(),
            manager_type: crate::types::ManagerType::Systemd,
            user: spec.user,
            binary,
            version: None,
            root_dir,
            port,
            metrics_port,
            network: spec.network,
            wallet: spec.wallet,
            peer_id: String::new(),
            status: NodeStatus::Restarting,
            timestamp: now,
            records: 0,
            uptime: 0,
            shunned: 0,
            age: now,
            host: spec.host,
        };
        self.store.insert_node(&node).await?;
        Ok(format!("node {node_id} created"))
    }

    async fn survey_nodes(&self, now: i64) -> Result<String, ExecutorError> {
        let nodes = self.store.all_nodes().await?;
        let client = crate::metrics_client::MetricsClient::new();
        let mut refreshed = 0;
        let mut promoted_dead = 0;
        for mut node in nodes.into_iter().filter(|n| !n.status.is_disabled()) {
            let metrics = client.read_metrics(&node.host, node.metrics_port).await;
            if metrics.reachable {
                self.store
                    .update_node_metrics(node.id, NodeStatus::Running, metrics.records, metrics.uptime, metrics.shunned, &node.peer_id)
                    .await?;
                refreshed += 1;
            } else if node.status.is_running() {
                let root_dir_gone = tokio::fs::metadata(&node.root_dir).await.is_err();
                let next_status = if root_dir_gone {
                    promoted_dead += 1;
                    NodeStatus::Dead
                } else {
                    match self.managers.for_node(node.manager_type).status(&node).await {
                        Ok(probe) if probe.status == BackendStatus::Dead => {
                            promoted_dead += 1;
                            NodeStatus::Dead
                        }
                        _ => NodeStatus::Stopped,
                    }
                };
                node.mark_status(next_status, now);
                self.store.update_node_status(node.id, node.status, node.timestamp).await?;
            }
        }
        Ok(format!("refreshed {refreshed} reachable nodes, promoted {promoted_dead} to DEAD"))
    }
}
