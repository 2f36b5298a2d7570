//! Ages transitional rows before the Decision engine sees fleet state.
//!
//! REMOVING rows past their delay are deleted outright; UPGRADING/
//! RESTARTING rows past theirs are re-probed and flipped back to RUNNING
//! if reachable. Rows whose delay hasn't expired are left untouched and
//! keep blocking admission.

use crate::metrics_client::MetricsClient;
use crate::store::{Store, StoreError};
use crate::types::{MachineConfig, Metrics, Node, NodeStatus};

pub struct DelayUpdater {
    metrics: MetricsClient,
}

impl DelayUpdater {
    pub fn new() -> Self {
        Self {
            metrics: MetricsClient::new(),
        }
    }

    /// Ages `nodes` against `config`'s delays and, for every row it mutates,
    /// decrements the matching counter on `metrics` in place — the Decision
    /// engine runs against `metrics` right after this, so a row dropped or
    /// resurrected here must not leave it counting ghosts.
    pub async fn run(
        &self,
        store: &Store,
        config: &MachineConfig,
        nodes: &[Node],
        metrics: &mut Metrics,
        now: i64,
    ) -> Result<(), StoreError> {
        for node in nodes {
            match node.status {
                NodeStatus::Removing if now - node.timestamp >= config.delay_remove => {
                    store.delete_node(node.id).await?;
                    metrics.removing_nodes = metrics.removing_nodes.saturating_sub(1);
                    metrics.total_nodes = metrics.total_nodes.saturating_sub(1);
                }
                NodeStatus::Upgrading if now - node.timestamp >= config.delay_upgrade => {
                    if self.maybe_resurrect(store, node, now).await? {
                        metrics.upgrading_nodes = metrics.upgrading_nodes.saturating_sub(1);
                        metrics.running_nodes += 1;
                    }
                }
                NodeStatus::Restarting if now - node.timestamp >= config.delay_start => {
                    if self.maybe_resurrect(store, node, now).await? {
                        metrics.restarting_nodes = metrics.restarting_nodes.saturating_sub(1);
                        metrics.running_nodes += 1;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns whether the node was found reachable and flipped to RUNNING.
    async fn maybe_resurrect(&self, store: &Store, node: &Node, now: i64) -> Result<bool, StoreError> {
        let metadata = self.metrics.read_metadata(&node.host, node.metrics_port).await;
        if metadata.reachable {
            store.update_node_status(node.id, NodeStatus::Running, now).await?;
        }
        Ok(metadata.reachable)
    }
}

impl Default for DelayUpdater {
    fn default() -> Self {
        Self::new()
    }
}
