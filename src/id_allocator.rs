//! Node-ID allocation and the port derivation that depends on it.
//!
//! IDs are seeded from the highest existing `Node.id` (or 0), then
//! strictly incremented — never reused, never backfilled into gaps,
//! because some backends never free ports on removal.

use crate::store::{Store, StoreError};
use crate::types::MachineConfig;

/// Seeds `highest_node_id_used` on a `MachineConfig` that doesn't have one
/// yet, from the Store's current max node id (or 0 if the fleet is empty).
pub async fn ensure_seeded(store: &Store, config: &mut MachineConfig) -> Result<(), StoreError> {
    if config.highest_node_id_used.is_none() {
        let seed = store.max_existing_node_id().await?.unwrap_or(0);
        config.highest_node_id_used = Some(seed);
        store.set_highest_node_id_used(seed).await?;
    }
    Ok(())
}

/// Allocates the next node id, advancing `highest_node_id_used` in both the
/// in-memory config and the Store.
pub async fn allocate(store: &Store, config: &mut MachineConfig) -> Result<u64, StoreError> {
    let current = config.highest_node_id_used.unwrap_or(0);
    let new_id = current + 1;
    config.highest_node_id_used = Some(new_id);
    store.set_highest_node_id_used(new_id).await?;
    Ok(new_id)
}

pub fn derive_port(port_start: u32, id: u64) -> u32 {
    port_start * 1000 + id as u32
}

pub fn derive_metrics_port(metrics_port_start: u32, id: u64) -> u32 {
    metrics_port_start * 1000 + id as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ensure_seeded_uses_max_existing_id() {
        let store = Store::connect_in_memory().await.unwrap();
        let node = make_node(5);
        store.insert_node(&node).await.unwrap();
        let mut cfg = MachineConfig::defaults(4, "0xabc".to_string());
        ensure_seeded(&store, &mut cfg).await.unwrap();
        assert_eq!(cfg.highest_node_id_used, Some(5));
    }

    #[tokio::test]
    async fn test_ensure_seeded_defaults_to_zero_for_empty_fleet() {
        let store = Store::connect_in_memory().await.unwrap();
        let mut cfg = MachineConfig::defaults(4, "0xabc".to_string());
        ensure_seeded(&store, &mut cfg).await.unwrap();
        assert_eq!(cfg.highest_node_id_used, Some(0));
    }

    #[tokio::test]
    async fn test_allocate_is_monotonic_across_calls() {
        let store = Store::connect_in_memory().await.unwrap();
        let mut cfg = MachineConfig::defaults(4, "0xabc".to_string());
        ensure_seeded(&store, &mut cfg).await.unwrap();
        let first = allocate(&store, &mut cfg).await.unwrap();
        let second = allocate(&store, &mut cfg).await.unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert!(second > first);
    }

    #[test]
    fn test_port_derivation_is_deterministic() {
        assert_eq!(derive_port(55, 7), 55_007);
        assert_eq!(derive_metrics_port(13, 7), 13_007);
    }

    fn make_node(id: u64) -> crate::types::Node {
        use crate::types::{ManagerType, NodeId, NodeStatus};
        crate::types::Node {
            id: NodeId(id),
            node_name: format!("{id:04}"),
            service: format!("antnode{id:04}.service"),
            manager_type: ManagerType::Systemd,
            user: "ant".to_string(),
            binary: "/bin/antnode".to_string(),
            version: None,
            root_dir: "/tmp".to_string(),
            port: derive_port(55, id),
            metrics_port: derive_metrics_port(13, id),
            network: "net".to_string(),
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
}
