//! Persistent storage for the `Machine` singleton and the `Node` table.
//!
//! Backed by SQLite via `sqlx`: a pool wrapped for serialized access and
//! `sqlx::migrate::Migrator` for schema setup.

use crate::types::{ManagerType, MachineConfig, Node, NodeId, NodeRemovalStrategy, NodeStatus};
use sqlx::{Row, Sqlite, SqlitePool, migrate::Migrator, sqlite::SqliteConnectOptions};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("machine row not found; re-run with --init to create one")]
    MachineNotFound,
    #[error("node {0} not found")]
    NodeNotFound(NodeId),
}

type Result<T> = std::result::Result<T, StoreError>;

#[derive(Clone)]
pub struct Store {
    pool: Arc<Mutex<SqlitePool>>,
}

impl Store {
    pub async fn connect(db_path: &str) -> Result<Self> {
        let opts = SqliteConnectOptions::from_str(db_path)?.create_if_missing(true);
        let pool = SqlitePool::connect_with(opts).await?;
        MIGRATOR.run(&pool).await?;
        Ok(Self {
            pool: Arc::new(Mutex::new(pool)),
        })
    }

    /// A throwaway SQLite-in-memory store, migrated the same as a real one.
    /// Used by this crate's own unit tests and by `tests/decision_scenarios.rs`.
    pub async fn connect_in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    pub async fn get_machine(&self) -> Result<MachineConfig> {
        let pool = self.pool.lock().await;
        let row = sqlx::query("SELECT * FROM machine WHERE id = 1")
            .fetch_optional(&*pool)
            .await?
            .ok_or(StoreError::MachineNotFound)?;
        Ok(machine_from_row(&row))
    }

    pub async fn machine_exists(&self) -> Result<bool> {
        let pool = self.pool.lock().await;
        let row = sqlx::query("SELECT id FROM machine WHERE id = 1")
            .fetch_optional(&*pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn init_machine(&self, cfg: &MachineConfig) -> Result<()> {
        let pool = self.pool.lock().await;
        sqlx::query(
            "INSERT OR REPLACE INTO machine (
                id, cpu_count, node_cap, cpu_less_than, cpu_remove, mem_less_than, mem_remove,
                hd_less_than, hd_remove, hdio_read_less_than, hdio_read_remove,
                hdio_write_less_than, hdio_write_remove, netio_read_less_than, netio_read_remove,
                netio_write_less_than, netio_write_remove, desired_load_average,
                max_load_average_allowed, delay_start, delay_restart, delay_upgrade, delay_remove,
                node_storage, rewards_address, donate_address, port_start, metrics_port_start,
                crisis_bytes, host, environment, start_args, last_stopped_at,
                max_concurrent_upgrades, max_concurrent_starts, max_concurrent_removals,
                max_concurrent_operations, node_removal_strategy, highest_node_id_used
            ) VALUES (1, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(cfg.cpu_count)
        .bind(cfg.node_cap)
        .bind(cfg.cpu_less_than)
        .bind(cfg.cpu_remove)
        .bind(cfg.mem_less_than)
        .bind(cfg.mem_remove)
        .bind(cfg.hd_less_than)
        .bind(cfg.hd_remove)
        .bind(cfg.hdio_read_less_than as i64)
        .bind(cfg.hdio_read_remove as i64)
        .bind(cfg.hdio_write_less_than as i64)
        .bind(cfg.hdio_write_remove as i64)
        .bind(cfg.netio_read_less_than as i64)
        .bind(cfg.netio_read_remove as i64)
        .bind(cfg.netio_write_less_than as i64)
        .bind(cfg.netio_write_remove as i64)
        .bind(cfg.desired_load_average)
        .bind(cfg.max_load_average_allowed)
        .bind(cfg.delay_start)
        .bind(cfg.delay_restart)
        .bind(cfg.delay_upgrade)
        .bind(cfg.delay_remove)
        .bind(&cfg.node_storage)
        .bind(&cfg.rewards_address)
        .bind(&cfg.donate_address)
        .bind(cfg.port_start)
        .bind(cfg.metrics_port_start)
        .bind(cfg.crisis_bytes as i64)
        .bind(&cfg.host)
        .bind(&cfg.environment)
        .bind(&cfg.start_args)
        .bind(cfg.last_stopped_at)
        .bind(cfg.max_concurrent_upgrades)
        .bind(cfg.max_concurrent_starts)
        .bind(cfg.max_concurrent_removals)
        .bind(cfg.max_concurrent_operations)
        .bind("youngest")
        .bind(cfg.highest_node_id_used.map(|v| v as i64))
        .execute(&*pool)
        .await?;
        Ok(())
    }

    pub async fn set_last_stopped_at(&self, ts: i64) -> Result<()> {
        let pool = self.pool.lock().await;
        sqlx::query("UPDATE machine SET last_stopped_at = ? WHERE id = 1")
            .bind(ts)
            .execute(&*pool)
            .await?;
        Ok(())
    }

    pub async fn set_highest_node_id_used(&self, id: u64) -> Result<()> {
        let pool = self.pool.lock().await;
        sqlx::query("UPDATE machine SET highest_node_id_used = ? WHERE id = 1")
            .bind(id as i64)
            .execute(&*pool)
            .await?;
        Ok(())
    }

    pub async fn max_existing_node_id(&self) -> Result<Option<u64>> {
        let pool = self.pool.lock().await;
        let row = sqlx::query("SELECT MAX(id) as max_id FROM node")
            .fetch_one(&*pool)
            .await?;
        let max_id: Option<i64> = row.try_get("max_id")?;
        Ok(max_id.map(|v| v as u64))
    }

    pub async fn all_nodes(&self) -> Result<Vec<Node>> {
        let pool = self.pool.lock().await;
        let rows = sqlx::query("SELECT * FROM node ORDER BY id ASC")
            .fetch_all(&*pool)
            .await?;
        rows.iter().map(node_from_row).collect()
    }

    pub async fn get_node(&self, id: NodeId) -> Result<Node> {
        let pool = self.pool.lock().await;
        let row = sqlx::query("SELECT * FROM node WHERE id = ?")
            .bind(id.0 as i64)
            .fetch_optional(&*pool)
            .await?
            .ok_or(StoreError::NodeNotFound(id))?;
        node_from_row(&row)
    }

    pub async fn insert_node(&self, node: &Node) -> Result<()> {
        let pool = self.pool.lock().await;
        sqlx::query(
            "INSERT INTO node (
                id, node_name, service, manager_type, user, binary, version, root_dir, port,
                metrics_port, network, wallet, peer_id, status, timestamp, records, uptime,
                shunned, age, host
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(node.id.0 as i64)
        .bind(&node.node_name)
        .bind(&node.service)
        .bind(node.manager_type.as_db_str())
        .bind(&node.user)
        .bind(&node.binary)
        .bind(node.version.as_ref().map(|v| v.to_string()))
        .bind(&node.root_dir)
        .bind(node.port as i64)
        .bind(node.metrics_port as i64)
        .bind(&node.network)
        .bind(&node.wallet)
        .bind(&node.peer_id)
        .bind(node.status.as_db_str())
        .bind(node.timestamp)
        .bind(node.records as i64)
        .bind(node.uptime as i64)
        .bind(node.shunned as i64)
        .bind(node.age)
        .bind(&node.host)
        .execute(&*pool)
        .await?;
        Ok(())
    }

    /// Upserts a node row wholesale, keyed on `id`. Used by the Surveyor's
    /// reconciliation pass, where a rediscovered node's backend-reported
    /// fields should replace whatever was last persisted.
    pub async fn replace_node(&self, node: &Node) -> Result<()> {
        let pool = self.pool.lock().await;
        sqlx::query(
            "INSERT OR REPLACE INTO node (
                id, node_name, service, manager_type, user, binary, version, root_dir, port,
                metrics_port, network, wallet, peer_id, status, timestamp, records, uptime,
                shunned, age, host
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(node.id.0 as i64)
        .bind(&node.node_name)
        .bind(&node.service)
        .bind(node.manager_type.as_db_str())
        .bind(&node.user)
        .bind(&node.binary)
        .bind(node.version.as_ref().map(|v| v.to_string()))
        .bind(&node.root_dir)
        .bind(node.port as i64)
        .bind(node.metrics_port as i64)
        .bind(&node.network)
        .bind(&node.wallet)
        .bind(&node.peer_id)
        .bind(node.status.as_db_str())
        .bind(node.timestamp)
        .bind(node.records as i64)
        .bind(node.uptime as i64)
        .bind(node.shunned as i64)
        .bind(node.age)
        .bind(&node.host)
        .execute(&*pool)
        .await?;
        Ok(())
    }

    pub async fn update_node_status(&self, id: NodeId, status: NodeStatus, timestamp: i64) -> Result<()> {
        let pool = self.pool.lock().await;
        sqlx::query("UPDATE node SET status = ?, timestamp = ? WHERE id = ?")
            .bind(status.as_db_str())
            .bind(timestamp)
            .bind(id.0 as i64)
            .execute(&*pool)
            .await?;
        Ok(())
    }

    pub async fn update_node_version(&self, id: NodeId, version: &semver::Version) -> Result<()> {
        let pool = self.pool.lock().await;
        sqlx::query("UPDATE node SET version = ? WHERE id = ?")
            .bind(version.to_string())
            .bind(id.0 as i64)
            .execute(&*pool)
            .await?;
        Ok(())
    }

    pub async fn update_node_metrics(
        &self,
        id: NodeId,
        status: NodeStatus,
        records: u64,
        uptime: u64,
        shunned: u64,
        peer_id: &str,
    ) -> Result<()> {
        let pool = self.pool.lock().await;
        sqlx::query(
            "UPDATE node SET status = ?, timestamp = ?, records = ?, uptime = ?, shunned = ?, peer_id = ? WHERE id = ?",
        )
        .bind(status.as_db_str())
        .bind(chrono::Utc::now().timestamp())
        .bind(records as i64)
        .bind(uptime as i64)
        .bind(shunned as i64)
        .bind(peer_id)
        .bind(id.0 as i64)
        .execute(&*pool)
        .await?;
        Ok(())
    }

    pub async fn delete_node(&self, id: NodeId) -> Result<()> {
        let pool = self.pool.lock().await;
        sqlx::query("DELETE FROM node WHERE id = ?")
            .bind(id.0 as i64)
            .execute(&*pool)
            .await?;
        Ok(())
    }
}

fn machine_from_row(row: &sqlx::sqlite::SqliteRow) -> MachineConfig {
    let highest_node_id_used: Option<i64> = row.try_get("highest_node_id_used").ok().flatten();
    MachineConfig {
        cpu_count: row.get::<i64, _>("cpu_count") as u32,
        node_cap: row.get::<i64, _>("node_cap") as u32,
        cpu_less_than: row.get::<i64, _>("cpu_less_than") as u32,
        cpu_remove: row.get::<i64, _>("cpu_remove") as u32,
        mem_less_than: row.get::<i64, _>("mem_less_than") as u32,
        mem_remove: row.get::<i64, _>("mem_remove") as u32,
        hd_less_than: row.get::<i64, _>("hd_less_than") as u32,
        hd_remove: row.get::<i64, _>("hd_remove") as u32,
        hdio_read_less_than: row.get::<i64, _>("hdio_read_less_than") as u64,
        hdio_read_remove: row.get::<i64, _>("hdio_read_remove") as u64,
        hdio_write_less_than: row.get::<i64, _>("hdio_write_less_than") as u64,
        hdio_write_remove: row.get::<i64, _>("hdio_write_remove") as u64,
        netio_read_less_than: row.get::<i64, _>("netio_read_less_than") as u64,
        netio_read_remove: row.get::<i64, _>("netio_read_remove") as u64,
        netio_write_less_than: row.get::<i64, _>("netio_write_less_than") as u64,
        netio_write_remove: row.get::<i64, _>("netio_write_remove") as u64,
        desired_load_average: row.get("desired_load_average"),
        max_load_average_allowed: row.get("max_load_average_allowed"),
        delay_start: row.get("delay_start"),
        delay_restart: row.get("delay_restart"),
        delay_upgrade: row.get("delay_upgrade"),
        delay_remove: row.get("delay_remove"),
        node_storage: row.get("node_storage"),
        rewards_address: row.get("rewards_address"),
        donate_address: row.get("donate_address"),
        port_start: row.get::<i64, _>("port_start") as u32,
        metrics_port_start: row.get::<i64, _>("metrics_port_start") as u32,
        crisis_bytes: row.get::<i64, _>("crisis_bytes") as u64,
        host: row.get("host"),
        environment: row.get("environment"),
        start_args: row.get("start_args"),
        last_stopped_at: row.get("last_stopped_at"),
        max_concurrent_upgrades: row.get::<i64, _>("max_concurrent_upgrades") as u32,
        max_concurrent_starts: row.get::<i64, _>("max_concurrent_starts") as u32,
        max_concurrent_removals: row.get::<i64, _>("max_concurrent_removals") as u32,
        max_concurrent_operations: row.get::<i64, _>("max_concurrent_operations") as u32,
        node_removal_strategy: NodeRemovalStrategy::Youngest,
        highest_node_id_used: highest_node_id_used.map(|v| v as u64),
    }
}

fn node_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Node> {
    let version: Option<String> = row.try_get("version").ok().flatten();
    let status_str: String = row.get("status");
    let manager_type_str: String = row.get("manager_type");
    Ok(Node {
        id: NodeId(row.get::<i64, _>("id") as u64),
        node_name: row.get("node_name"),
        service: row.get("service"),
        manager_type: ManagerType::from_str(&manager_type_str)
            .map_err(|e| StoreError::Sqlx(sqlx::Error::Decode(Box::new(e))))?,
        user: row.get("user"),
        binary: row.get("binary"),
        version: version.and_then(|v| semver::Version::parse(&v).ok()),
        root_dir: row.get("root_dir"),
        port: row.get::<i64, _>("port") as u32,
        metrics_port: row.get::<i64, _>("metrics_port") as u32,
        network: row.get("network"),
        wallet: row.get("wallet"),
        peer_id: row.get("peer_id"),
        status: NodeStatus::from_str(&status_str)
            .map_err(|e| StoreError::Sqlx(sqlx::Error::Decode(Box::new(e))))?,
        timestamp: row.get("timestamp"),
        records: row.get::<i64, _>("records") as u64,
        uptime: row.get::<i64, _>("uptime") as u64,
        shunned: row.get::<i64, _>("shunned") as u64,
        age: row.get("age"),
        host: row.get("host"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_node(id: u64) -> Node {
        Node {
            id: NodeId(id),
            node_name: format!("{id:04}"),
            service: format!("antnode{id:04}.service"),
            manager_type: ManagerType::Systemd,
            user: "ant".to_string(),
            binary: "/bin/antnode".to_string(),
            version: None,
            root_dir: "/var/antctl/services/antnode0001".to_string(),
            port: 55_000 + id as u32,
            metrics_port: 13_000 + id as u32,
            network: "evm-arbitrum-one".to_string(),
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

    #[tokio::test]
    async fn test_init_and_get_machine_round_trips() {
        let store = Store::connect_in_memory().await.unwrap();
        assert!(!store.machine_exists().await.unwrap());
        let cfg = MachineConfig::defaults(4, "0xabc".to_string());
        store.init_machine(&cfg).await.unwrap();
        assert!(store.machine_exists().await.unwrap());
        let loaded = store.get_machine().await.unwrap();
        assert_eq!(loaded.node_cap, cfg.node_cap);
        assert_eq!(loaded.port_start, cfg.port_start);
    }

    #[tokio::test]
    async fn test_insert_get_delete_node() {
        let store = Store::connect_in_memory().await.unwrap();
        let node = sample_node(1);
        store.insert_node(&node).await.unwrap();
        let loaded = store.get_node(NodeId(1)).await.unwrap();
        assert_eq!(loaded.service, node.service);
        store.delete_node(NodeId(1)).await.unwrap();
        assert!(matches!(
            store.get_node(NodeId(1)).await,
            Err(StoreError::NodeNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_replace_node_upserts_existing_row() {
        let store = Store::connect_in_memory().await.unwrap();
        store.insert_node(&sample_node(1)).await.unwrap();
        let mut updated = sample_node(1);
        updated.status = NodeStatus::Dead;
        updated.peer_id = "12D3KooW".to_string();
        store.replace_node(&updated).await.unwrap();
        let loaded = store.get_node(NodeId(1)).await.unwrap();
        assert_eq!(loaded.status, NodeStatus::Dead);
        assert_eq!(loaded.peer_id, "12D3KooW");
        assert_eq!(store.all_nodes().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_node_id_allocation_seeds_from_max_existing() {
        let store = Store::connect_in_memory().await.unwrap();
        assert_eq!(store.max_existing_node_id().await.unwrap(), None);
        store.insert_node(&sample_node(3)).await.unwrap();
        store.insert_node(&sample_node(7)).await.unwrap();
        assert_eq!(store.max_existing_node_id().await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn test_update_node_status_persists() {
        let store = Store::connect_in_memory().await.unwrap();
        store.insert_node(&sample_node(1)).await.unwrap();
        store
            .update_node_status(NodeId(1), NodeStatus::Restarting, 1_234)
            .await
            .unwrap();
        let loaded = store.get_node(NodeId(1)).await.unwrap();
        assert_eq!(loaded.status, NodeStatus::Restarting);
        assert_eq!(loaded.timestamp, 1_234);
    }
}
