//! Top-level entry point: acquire the lock, load/adopt the Machine row,
//! run Metrics Collector → Delay Updater → Decision → Executor, release
//! the lock on every exit path.

use crate::config;
use crate::decision;
use crate::delay_updater::DelayUpdater;
use crate::executor::Executor;
use crate::id_allocator;
use crate::lockfile::LockGuard;
use crate::metrics_client::read_antnode_binary_version;
use crate::metrics_collector::MetricsCollector;
use crate::process_manager::ProcessManagers;
use crate::store::Store;
use crate::surveyor::Surveyor;
use crate::types::{MachineConfig, RunFlags};
use eyre::{Context, Result};
use tracing::{debug, info, warn};

const LOCK_PATH: &str = "/var/antctl/wnm_active";

pub async fn run(flags: RunFlags, db_path: &str, rewards_address_override: Option<String>) -> Result<i32> {
    let _lock = LockGuard::acquire(LOCK_PATH).wrap_err("another run is already active")?;

    let store = Store::connect(db_path).await.wrap_err("connecting to the node store")?;
    let managers = ProcessManagers::new();

    let mut config = if store.machine_exists().await.wrap_err("checking for an existing Machine row")? {
        store.get_machine().await.wrap_err("loading the Machine row")?
    } else if flags.init || flags.migrate_anm {
        let cpu_count = num_cpus();
        let rewards_address = rewards_address_override.clone().unwrap_or_default();
        let mut defaults = MachineConfig::defaults(cpu_count, rewards_address);
        config::apply_env_overrides(&mut defaults);
        store.init_machine(&defaults).await.wrap_err("initializing the Machine row")?;
        if flags.migrate_anm {
            adopt_existing_fleet(&store, &managers, &defaults).await?;
        }
        defaults
    } else {
        eyre::bail!("no Machine row found; re-run with --init to create one");
    };

    if let Some(addr) = rewards_address_override {
        config.rewards_address = addr;
    }

    if flags.teardown {
        return teardown(&store, &managers, &config, flags.confirm).await;
    }

    id_allocator::ensure_seeded(&store, &mut config).await.wrap_err("seeding the node-id allocator")?;

    let mut nodes = store.all_nodes().await.wrap_err("loading the node table")?;
    let metrics_collector = MetricsCollector::new();
    let mut metrics = metrics_collector
        .collect(&config, &nodes)
        .await
        .wrap_err("collecting host and fleet metrics")?;
    debug!(metrics = %serde_json::to_string(&metrics).unwrap_or_default(), "collected metrics snapshot");

    if metrics.nodes_no_version > 1 {
        resolve_missing_versions(&store, &mut nodes).await?;
    }

    let now = chrono::Utc::now().timestamp();
    let delay_updater = DelayUpdater::new();
    delay_updater
        .run(&store, &config, &nodes, &mut metrics, now)
        .await
        .wrap_err("aging transitional node rows")?;
    let nodes = store.all_nodes().await.wrap_err("reloading node table after delay updates")?;

    let actions = decision::decide(&config, &metrics, &nodes, now);
    info!(count = actions.len(), "decision engine produced actions");

    let executor = Executor::new(&store, &managers, flags.dry_run);
    let outcome = executor
        .run(actions, &mut config, metrics.system_start, now)
        .await
        .wrap_err("executing decided actions")?;

    if let Some(result) = &outcome {
        info!(applied = result.applied, detail = %result.detail, "run outcome");
    }

    Ok(0)
}

async fn resolve_missing_versions(store: &Store, nodes: &mut [crate::types::Node]) -> Result<()> {
    for node in nodes.iter_mut().filter(|n| !n.has_version()) {
        if let Some(version) = read_antnode_binary_version(&node.binary).await {
            store
                .update_node_version(node.id, &version)
                .await
                .wrap_err("writing a recovered node version")?;
            node.version = Some(version);
        }
    }
    Ok(())
}

async fn adopt_existing_fleet(store: &Store, managers: &ProcessManagers, config: &MachineConfig) -> Result<()> {
    let surveyor = Surveyor::new();
    let discovered = surveyor.survey_all(managers, config).await;
    info!(count = discovered.len(), "adopted nodes from on-host survey");
    for node in discovered {
        store.insert_node(&node).await.wrap_err("inserting a surveyed node")?;
    }
    Ok(())
}

async fn teardown(store: &Store, managers: &ProcessManagers, config: &MachineConfig, confirm: bool) -> Result<i32> {
    if !confirm {
        eyre::bail!("--teardown requires --confirm");
    }
    let nodes = store.all_nodes().await.wrap_err("loading node table for teardown")?;
    for node in &nodes {
        if let Err(err) = managers.for_node(node.manager_type).remove(node).await {
            warn!(node = %node.id, error = %err, "teardown: backend remove failed, continuing");
        }
        store.delete_node(node.id).await.wrap_err("removing node row during teardown")?;
    }
    // The id/port space resets along with the fleet; this is the one place
    // highest_node_id_used is allowed to decrease (see DESIGN.md).
    store.set_highest_node_id_used(0).await.wrap_err("resetting the node-id high-water mark")?;
    let _ = config;
    Ok(0)
}

fn num_cpus() -> u32 {
    sysinfo::System::new_all().cpus().len().max(1) as u32
}
