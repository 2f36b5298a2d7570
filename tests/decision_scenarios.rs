//! End-to-end scenarios A-F from the design notes, run against a real
//! (in-memory) Store instead of hand-built `Vec<Node>` fixtures, so the
//! Store's row <-> `Node` mapping is exercised alongside the decision
//! engine's rule order. Unit-level rule coverage lives in
//! `decision.rs`'s own `#[cfg(test)]` module; this file only checks that
//! what the Store round-trips is what the engine actually needed.

use std::collections::HashMap;
use wnm::decision::decide;
use wnm::store::Store;
use wnm::types::{Action, ActionKind, MachineConfig, ManagerType, Metrics, Node, NodeId, NodeStatus, RemoveTarget};

fn config() -> MachineConfig {
    let mut cfg = MachineConfig::defaults(4, "0xabc".to_string());
    cfg.max_concurrent_operations = 5;
    cfg.node_cap = 10;
    cfg
}

fn metrics() -> Metrics {
    Metrics {
        system_start: 100,
        total_nodes: 0,
        running_nodes: 0,
        stopped_nodes: 0,
        restarting_nodes: 0,
        upgrading_nodes: 0,
        migrating_nodes: 0,
        removing_nodes: 0,
        dead_nodes: 0,
        antnode_version: semver::Version::new(0, 2, 0),
        queen_node_version: semver::Version::new(0, 2, 0),
        nodes_latest_v: 0,
        nodes_no_version: 0,
        nodes_to_upgrade: 0,
        nodes_by_version: HashMap::new(),
        used_cpu_percent: 10.0,
        used_mem_percent: 10.0,
        used_hd_percent: 10.0,
        total_hd_bytes: 100,
        load_average_1: 0.1,
        load_average_5: 0.1,
        load_average_15: 0.1,
        hdio_read_bytes: 0,
        hdio_write_bytes: 0,
        netio_read_bytes: 0,
        netio_write_bytes: 0,
        node_hd_crisis: 0,
    }
}

fn node(id: u64, status: NodeStatus, age: i64, version: Option<&str>) -> Node {
    Node {
        id: NodeId(id),
        node_name: format!("{id:04}"),
        service: format!("antnode{id:04}.service"),
        manager_type: ManagerType::Systemd,
        user: "ant".to_string(),
        binary: "/bin/antnode".to_string(),
        version: version.map(|v| semver::Version::parse(v).unwrap()),
        root_dir: "/tmp".to_string(),
        port: 55_000 + id as u32,
        metrics_port: 13_000 + id as u32,
        network: "net".to_string(),
        wallet: "0xabc".to_string(),
        peer_id: String::new(),
        status,
        timestamp: 0,
        records: 0,
        uptime: 0,
        shunned: 0,
        age,
        host: "127.0.0.1".to_string(),
    }
}

// Scenario A: empty fleet with headroom everywhere adds the first node.
#[tokio::test]
async fn scenario_a_empty_fleet_adds_first_node() {
    let store = Store::connect_in_memory().await.unwrap();
    let mut cfg = config();
    cfg.node_cap = 3;
    cfg.desired_load_average = 5.0;
    let mut m = metrics();
    m.used_cpu_percent = 30.0;
    m.used_mem_percent = 30.0;
    m.used_hd_percent = 40.0;
    m.load_average_1 = 1.0;
    m.load_average_5 = 1.0;
    m.load_average_15 = 1.0;

    let nodes = store.all_nodes().await.unwrap();
    let actions = decide(&cfg, &m, &nodes, 1_000);
    assert_eq!(actions.len(), 1);
    assert!(matches!(actions[0].kind, ActionKind::AddNode));
}

// Scenario B: a single outdated RUNNING node round-tripped through the
// Store is upgraded, not restarted or removed.
#[tokio::test]
async fn scenario_b_outdated_node_is_upgraded() {
    let store = Store::connect_in_memory().await.unwrap();
    store.insert_node(&node(5, NodeStatus::Running, 10, Some("0.1.0"))).await.unwrap();

    let cfg = config();
    let mut m = metrics();
    m.antnode_version = semver::Version::new(0, 2, 0);
    m.queen_node_version = semver::Version::new(0, 1, 0);
    m.nodes_to_upgrade = 1;
    m.used_cpu_percent = 40.0;
    m.used_hd_percent = 40.0;
    m.running_nodes = 1;
    m.total_nodes = 1;

    let nodes = store.all_nodes().await.unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].version, Some(semver::Version::new(0, 1, 0)));

    let actions = decide(&cfg, &m, &nodes, 1_000);
    assert_eq!(actions.len(), 1);
    assert!(matches!(actions[0].kind, ActionKind::UpgradeNode { target } if target == NodeId(5)));
}

// Scenario C: disk pressure removes the youngest (highest-age) of three
// RUNNING nodes stored and reloaded from the Store.
#[tokio::test]
async fn scenario_c_disk_pressure_removes_youngest_running() {
    let store = Store::connect_in_memory().await.unwrap();
    for n in [
        node(1, NodeStatus::Running, 10, Some("0.2.0")),
        node(2, NodeStatus::Running, 5, Some("0.2.0")),
        node(7, NodeStatus::Running, 50, Some("0.2.0")),
    ] {
        store.insert_node(&n).await.unwrap();
    }

    let cfg = config();
    let mut m = metrics();
    m.used_hd_percent = 95.0;

    let nodes = store.all_nodes().await.unwrap();
    let actions = decide(&cfg, &m, &nodes, 1_000);
    assert_eq!(actions.len(), 1);
    match &actions[0].kind {
        ActionKind::RemoveNode { target, reason } => {
            assert_eq!(*target, NodeId(7));
            assert_eq!(*reason, RemoveTarget::Running);
            assert_eq!(actions[0].reason, "disk pressure");
        }
        other => panic!("expected RemoveNode, got {other:?}"),
    }
}

// Scenario D: dead nodes are all removed ahead of an otherwise-eligible
// upgrade on the one surviving RUNNING node.
#[tokio::test]
async fn scenario_d_dead_nodes_removed_before_upgrade() {
    let store = Store::connect_in_memory().await.unwrap();
    for n in [
        node(2, NodeStatus::Dead, 1, None),
        node(4, NodeStatus::Dead, 2, None),
        node(1, NodeStatus::Running, 3, Some("0.1.0")),
    ] {
        store.insert_node(&n).await.unwrap();
    }

    let cfg = config();
    let mut m = metrics();
    m.dead_nodes = 2;
    m.running_nodes = 1;
    m.total_nodes = 3;
    m.antnode_version = semver::Version::new(0, 2, 0);
    m.nodes_to_upgrade = 1;

    let nodes = store.all_nodes().await.unwrap();
    let actions = decide(&cfg, &m, &nodes, 1_000);
    assert_eq!(actions.len(), 2);
    assert!(actions.iter().all(|a| matches!(
        a.kind,
        ActionKind::RemoveNode { reason: RemoveTarget::Dead, .. }
    )));
    assert!(!actions.iter().any(|a| matches!(a.kind, ActionKind::UpgradeNode { .. })));
}

// Scenario E: a detected reboot produces RESURVEY_NODES, and applying its
// Store-side effect (mirroring what the Executor does) advances
// last_stopped_at to system_start.
#[tokio::test]
async fn scenario_e_reboot_resurveys_then_advances_last_stopped_at() {
    let store = Store::connect_in_memory().await.unwrap();
    let mut cfg = config();
    cfg.last_stopped_at = 1_000 - 3_600;
    store.init_machine(&cfg).await.unwrap();

    let mut m = metrics();
    m.system_start = 1_000;

    let nodes = store.all_nodes().await.unwrap();
    let actions = decide(&cfg, &m, &nodes, 1_000);
    assert_eq!(actions.len(), 1);
    assert!(matches!(actions[0].kind, ActionKind::ResurveyNodes));

    store.set_last_stopped_at(m.system_start).await.unwrap();
    cfg.last_stopped_at = m.system_start;
    let reloaded = store.get_machine().await.unwrap();
    assert_eq!(reloaded.last_stopped_at, 1_000);
}

// Scenario F: the upgrade cap limits emission to exactly
// max_concurrent_upgrades actions even with more eligible nodes in the Store.
#[tokio::test]
async fn scenario_f_upgrade_cap_limits_emitted_actions() {
    let store = Store::connect_in_memory().await.unwrap();
    for id in 1..=8u64 {
        store.insert_node(&node(id, NodeStatus::Running, id as i64, Some("0.1.0"))).await.unwrap();
    }

    let mut cfg = config();
    cfg.max_concurrent_upgrades = 4;
    cfg.max_concurrent_operations = 8;
    let mut m = metrics();
    m.antnode_version = semver::Version::new(0, 2, 0);
    m.queen_node_version = semver::Version::new(0, 1, 0);
    m.nodes_to_upgrade = 8;
    m.running_nodes = 8;
    m.total_nodes = 8;

    let nodes = store.all_nodes().await.unwrap();
    assert_eq!(nodes.len(), 8);
    let actions = decide(&cfg, &m, &nodes, 1_000);
    assert_eq!(actions.len(), 4);
    assert!(actions.iter().all(|a| matches!(a.kind, ActionKind::UpgradeNode { .. })));
}

#[allow(dead_code)]
fn assert_action_ctor_is_public() {
    let _ = Action::new(ActionKind::SurveyNodes, 0, "unused");
}
