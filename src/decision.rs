//! The reconciliation core: a pure function from fleet state to an ordered
//! list of actions. No I/O, no clock reads — every dynamic quantity it
//! needs (`now`, host metrics, the node list) is passed in by the caller.
//! Rules are tried in priority order and the first one that fires wins.

use crate::types::{Action, ActionKind, MachineConfig, Metrics, Node, NodeStatus, RemoveTarget};

/// Runs the priority-ordered rule search and returns the actions for this
/// pass. Rule 3 (missing-version metadata fix) is not represented here: it
/// requires probing node binaries, so it runs as an I/O step in the
/// supervisor before `decide` is called, against a node list that already
/// reflects its writes.
pub fn decide(config: &MachineConfig, metrics: &Metrics, nodes: &[Node], now: i64) -> Vec<Action> {
    // Rule 1: reboot detected.
    if metrics.system_start > config.last_stopped_at {
        return vec![Action::new(
            ActionKind::ResurveyNodes,
            1,
            "host rebooted since last run",
        )];
    }

    // Rule 2: dead nodes.
    if metrics.dead_nodes > 1 {
        let actions = nodes
            .iter()
            .filter(|n| n.status.is_dead())
            .map(|n| Action::new(ActionKind::RemoveNode { target: n.id, reason: RemoveTarget::Dead }, 2, "dead"))
            .collect();
        return clip_to_capacity(actions, config, metrics);
    }

    // Rule 4: transitional wait.
    if metrics.restarting_nodes > 0 {
        return vec![Action::new(ActionKind::SurveyNodes, 4, "waiting: nodes restarting")];
    }
    if metrics.upgrading_nodes > 0 {
        return vec![Action::new(ActionKind::SurveyNodes, 4, "waiting: nodes upgrading")];
    }

    let remove_cpu = metrics.used_cpu_percent > config.cpu_remove as f64;
    let remove_mem = metrics.used_mem_percent > config.mem_remove as f64;
    let remove_hd = metrics.used_hd_percent > config.hd_remove as f64;
    let remove_hdio = config.hdio_configured()
        && (metrics.hdio_read_bytes > config.hdio_read_remove || metrics.hdio_write_bytes > config.hdio_write_remove);
    let remove_netio = config.netio_configured()
        && (metrics.netio_read_bytes > config.netio_read_remove || metrics.netio_write_bytes > config.netio_write_remove);
    let load_not_allow = metrics.load_average_1 > config.max_load_average_allowed
        || metrics.load_average_5 > config.max_load_average_allowed
        || metrics.load_average_15 > config.max_load_average_allowed;
    let remove_pressure = load_not_allow
        || remove_cpu
        || remove_mem
        || remove_hd
        || remove_hdio
        || remove_netio
        || metrics.total_nodes > config.node_cap;

    // Rule 5: remove pressure.
    if remove_pressure {
        if remove_hd || metrics.total_nodes > config.node_cap || (metrics.nodes_to_upgrade > 0 && metrics.removing_nodes == 0) {
            let why = if remove_hd {
                "disk pressure"
            } else if metrics.total_nodes > config.node_cap {
                "node cap exceeded"
            } else {
                "clearing removal queue ahead of upgrade"
            };
            let stopped: Vec<&Node> = nodes.iter().filter(|n| n.status.is_stopped()).collect();
            let (victim, reason) = if let Some(v) = youngest(&stopped) {
                (v, RemoveTarget::Stopped)
            } else {
                let running: Vec<&Node> = nodes.iter().filter(|n| n.status.is_running()).collect();
                match youngest(&running) {
                    Some(v) => (v, RemoveTarget::Running),
                    None => return vec![Action::new(ActionKind::SurveyNodes, 5, "remove pressure but no victim available")],
                }
            };
            let actions = vec![Action::new(
                ActionKind::RemoveNode { target: victim.id, reason },
                5,
                why,
            )];
            return clip_to_capacity(actions, config, metrics);
        }

        if metrics.removing_nodes > 0 || config.last_stopped_at > now - config.delay_remove {
            return vec![Action::new(ActionKind::SurveyNodes, 5, "remove cooldown in effect")];
        }
        let running: Vec<&Node> = nodes.iter().filter(|n| n.status.is_running()).collect();
        return match youngest(&running) {
            Some(v) => clip_to_capacity(
                vec![Action::new(ActionKind::StopNode { target: v.id }, 5, "resource pressure")],
                config,
                metrics,
            ),
            None => vec![Action::new(ActionKind::SurveyNodes, 5, "resource pressure but no running node to stop")],
        };
    }

    let upgrade_available = metrics.nodes_to_upgrade >= 1
        && metrics.antnode_version >= metrics.queen_node_version
        && !remove_pressure;

    // Rule 6: upgrade.
    if upgrade_available {
        let mut candidates: Vec<&Node> = nodes
            .iter()
            .filter(|n| n.status.is_running() && n.version.as_ref() != Some(&metrics.antnode_version))
            .collect();
        candidates.sort_by(|a, b| a.age.cmp(&b.age).then(a.id.cmp(&b.id)));
        let take = (config.max_concurrent_upgrades as usize).max(1);
        let actions = candidates
            .into_iter()
            .take(take)
            .map(|n| Action::new(ActionKind::UpgradeNode { target: n.id }, 6, "newer antnode version available"))
            .collect();
        if !actions.is_empty() {
            return clip_to_capacity(actions, config, metrics);
        }
    }

    let allow_cpu = metrics.used_cpu_percent < config.cpu_less_than as f64;
    let allow_mem = metrics.used_mem_percent < config.mem_less_than as f64;
    let allow_hd = metrics.used_hd_percent < config.hd_less_than as f64;
    let allow_hdio = !config.hdio_configured()
        || (metrics.hdio_read_bytes < config.hdio_read_less_than && metrics.hdio_write_bytes < config.hdio_write_less_than);
    let allow_netio = !config.netio_configured()
        || (metrics.netio_read_bytes < config.netio_read_less_than && metrics.netio_write_bytes < config.netio_write_less_than);
    let load_allow = metrics.load_average_1 < config.desired_load_average
        && metrics.load_average_5 < config.desired_load_average
        && metrics.load_average_15 < config.desired_load_average;
    let add_new_allowed = allow_cpu
        && allow_mem
        && allow_hd
        && allow_hdio
        && allow_netio
        && metrics.running_nodes < config.node_cap
        && load_allow
        && metrics.in_flight() == 0
        && metrics.total_nodes < config.node_cap;

    // Rule 7: add new.
    if add_new_allowed {
        let mut stopped: Vec<&Node> = nodes.iter().filter(|n| n.status.is_stopped()).collect();
        stopped.sort_by(|a, b| a.age.cmp(&b.age).then(a.id.cmp(&b.id)));
        let take = (config.max_concurrent_starts as usize).max(1);
        let mut actions: Vec<Action> = stopped
            .into_iter()
            .take(take)
            .map(|n| {
                let needs_upgrade = n.version.as_ref().is_some_and(|v| *v < metrics.antnode_version);
                if needs_upgrade {
                    Action::new(ActionKind::UpgradeNode { target: n.id }, 7, "starting stopped node on an older version")
                } else {
                    Action::new(ActionKind::StartNode { target: n.id }, 7, "reviving stopped node to meet capacity")
                }
            })
            .collect();

        if actions.is_empty() && metrics.total_nodes < config.node_cap {
            actions.push(Action::new(ActionKind::AddNode, 7, "spare capacity available"));
        }

        if !actions.is_empty() {
            return clip_to_capacity(actions, config, metrics);
        }
    }

    // Rule 8: idle.
    vec![Action::new(ActionKind::SurveyNodes, 8, "idle")]
}

fn clip_to_capacity(actions: Vec<Action>, config: &MachineConfig, metrics: &Metrics) -> Vec<Action> {
    let available = config.max_concurrent_operations.saturating_sub(metrics.in_flight()) as usize;
    if available == 0 {
        return vec![Action::new(ActionKind::SurveyNodes, 0, "at global capacity")];
    }
    let mut actions = actions;
    actions.truncate(available);
    actions
}

/// `age desc`, ties broken by lower id.
fn youngest<'a>(nodes: &'a [&'a Node]) -> Option<&'a Node> {
    nodes.iter().copied().max_by(|a, b| a.age.cmp(&b.age).then(b.id.cmp(&a.id)))
}
