use super::NodeId;

/// Why a node was chosen as a removal victim, set by the Decision engine
/// at the point it picked the node, so the Executor never has to infer it
/// by string-matching `reason`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RemoveTarget {
    Dead,
    Stopped,
    Running,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ActionKind {
    ResurveyNodes,
    RemoveNode { target: NodeId, reason: RemoveTarget },
    StopNode { target: NodeId },
    UpgradeNode { target: NodeId },
    StartNode { target: NodeId },
    AddNode,
    SurveyNodes,
}

/// A single lifecycle action chosen by the Decision engine. `priority` is
/// the 1-8 rule number that produced it (lower fires first); `reason` is a
/// short human-readable explanation for logs.
#[derive(Clone, Debug)]
pub struct Action {
    pub kind: ActionKind,
    pub priority: u8,
    pub reason: String,
}

impl Action {
    pub fn new(kind: ActionKind, priority: u8, reason: impl Into<String>) -> Self {
        Self {
            kind,
            priority,
            reason: reason.into(),
        }
    }

    pub fn target_id(&self) -> Option<NodeId> {
        match &self.kind {
            ActionKind::RemoveNode { target, .. }
            | ActionKind::StopNode { target }
            | ActionKind::UpgradeNode { target }
            | ActionKind::StartNode { target } => Some(*target),
            ActionKind::ResurveyNodes | ActionKind::AddNode | ActionKind::SurveyNodes => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_id_present_for_node_scoped_actions() {
        let a = Action::new(
            ActionKind::RemoveNode {
                target: NodeId(7),
                reason: RemoveTarget::Dead,
            },
            2,
            "dead",
        );
        assert_eq!(a.target_id(), Some(NodeId(7)));
    }

    #[test]
    fn test_target_id_absent_for_fleet_wide_actions() {
        let a = Action::new(ActionKind::AddNode, 7, "spare capacity");
        assert_eq!(a.target_id(), None);
        let a = Action::new(ActionKind::SurveyNodes, 8, "idle");
        assert_eq!(a.target_id(), None);
    }
}
