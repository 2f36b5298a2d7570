use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a managed node. See the status lifecycle diagram in
/// the data model: states are terminal unless driven onward by the executor
/// or the delay updater.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum NodeStatus {
    Running,
    #[default]
    Stopped,
    Upgrading,
    Restarting,
    Migrating,
    Removing,
    Disabled,
    Dead,
}

impl NodeStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    pub fn is_dead(&self) -> bool {
        matches!(self, Self::Dead)
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, Self::Disabled)
    }

    /// Any state expected to decay back to RUNNING/STOPPED or deletion after
    /// a configured delay.
    pub fn is_transitional(&self) -> bool {
        matches!(self, Self::Upgrading | Self::Restarting | Self::Removing)
    }

    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Stopped => "STOPPED",
            Self::Upgrading => "UPGRADING",
            Self::Restarting => "RESTARTING",
            Self::Migrating => "MIGRATING",
            Self::Removing => "REMOVING",
            Self::Disabled => "DISABLED",
            Self::Dead => "DEAD",
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

#[derive(thiserror::Error, Debug)]
#[error("unrecognized node status: {0}")]
pub struct ParseNodeStatusError(String);

impl std::str::FromStr for NodeStatus {
    type Err = ParseNodeStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "RUNNING" => Self::Running,
            "STOPPED" => Self::Stopped,
            "UPGRADING" => Self::Upgrading,
            "RESTARTING" => Self::Restarting,
            "MIGRATING" => Self::Migrating,
            "REMOVING" => Self::Removing,
            "DISABLED" => Self::Disabled,
            "DEAD" => Self::Dead,
            other => return Err(ParseNodeStatusError(other.to_string())),
        })
    }
}

/// Narrower status reported directly by a `ProcessManager::status` probe.
/// `UNKNOWN` covers any case the backend can't confidently classify.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BackendStatus {
    Running,
    Stopped,
    Dead,
    Unknown,
}
