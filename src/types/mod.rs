mod action;
mod machine;
mod metrics;
mod node;
mod node_id;
mod node_status;
mod run_flags;

pub use action::{Action, ActionKind, RemoveTarget};
pub use machine::{MachineConfig, NodeRemovalStrategy};
pub use metrics::Metrics;
pub use node::{ManagerType, Node};
pub use node_id::NodeId;
pub use node_status::{BackendStatus, NodeStatus};
pub use run_flags::RunFlags;
