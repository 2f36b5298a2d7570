use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable integer identity for a node, assigned once by the allocator and
/// never reused (see `id_allocator`).
#[derive(
    Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Zero-padded string form, e.g. `0007`.
    pub fn node_name(&self) -> String {
        format!("{:04}", self.0)
    }

    pub fn service_name(&self) -> String {
        format!("antnode{}.service", self.node_name())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_name_zero_padded() {
        assert_eq!(NodeId(7).node_name(), "0007");
        assert_eq!(NodeId(12345).node_name(), "12345");
    }

    #[test]
    fn test_service_name() {
        assert_eq!(NodeId(7).service_name(), "antnode0007.service");
    }
}
