use serde::{Deserialize, Serialize};

/// Invocation flags passed into a run; the surrounding CLI/argv parsing is
/// out of scope for the core, but the resolved struct is what it consumes.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RunFlags {
    /// Initialize a fresh Machine row if none exists.
    pub init: bool,
    /// Adopt state from the legacy `anm` tool's on-host layout.
    pub migrate_anm: bool,
    /// Tear down every managed node.
    pub teardown: bool,
    /// Confirm a teardown without an interactive prompt.
    pub confirm: bool,
    /// Plan and log actions but perform no Store writes or ProcessManager
    /// side effects.
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_a_plain_run() {
        let flags = RunFlags::default();
        assert!(!flags.init);
        assert!(!flags.dry_run);
        assert!(!flags.teardown);
    }
}
