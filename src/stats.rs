/// Structural counters for one tree, accumulated since creation.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeStats {
    /// Entries added by `insert` / `try_insert`
    pub inserts: u64,
    /// Inserts rejected because the key was already present
    pub duplicate_inserts: u64,
    /// Full leaves split in two
    pub leaf_splits: u64,
    /// Full node groups split in two
    pub group_splits: u64,
    /// Full internal nodes split in two (the root included)
    pub internal_splits: u64,
    /// Splits that created a new root and grew the tree by one level
    pub root_splits: u64,
}

impl TreeStats {
    /// Emits the counters to the tracing infrastructure.
    pub fn emit_tracing(&self) {
        tracing::info!(
            target: "csb_tree::stats",
            inserts = self.inserts,
            duplicate_inserts = self.duplicate_inserts,
            leaf_splits = self.leaf_splits,
            group_splits = self.group_splits,
            internal_splits = self.internal_splits,
            root_splits = self.root_splits,
            "csb-tree stats snapshot"
        );
    }
}
