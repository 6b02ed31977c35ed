//! World state configuration.

/// Depth of the full note tree, lower region included.
pub const DATA_TREE_DEPTH: u32 = 32;

/// Notes each transaction adds to the data tree.
pub const NUM_NEW_DATA_TREE_NOTES_PER_TX: u32 = 2;

/// Deepest lower region. Its all-zero root is built in memory.
pub const MAX_SUB_TREE_DEPTH: u32 = 16;

/// Name the data tree's meta record is stored under.
pub const DATA_TREE_NAME: &str = "data";

/// Shape of a [`WorldState`](super::WorldState).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorldStateConfig {
    /// Name of the persistent tree.
    pub tree_name: String,
    /// Depth of the composed tree.
    pub total_depth: u32,
    /// Depth of the lower region whose roots become persistent leaves.
    pub sub_tree_depth: u32,
}

impl WorldStateConfig {
    /// Config for the data tree with the given lower region depth.
    pub fn with_sub_tree_depth(sub_tree_depth: u32) -> Self {
        Self {
            sub_tree_depth,
            ..Self::default()
        }
    }

    /// Depth of the persistent tree.
    pub fn upper_depth(&self) -> u32 {
        self.total_depth.saturating_sub(self.sub_tree_depth)
    }
}

impl Default for WorldStateConfig {
    fn default() -> Self {
        Self {
            tree_name: DATA_TREE_NAME.to_string(),
            total_depth: DATA_TREE_DEPTH,
            sub_tree_depth: 0,
        }
    }
}
