//! Two-level note tree.
//!
//! Notes are grouped into aligned batches of `2^sub_tree_depth`. Each
//! batch's subtree root is a leaf of the persistent tree, so the full note
//! tree is the persistent tree of depth `total_depth - sub_tree_depth` with
//! those subtrees hanging below it. Unused batches hold the root of an
//! all-zero subtree.

mod config;

#[cfg(test)]
mod tests;

use std::fmt;

use notetree_storage::Storage;
use tracing::debug;

pub use self::config::{
    DATA_TREE_DEPTH, DATA_TREE_NAME, MAX_SUB_TREE_DEPTH, NUM_NEW_DATA_TREE_NOTES_PER_TX,
    WorldStateConfig,
};
use crate::{
    Error, HashPath, MemoryMerkleTree, MerkleTree,
    hasher::{Hash, Hasher, ZERO_ELEMENT},
    tree::MAX_DEPTH,
};

/// Persistent tree of batch roots plus the lower region they summarize.
pub struct WorldState<S, H> {
    tree: MerkleTree<S, H>,
    sub_tree_depth: u32,
    total_depth: u32,
    zero_lower_path: HashPath,
}

impl<S: Storage, H: Hasher> WorldState<S, H> {
    /// Attach to the persistent tree named in `config`, creating it if
    /// needed.
    ///
    /// The default leaf of the persistent tree is the root of an all-zero
    /// lower subtree.
    pub fn new(storage: S, hasher: H, config: &WorldStateConfig) -> Result<Self, Error> {
        if config.total_depth > MAX_DEPTH || config.sub_tree_depth >= config.total_depth {
            return Err(Error::InvalidDepth {
                depth: config.total_depth,
                max: MAX_DEPTH,
            });
        }
        if config.sub_tree_depth > MAX_SUB_TREE_DEPTH {
            return Err(Error::InvalidDepth {
                depth: config.sub_tree_depth,
                max: MAX_SUB_TREE_DEPTH,
            });
        }

        let zero_notes = vec![ZERO_ELEMENT; 1usize << config.sub_tree_depth];
        let sub_tree = MemoryMerkleTree::new(&zero_notes, &hasher)?;
        let zero_lower_path = zero_hash_path(&hasher, config.sub_tree_depth);
        let upper_depth = config.upper_depth();
        debug!(
            depth = upper_depth,
            zero_element = %hex::encode(sub_tree.root()),
            "initialising data tree"
        );

        let tree = MerkleTree::open_or_create(
            storage,
            hasher,
            config.tree_name.as_str(),
            upper_depth,
            sub_tree.root(),
        )?;
        let world_state = Self {
            tree,
            sub_tree_depth: config.sub_tree_depth,
            total_depth: config.total_depth,
            zero_lower_path,
        };
        world_state.log_tree_stats();
        Ok(world_state)
    }

    /// Index of the persistent leaf covering note `index`.
    pub fn convert_index_to_subtree_index(&self, index: u64) -> u64 {
        index >> self.sub_tree_depth
    }

    /// Path of index 0 in an all-zero tree of `depth`.
    pub fn build_zero_hash_path(&self, depth: u32) -> HashPath {
        zero_hash_path(self.tree.hasher(), depth)
    }

    /// Full path of note `index`, assuming its batch is still all zero below
    /// the persistent tree.
    pub fn build_full_hash_path(&self, index: u64) -> Result<HashPath, Error> {
        self.build_full_hash_path_with(index, &self.zero_lower_path)
    }

    /// Full path of note `index` given the path within its batch.
    pub fn build_full_hash_path_with(
        &self,
        index: u64,
        lower_path: &HashPath,
    ) -> Result<HashPath, Error> {
        let upper = self
            .tree
            .hash_path(self.convert_index_to_subtree_index(index))?;
        Ok(HashPath::concat(lower_path, &upper))
    }

    /// Record the batch root `value` for the batch containing note `index`.
    pub fn insert_element(&mut self, index: u64, value: Hash) -> Result<Hash, Error> {
        let root = self
            .tree
            .update_element(self.convert_index_to_subtree_index(index), value)?;
        self.log_tree_stats();
        Ok(root)
    }

    /// Record consecutive batch roots starting at the batch containing note
    /// `start`.
    pub fn insert_elements(&mut self, start: u64, values: &[Hash]) -> Result<Hash, Error> {
        let root = self
            .tree
            .update_elements(self.convert_index_to_subtree_index(start), values)?;
        self.log_tree_stats();
        Ok(root)
    }

    /// Path of persistent leaf `subtree_index`.
    pub fn hash_path(&self, subtree_index: u64) -> Result<HashPath, Error> {
        self.tree.hash_path(subtree_index)
    }

    /// Root of the whole note tree.
    pub fn root(&self) -> Hash {
        self.tree.root()
    }

    /// Number of persistent leaves in use.
    pub fn size(&self) -> u64 {
        self.tree.size()
    }

    /// Depth of the lower region.
    pub fn sub_tree_depth(&self) -> u32 {
        self.sub_tree_depth
    }

    /// Depth of the composed tree.
    pub fn total_depth(&self) -> u32 {
        self.total_depth
    }

    /// The persistent tree.
    pub fn tree(&self) -> &MerkleTree<S, H> {
        &self.tree
    }

    /// Pick up commits made through another instance.
    pub fn sync_from_db(&mut self) -> Result<(), Error> {
        self.tree.sync_from_db()
    }

    fn log_tree_stats(&self) {
        debug!(size = self.tree.size(), "data size");
        debug!(root = %hex::encode(self.tree.root()), "data root");
    }
}

impl<S, H> fmt::Debug for WorldState<S, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorldState")
            .field("tree", &self.tree)
            .field("sub_tree_depth", &self.sub_tree_depth)
            .field("total_depth", &self.total_depth)
            .finish_non_exhaustive()
    }
}

fn zero_hash_path<H: Hasher>(hasher: &H, depth: u32) -> HashPath {
    let mut current = ZERO_ELEMENT;
    let mut data = Vec::with_capacity(depth as usize);
    for _ in 0..depth {
        data.push((current, current));
        current = hasher.compress(&current, &current);
    }
    HashPath::new(data)
}
