//! Persistent sparse Merkle tree of fixed-size notes.
//!
//! A tree of fixed depth `d` has `2^d` leaf slots, each holding a 32-byte
//! hash. Slots that were never written hold the tree's default leaf, so an
//! empty tree costs nothing to store: interior nodes are content-addressed by
//! their hash and only the populated part of the tree is ever persisted.
//!
//! - [`MerkleTree`] is the persistent tree. Single leaves are written by
//!   rewriting one root-to-leaf path; aligned runs of leaves are written as
//!   whole subtrees, each stored as a single flattened blob.
//! - [`MemoryMerkleTree`] is a small dense tree built entirely in memory,
//!   used to derive default leaves and lower-level paths.
//! - [`WorldState`] composes both: the persistent tree indexes per-batch
//!   subtree roots, the memory tree describes what sits below them.
//!
//! All mutations are committed through one atomic
//! [`StorageBatch`](notetree_storage::StorageBatch) each, so a reader never
//! observes a meta record pointing at nodes that are not yet written.

#![warn(missing_docs)]

mod error;
mod hash_path;
pub mod hasher;
mod memory_tree;
mod tree;
mod world_state;

#[cfg(test)]
pub(crate) mod test_utils;

pub use error::Error;
pub use hash_path::HashPath;
pub use hasher::{Blake3Hasher, Hash, Hasher, ZERO_ELEMENT};
pub use memory_tree::MemoryMerkleTree;
pub use notetree_storage as storage;
pub use tree::{MAX_DEPTH, MerkleTree};
pub use world_state::{
    DATA_TREE_DEPTH, DATA_TREE_NAME, MAX_SUB_TREE_DEPTH, NUM_NEW_DATA_TREE_NOTES_PER_TX,
    WorldState, WorldStateConfig,
};
