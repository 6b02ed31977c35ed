//! Writes: single leaves and aligned runs of leaves.

use notetree_storage::{Storage, StorageBatch};
use tracing::trace;

use super::{MerkleTree, is_right_child, node::Node, refs::NodeRefs};
use crate::{
    Error,
    hasher::{Hash, Hasher, ZERO_ELEMENT},
};

/// One level of a root-to-target walk, recorded top-down.
struct Frame {
    /// Hash of the child not on the path.
    sibling: Hash,
    /// The sibling's node when it only existed inside a blob being split.
    sibling_node: Option<Node>,
    is_right: bool,
}

struct Descent {
    frames: Vec<Frame>,
    /// Current hash at the stop height.
    target: Hash,
}

impl<S: Storage, H: Hasher> MerkleTree<S, H> {
    /// Set leaf `index` to `value`, or to the default leaf for
    /// [`ZERO_ELEMENT`]. Returns the new root.
    pub fn update_element(&mut self, index: u64, value: Hash) -> Result<Hash, Error> {
        let leaf = self.substitute_default(value);
        self.update_leaf_hash(index, leaf)
    }

    /// Set leaf `index` to `leaf` as is. Returns the new root.
    ///
    /// Rewrites the root-to-leaf path in one batch together with the meta
    /// record. Superseded path nodes are deleted once nothing references
    /// them; when the path runs through a bulk-written blob, the blob is
    /// split so every untouched part of it stays reachable.
    pub fn update_leaf_hash(&mut self, index: u64, leaf: Hash) -> Result<Hash, Error> {
        self.check_write_range(index, 1)?;

        let batch = StorageBatch::new();
        let descent = self.descend(index, 0)?;
        let root = if descent.target == leaf {
            self.root
        } else {
            let mut nodes = NodeRefs::new(&self.storage, &self.zero_hashes);
            let root = self.ascend(descent.frames, leaf, &mut nodes);
            nodes.replace_root(self.root, root, self.depth)?;
            nodes.stage(&batch);
            root
        };

        self.commit(batch, root, self.size.max(index + 1))?;
        Ok(root)
    }

    /// Set the leaves starting at `start` to `values`, substituting the
    /// default leaf for [`ZERO_ELEMENT`]. Returns the new root.
    pub fn update_elements(&mut self, start: u64, values: &[Hash]) -> Result<Hash, Error> {
        let leaves: Vec<Hash> = values
            .iter()
            .map(|value| self.substitute_default(*value))
            .collect();
        self.update_leaf_hashes(start, &leaves)
    }

    /// Set the leaves starting at `start` to `leaves` as is. Returns the new
    /// root.
    ///
    /// The run is consumed in the largest power-of-two chunks aligned to
    /// their own size. Each chunk is hashed as a complete subtree, stored as
    /// a single node and committed in its own batch, so on failure the
    /// chunks before the failing one stay committed.
    ///
    /// A chunk landing on a region that already holds other non-default
    /// content fails with [`Error::PreExistingSubtree`]; identical content is
    /// accepted without writing anything.
    pub fn update_leaf_hashes(&mut self, start: u64, leaves: &[Hash]) -> Result<Hash, Error> {
        if leaves.is_empty() {
            return Ok(self.root);
        }
        self.check_write_range(start, leaves.len() as u64)?;

        let mut index = start;
        let mut remaining = leaves;
        while !remaining.is_empty() {
            let mut chunk_len = remaining.len().next_power_of_two();
            while chunk_len > remaining.len() || index % chunk_len as u64 != 0 {
                chunk_len >>= 1;
            }

            let (chunk, rest) = remaining.split_at(chunk_len);
            self.insert_subtree(index, chunk)?;
            index += chunk_len as u64;
            remaining = rest;
        }

        Ok(self.root)
    }

    /// Splice a complete subtree over `leaves` in at `index`, which must be
    /// aligned to its size.
    fn insert_subtree(&mut self, index: u64, leaves: &[Hash]) -> Result<(), Error> {
        let height = leaves.len().trailing_zeros();
        let (subtree_root, node) = Node::from_tree_hashes(self.hasher.hash_to_tree(leaves))?;
        let zero = self.zero_hashes[height as usize];
        trace!(
            tree = %self.name,
            index,
            height,
            subtree_root = %hex::encode(subtree_root),
            "inserting subtree"
        );

        let batch = StorageBatch::new();
        let mut root = self.root;
        if subtree_root != zero {
            let descent = self.descend(index, height)?;
            if descent.target == subtree_root {
                trace!(tree = %self.name, index, height, "subtree already present");
            } else if descent.target != zero {
                return Err(Error::PreExistingSubtree { index, height });
            } else {
                let mut nodes = NodeRefs::new(&self.storage, &self.zero_hashes);
                if let Some(node) = node {
                    nodes.offer(subtree_root, height, node);
                }
                root = self.ascend(descent.frames, subtree_root, &mut nodes);
                nodes.replace_root(self.root, root, self.depth)?;
                nodes.stage(&batch);
            }
        }

        self.commit(batch, root, self.size.max(index + leaves.len() as u64))
    }

    /// Walks from the root down to `stop_height` along `index`.
    fn descend(&self, index: u64, stop_height: u32) -> Result<Descent, Error> {
        let mut frames = Vec::with_capacity((self.depth - stop_height) as usize);
        let mut hash = self.root;
        let mut node = if self.depth > stop_height {
            self.load_node(&hash, self.depth)?
        } else {
            None
        };

        for height in (stop_height + 1..=self.depth).rev() {
            let is_right = is_right_child(index, height);
            let (left, right) = match &node {
                Some(node) => node.children(),
                None => {
                    let below = self.zero_hashes[height as usize - 1];
                    (below, below)
                }
            };
            let (child, sibling) = if is_right {
                (right, left)
            } else {
                (left, right)
            };
            // children carved out of a blob have no record of their own
            let (child_node, sibling_node) = match &node {
                Some(node) => (node.embedded_child(is_right), node.embedded_child(!is_right)),
                None => (None, None),
            };

            frames.push(Frame {
                sibling,
                sibling_node,
                is_right,
            });

            let child_height = height - 1;
            node = match child_node {
                _ if child_height == stop_height => None,
                Some(embedded) => Some(embedded),
                None => self.load_node(&child, child_height)?,
            };
            hash = child;
        }

        Ok(Descent {
            frames,
            target: hash,
        })
    }

    /// Rehashes the recorded path bottom-up with `hash` as the new value at
    /// the stop height, offering every node the new root may reference.
    fn ascend(&self, frames: Vec<Frame>, mut hash: Hash, nodes: &mut NodeRefs<'_, S>) -> Hash {
        let base = self.depth - frames.len() as u32;
        for (height, frame) in (base + 1..).zip(frames.into_iter().rev()) {
            let (left, right) = if frame.is_right {
                (frame.sibling, hash)
            } else {
                (hash, frame.sibling)
            };
            let parent = self.hasher.compress(&left, &right);

            if let Some(sibling_node) = frame.sibling_node {
                nodes.offer(frame.sibling, height - 1, sibling_node);
            }
            nodes.offer(parent, height, Node::Pair { left, right });
            hash = parent;
        }
        hash
    }

    fn check_write_range(&self, start: u64, len: u64) -> Result<(), Error> {
        // sizes are persisted as u32
        let limit = self.capacity().min(u64::from(u32::MAX));
        match start.checked_add(len) {
            Some(end) if end <= limit => Ok(()),
            _ => Err(Error::IndexOutOfBounds {
                index: start.saturating_add(len).saturating_sub(1),
                limit,
            }),
        }
    }

    fn substitute_default(&self, value: Hash) -> Hash {
        if value == ZERO_ELEMENT {
            self.default_leaf
        } else {
            value
        }
    }
}
