//! Stored node representation.
//!
//! Nodes are persisted in the data namespace keyed by their own hash. A node
//! is either a plain pair of children or a whole bulk-written subtree
//! flattened into one blob. The stored record prefixes the node with its
//! reference count:
//!
//! ```text
//! Record:   refs (u64 LE) || node
//! Pair:     0x00 || left (32) || right (32)
//! Subtree:  0x01 || height (1) || layer 0 || layer 1 || ... || layer h-1
//! ```
//!
//! Layer `l` of a subtree of height `h` holds the `2^(h-l)` hashes at height
//! `l` relative to the subtree's base; the root itself is the storage key
//! and is not repeated.

use crate::{
    Error,
    hasher::{HASH_LENGTH, Hash},
    tree::MAX_DEPTH,
};

const PAIR_TAG: u8 = 0x00;
const SUBTREE_TAG: u8 = 0x01;
const PAIR_ENCODED_LENGTH: usize = 1 + 2 * HASH_LENGTH;
const MIN_BLOB_HEIGHT: u32 = 2;
const REFS_LENGTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Node {
    Pair { left: Hash, right: Hash },
    Subtree(SubtreeBlob),
}

impl Node {
    /// Splits the output of `Hasher::hash_to_tree` into the subtree root and
    /// the node to store under it. A single leaf has no node.
    pub(crate) fn from_tree_hashes(mut hashes: Vec<Hash>) -> Result<(Hash, Option<Node>), Error> {
        let leaf_count = hashes.len().div_ceil(2);
        if hashes.is_empty() || !leaf_count.is_power_of_two() || hashes.len() != 2 * leaf_count - 1
        {
            return Err(Error::CorruptedData(format!(
                "{} hashes do not form a complete tree",
                hashes.len()
            )));
        }

        let root = hashes
            .pop()
            .ok_or_else(|| Error::CorruptedData("empty subtree".into()))?;
        let node = match leaf_count.trailing_zeros() {
            0 => None,
            1 => Some(Node::Pair {
                left: hashes[0],
                right: hashes[1],
            }),
            height => Some(Node::Subtree(SubtreeBlob {
                height,
                layers: hashes,
            })),
        };

        Ok((root, node))
    }

    /// Height of a subtree blob. A pair may sit at any height.
    pub(crate) fn blob_height(&self) -> Option<u32> {
        match self {
            Node::Pair { .. } => None,
            Node::Subtree(blob) => Some(blob.height),
        }
    }

    /// Hashes of the two children.
    pub(crate) fn children(&self) -> (Hash, Hash) {
        match self {
            Node::Pair { left, right } => (*left, *right),
            Node::Subtree(blob) => blob.children(),
        }
    }

    /// Children that have records of their own when this node sits at
    /// `height`. Blobs embed their children and pairs at height 1 hold
    /// leaves.
    pub(crate) fn stored_children(&self, height: u32) -> Option<(Hash, Hash)> {
        match self {
            Node::Pair { left, right } if height > 1 => Some((*left, *right)),
            _ => None,
        }
    }

    /// Nodes embedded in this one for its children, `None` when a child is
    /// stored separately or is a leaf.
    pub(crate) fn embedded_child(&self, right: bool) -> Option<Node> {
        match self {
            Node::Pair { .. } => None,
            Node::Subtree(blob) => blob.child(usize::from(right)),
        }
    }

    pub(crate) fn encode(&self) -> Vec<u8> {
        match self {
            Node::Pair { left, right } => {
                let mut bytes = Vec::with_capacity(PAIR_ENCODED_LENGTH);
                bytes.push(PAIR_TAG);
                bytes.extend_from_slice(left);
                bytes.extend_from_slice(right);
                bytes
            }
            Node::Subtree(blob) => {
                let mut bytes = Vec::with_capacity(2 + blob.layers.len() * HASH_LENGTH);
                bytes.push(SUBTREE_TAG);
                bytes.push(blob.height as u8);
                for hash in &blob.layers {
                    bytes.extend_from_slice(hash);
                }
                bytes
            }
        }
    }

    pub(crate) fn decode(bytes: &[u8]) -> Result<Self, Error> {
        match bytes.first() {
            Some(&PAIR_TAG) => {
                if bytes.len() != PAIR_ENCODED_LENGTH {
                    return Err(Error::CorruptedData(format!(
                        "pair node expected {PAIR_ENCODED_LENGTH} bytes, got {}",
                        bytes.len()
                    )));
                }
                let mut left = [0u8; HASH_LENGTH];
                let mut right = [0u8; HASH_LENGTH];
                left.copy_from_slice(&bytes[1..1 + HASH_LENGTH]);
                right.copy_from_slice(&bytes[1 + HASH_LENGTH..]);
                Ok(Node::Pair { left, right })
            }
            Some(&SUBTREE_TAG) => {
                let height = bytes
                    .get(1)
                    .map(|h| u32::from(*h))
                    .ok_or_else(|| Error::CorruptedData("subtree node without height".into()))?;
                if !(MIN_BLOB_HEIGHT..=MAX_DEPTH).contains(&height) {
                    return Err(Error::CorruptedData(format!(
                        "subtree node height {height} out of range"
                    )));
                }

                let body = &bytes[2..];
                let expected = SubtreeBlob::layers_len(height) as u64 * HASH_LENGTH as u64;
                if body.len() as u64 != expected {
                    return Err(Error::CorruptedData(format!(
                        "subtree node of height {height} expected {expected} bytes of layers, got {}",
                        body.len()
                    )));
                }

                let layers = body
                    .chunks_exact(HASH_LENGTH)
                    .map(|chunk| {
                        let mut hash = [0u8; HASH_LENGTH];
                        hash.copy_from_slice(chunk);
                        hash
                    })
                    .collect();
                Ok(Node::Subtree(SubtreeBlob { height, layers }))
            }
            Some(tag) => Err(Error::CorruptedData(format!("unknown node tag {tag:#04x}"))),
            None => Err(Error::CorruptedData("empty node".into())),
        }
    }
}

/// A node together with the number of references to it.
///
/// Every child slot of a stored parent and every meta record whose root it
/// is counts once, so identical subtrees share one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NodeRecord {
    pub(crate) refs: u64,
    pub(crate) node: Node,
}

impl NodeRecord {
    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut bytes = self.refs.to_le_bytes().to_vec();
        bytes.extend_from_slice(&self.node.encode());
        bytes
    }

    pub(crate) fn decode(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < REFS_LENGTH {
            return Err(Error::CorruptedData(format!(
                "node record of {} bytes has no reference count",
                bytes.len()
            )));
        }
        let (refs, node) = bytes.split_at(REFS_LENGTH);
        let mut refs_bytes = [0u8; REFS_LENGTH];
        refs_bytes.copy_from_slice(refs);
        let refs = u64::from_le_bytes(refs_bytes);
        if refs == 0 {
            return Err(Error::CorruptedData("unreferenced node record".into()));
        }

        Ok(Self {
            refs,
            node: Node::decode(node)?,
        })
    }
}

/// Every hash of a complete subtree except its root, bottom layer first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SubtreeBlob {
    height: u32,
    layers: Vec<Hash>,
}

impl SubtreeBlob {
    /// Number of stored hashes for a subtree of `height`.
    fn layers_len(height: u32) -> usize {
        (1usize << (height + 1)) - 2
    }

    /// Index of the first hash of `level` within `layers`.
    fn layer_offset(&self, level: u32) -> usize {
        (1usize << (self.height + 1)) - (1usize << (self.height - level + 1))
    }

    fn children(&self) -> (Hash, Hash) {
        let top = self.layer_offset(self.height - 1);
        (self.layers[top], self.layers[top + 1])
    }

    /// Extracts the child subtree at `position` (0 left, 1 right).
    fn child(&self, position: usize) -> Option<Node> {
        let height = self.height - 1;
        match height {
            0 => None,
            1 => {
                let start = position * 2;
                Some(Node::Pair {
                    left: self.layers[start],
                    right: self.layers[start + 1],
                })
            }
            _ => {
                let mut layers = Vec::with_capacity(Self::layers_len(height));
                for level in 0..height {
                    let width = 1usize << (height - level);
                    let start = self.layer_offset(level) + position * width;
                    layers.extend_from_slice(&self.layers[start..start + width]);
                }
                Some(Node::Subtree(SubtreeBlob { height, layers }))
            }
        }
    }

    /// Authentication pairs for `index` within the blob, leaf layer first.
    pub(crate) fn path_pairs(&self, index: u64) -> Vec<(Hash, Hash)> {
        let local = (index & ((1u64 << self.height) - 1)) as usize;
        (0..self.height)
            .map(|level| {
                let left = self.layer_offset(level) + ((local >> level) & !1);
                (self.layers[left], self.layers[left + 1])
            })
            .collect()
    }
}
