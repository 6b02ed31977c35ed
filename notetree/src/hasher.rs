//! Hashing capability the trees are built on.

use std::sync::Arc;

/// A 32-byte hash. Leaves and interior nodes are both hashes.
pub type Hash = [u8; 32];

/// Hash length in bytes.
pub const HASH_LENGTH: usize = 32;

/// Sentinel leaf value meaning "the tree's default leaf".
///
/// Writers substitute the default leaf for it; it is never stored as such
/// unless it happens to be the default leaf itself.
pub const ZERO_ELEMENT: Hash = [0u8; HASH_LENGTH];

/// Two-to-one compression function of a binary Merkle tree.
pub trait Hasher {
    /// Hash of a node given its two children.
    fn compress(&self, left: &Hash, right: &Hash) -> Hash;

    /// Hashes a complete tree over `leaves`, whose length must be a power of
    /// two.
    ///
    /// Returns `2 * leaves.len() - 1` hashes laid out layer by layer, leaves
    /// first and the root last.
    fn hash_to_tree(&self, leaves: &[Hash]) -> Vec<Hash> {
        let mut hashes = Vec::with_capacity((leaves.len() * 2).saturating_sub(1));
        hashes.extend_from_slice(leaves);

        let mut layer_start = 0;
        let mut layer_len = leaves.len();
        while layer_len > 1 {
            for i in (layer_start..layer_start + layer_len).step_by(2) {
                let parent = self.compress(&hashes[i], &hashes[i + 1]);
                hashes.push(parent);
            }
            layer_start += layer_len;
            layer_len /= 2;
        }

        hashes
    }
}

impl<H: Hasher + ?Sized> Hasher for &H {
    fn compress(&self, left: &Hash, right: &Hash) -> Hash {
        (**self).compress(left, right)
    }

    fn hash_to_tree(&self, leaves: &[Hash]) -> Vec<Hash> {
        (**self).hash_to_tree(leaves)
    }
}

impl<H: Hasher + ?Sized> Hasher for Arc<H> {
    fn compress(&self, left: &Hash, right: &Hash) -> Hash {
        (**self).compress(left, right)
    }

    fn hash_to_tree(&self, leaves: &[Hash]) -> Vec<Hash> {
        (**self).hash_to_tree(leaves)
    }
}

/// Reference hasher: `blake3(left || right)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Blake3Hasher;

impl Hasher for Blake3Hasher {
    fn compress(&self, left: &Hash, right: &Hash) -> Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(left);
        hasher.update(right);
        *hasher.finalize().as_bytes()
    }
}
