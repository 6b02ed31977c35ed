//! Dense Merkle tree held entirely in memory.

use crate::{
    Error, HashPath,
    hasher::{Hash, Hasher},
};

/// Complete binary tree over a power-of-two number of leaves.
///
/// Every hash is computed at construction and kept in one flat array, layer
/// by layer, leaves first and the root last. Used to derive the default leaf
/// of a persistent tree from a lower region of default elements, and to
/// produce paths within such a region.
#[derive(Debug, Clone)]
pub struct MemoryMerkleTree {
    hashes: Vec<Hash>,
    size: usize,
}

impl MemoryMerkleTree {
    /// Hash `leaves` into a tree.
    ///
    /// Fails with [`Error::NotPowerOfTwo`] unless the number of leaves is a
    /// non-zero power of two.
    pub fn new<H: Hasher>(leaves: &[Hash], hasher: &H) -> Result<Self, Error> {
        let size = leaves.len();
        if !size.is_power_of_two() {
            return Err(Error::NotPowerOfTwo(size));
        }

        let hashes = hasher.hash_to_tree(leaves);
        if hashes.len() != 2 * size - 1 {
            return Err(Error::CorruptedData(format!(
                "hasher returned {} hashes for {size} leaves",
                hashes.len()
            )));
        }

        Ok(Self { hashes, size })
    }

    /// Root hash.
    pub fn root(&self) -> Hash {
        self.hashes[self.hashes.len() - 1]
    }

    /// Number of leaves.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Leaf layer.
    pub fn leaves(&self) -> &[Hash] {
        &self.hashes[..self.size]
    }

    /// Depth of the tree, `log2(size)`.
    pub fn depth(&self) -> u32 {
        self.size.trailing_zeros()
    }

    /// Path from leaf `index` up to the root.
    pub fn hash_path(&self, index: usize) -> Result<HashPath, Error> {
        if index >= self.size {
            return Err(Error::IndexOutOfBounds {
                index: index as u64,
                limit: self.size as u64,
            });
        }

        let mut data = Vec::with_capacity(self.depth() as usize);
        let mut layer_start = 0;
        let mut layer_len = self.size;
        let mut position = index;
        while layer_len > 1 {
            let left = layer_start + (position & !1);
            data.push((self.hashes[left], self.hashes[left + 1]));
            layer_start += layer_len;
            layer_len >>= 1;
            position >>= 1;
        }

        Ok(HashPath::new(data))
    }
}
