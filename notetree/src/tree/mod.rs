//! Persistent sparse Merkle tree.
//!
//! Leaves sit at height 0 and the root at height `depth`. Interior nodes are
//! stored under their own hash, so a node is looked up by the hash its parent
//! records for it. Subtrees whose hash equals the all-default hash of their
//! height are never stored: reaching one, or reaching any hash with no stored
//! node, means every leaf below holds the default value.

mod meta;
mod node;
mod refs;
mod update;


use std::fmt;

use notetree_storage::{Storage, StorageBatch};
use tracing::debug;

use self::{
    meta::TreeMeta,
    node::{Node, NodeRecord},
};
use crate::{
    Error, HashPath,
    hasher::{Hash, Hasher},
};

/// Deepest supported tree.
pub const MAX_DEPTH: u32 = 32;

/// Sparse Merkle tree of fixed depth persisted in a [`Storage`].
///
/// The tree is identified by its name: the meta record stored under it holds
/// the root, depth and size as of the last commit, and every mutation commits
/// its nodes together with the new meta record in one atomic batch.
///
/// Single leaves are written by rewriting their root-to-leaf path. Runs of
/// leaves are split into aligned power-of-two chunks, and each chunk is
/// stored as one flattened subtree blob. Regions written that way are
/// write-once for later bulk writes.
pub struct MerkleTree<S, H> {
    storage: S,
    hasher: H,
    name: String,
    depth: u32,
    size: u64,
    root: Hash,
    default_leaf: Hash,
    /// `zero_hashes[h]` is the hash of an all-default subtree of height `h`.
    zero_hashes: Vec<Hash>,
}

impl<S: Storage, H: Hasher> MerkleTree<S, H> {
    /// Create an empty tree called `name` and persist its meta record.
    ///
    /// Any tree previously stored under the same name is forgotten. Its nodes
    /// keep the reference the old meta record held on them.
    pub fn new(
        storage: S,
        hasher: H,
        name: impl Into<String>,
        depth: u32,
        default_leaf: Hash,
    ) -> Result<Self, Error> {
        validate_depth(depth)?;
        let zero_hashes = compute_zero_hashes(&hasher, default_leaf, depth);
        let mut tree = Self {
            storage,
            hasher,
            name: name.into(),
            depth,
            size: 0,
            root: zero_hashes[depth as usize],
            default_leaf,
            zero_hashes,
        };

        debug!(
            tree = %tree.name,
            depth,
            root = %hex::encode(tree.root),
            "creating merkle tree"
        );
        tree.commit(StorageBatch::new(), tree.root, 0)?;
        Ok(tree)
    }

    /// Attach to a tree previously created under `name`.
    pub fn from_name(
        storage: S,
        hasher: H,
        name: impl Into<String>,
        default_leaf: Hash,
    ) -> Result<Self, Error> {
        let name = name.into();
        let meta = read_meta(&storage, &name)?.ok_or_else(|| Error::MetaNotFound(name.clone()))?;
        Self::from_meta(storage, hasher, name, meta, default_leaf)
    }

    /// Attach to the tree called `name`, creating it if it doesn't exist.
    ///
    /// An existing tree must have the requested depth.
    pub fn open_or_create(
        storage: S,
        hasher: H,
        name: impl Into<String>,
        depth: u32,
        default_leaf: Hash,
    ) -> Result<Self, Error> {
        let name = name.into();
        match read_meta(&storage, &name)? {
            Some(meta) if meta.depth != depth => Err(Error::DepthMismatch {
                name,
                stored: meta.depth,
                expected: depth,
            }),
            Some(meta) => Self::from_meta(storage, hasher, name, meta, default_leaf),
            None => Self::new(storage, hasher, name, depth, default_leaf),
        }
    }

    fn from_meta(
        storage: S,
        hasher: H,
        name: String,
        meta: TreeMeta,
        default_leaf: Hash,
    ) -> Result<Self, Error> {
        validate_depth(meta.depth)?;
        validate_size(&meta)?;
        let zero_hashes = compute_zero_hashes(&hasher, default_leaf, meta.depth);

        debug!(
            tree = %name,
            depth = meta.depth,
            size = meta.size,
            root = %hex::encode(meta.root),
            "attached to merkle tree"
        );
        Ok(Self {
            storage,
            hasher,
            name,
            depth: meta.depth,
            size: u64::from(meta.size),
            root: meta.root,
            default_leaf,
            zero_hashes,
        })
    }

    /// Reload root and size from the stored meta record.
    ///
    /// Lets a reader observe commits made by another instance sharing the
    /// same storage.
    pub fn sync_from_db(&mut self) -> Result<(), Error> {
        let meta =
            read_meta(&self.storage, &self.name)?.ok_or_else(|| Error::MetaNotFound(self.name.clone()))?;
        if meta.depth != self.depth {
            return Err(Error::DepthMismatch {
                name: self.name.clone(),
                stored: meta.depth,
                expected: self.depth,
            });
        }
        validate_size(&meta)?;

        self.root = meta.root;
        self.size = u64::from(meta.size);
        Ok(())
    }

    /// Current root hash.
    pub fn root(&self) -> Hash {
        self.root
    }

    /// One past the highest leaf index ever written.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Tree depth, the number of levels above the leaves.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Name the tree's meta record is stored under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value of every leaf that was never written.
    pub fn default_leaf(&self) -> Hash {
        self.default_leaf
    }

    /// Hash of an all-default subtree of `height`, `None` above the root.
    pub fn zero_hash(&self, height: u32) -> Option<Hash> {
        self.zero_hashes.get(height as usize).copied()
    }

    /// Underlying storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Hasher the tree is built with.
    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    /// Number of leaf slots, `2^depth`.
    pub fn capacity(&self) -> u64 {
        1u64 << self.depth
    }

    /// Authentication path of leaf `index`, leaf layer first.
    pub fn hash_path(&self, index: u64) -> Result<HashPath, Error> {
        if index >= self.capacity() {
            return Err(Error::IndexOutOfBounds {
                index,
                limit: self.capacity(),
            });
        }

        let mut data = vec![([0u8; 32], [0u8; 32]); self.depth as usize];
        let mut hash = self.root;
        let mut height = self.depth;
        while height > 0 {
            match self.load_node(&hash, height)? {
                None => {
                    for (pair, zero) in data.iter_mut().zip(&self.zero_hashes[..height as usize]) {
                        *pair = (*zero, *zero);
                    }
                    break;
                }
                Some(Node::Subtree(blob)) => {
                    for (pair, from_blob) in data.iter_mut().zip(blob.path_pairs(index)) {
                        *pair = from_blob;
                    }
                    break;
                }
                Some(Node::Pair { left, right }) => {
                    data[height as usize - 1] = (left, right);
                    hash = if is_right_child(index, height) {
                        right
                    } else {
                        left
                    };
                    height -= 1;
                }
            }
        }

        Ok(HashPath::new(data))
    }

    /// Node stored for the subtree with root `hash` at `height`.
    ///
    /// Leaves, all-default subtrees and hashes with nothing stored under them
    /// have no node.
    fn load_node(&self, hash: &Hash, height: u32) -> Result<Option<Node>, Error> {
        Ok(read_record(&self.storage, &self.zero_hashes, hash, height)?.map(|record| record.node))
    }

    /// Stages `meta` and the rest of `batch`, commits it, and only then
    /// adopts the new root and size.
    fn commit(&mut self, batch: StorageBatch, root: Hash, size: u64) -> Result<(), Error> {
        let meta = TreeMeta {
            root,
            depth: self.depth,
            size: u32::try_from(size).map_err(|_| Error::IndexOutOfBounds {
                index: size,
                limit: u64::from(u32::MAX),
            })?,
        };
        batch.put_meta(self.name.as_bytes(), &meta.serialize());

        let operations = batch.len();
        self.storage.commit_batch(batch)?;
        self.root = root;
        self.size = size;

        debug!(
            tree = %self.name,
            size,
            root = %hex::encode(root),
            operations,
            "committed merkle tree batch"
        );
        Ok(())
    }
}

impl<S, H> fmt::Debug for MerkleTree<S, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MerkleTree")
            .field("name", &self.name)
            .field("depth", &self.depth)
            .field("size", &self.size)
            .field("root", &hex::encode(self.root))
            .finish_non_exhaustive()
    }
}

/// Whether the path to `index` takes the right child of the node at
/// `height`.
fn is_right_child(index: u64, height: u32) -> bool {
    (index >> (height - 1)) & 1 == 1
}

fn validate_depth(depth: u32) -> Result<(), Error> {
    if depth == 0 || depth > MAX_DEPTH {
        return Err(Error::InvalidDepth {
            depth,
            max: MAX_DEPTH,
        });
    }
    Ok(())
}

fn validate_size(meta: &TreeMeta) -> Result<(), Error> {
    if u64::from(meta.size) > 1u64 << meta.depth {
        return Err(Error::CorruptedData(format!(
            "tree size {} exceeds capacity of depth {}",
            meta.size, meta.depth
        )));
    }
    Ok(())
}

/// Record stored for the subtree with root `hash` at `height`.
fn read_record<S: Storage>(
    storage: &S,
    zero_hashes: &[Hash],
    hash: &Hash,
    height: u32,
) -> Result<Option<NodeRecord>, Error> {
    if height == 0 || *hash == zero_hashes[height as usize] {
        return Ok(None);
    }

    let Some(bytes) = storage.get(hash)? else {
        return Ok(None);
    };
    let record = NodeRecord::decode(&bytes)?;
    match record.node.blob_height() {
        Some(blob_height) if blob_height != height => Err(Error::CorruptedData(format!(
            "node {} at height {height} is a subtree of height {blob_height}",
            hex::encode(hash)
        ))),
        _ => Ok(Some(record)),
    }
}

fn read_meta<S: Storage>(storage: &S, name: &str) -> Result<Option<TreeMeta>, Error> {
    storage
        .get_meta(name.as_bytes())?
        .map(|bytes| TreeMeta::deserialize(&bytes))
        .transpose()
}

fn compute_zero_hashes<H: Hasher>(hasher: &H, default_leaf: Hash, depth: u32) -> Vec<Hash> {
    let mut zero_hashes = Vec::with_capacity(depth as usize + 1);
    zero_hashes.push(default_leaf);
    for height in 0..depth as usize {
        let below = zero_hashes[height];
        zero_hashes.push(hasher.compress(&below, &below));
    }
    zero_hashes
}
