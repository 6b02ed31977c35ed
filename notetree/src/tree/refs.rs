//! Reference counting of shared node records.
//!
//! Identical subtrees anywhere in a tree, or in other trees of the same
//! storage, resolve to one record. A write therefore never deletes a node
//! outright: it adds a reference to the new root and drops one from the old
//! root. A record reaching its first reference takes references on its
//! stored children, and a record losing its last one is deleted and releases
//! them.

use std::collections::BTreeMap;

use notetree_storage::{Storage, StorageBatch};
use tracing::trace;

use super::{
    node::{Node, NodeRecord},
    read_record,
};
use crate::{Error, hasher::Hash};

struct Entry {
    record: NodeRecord,
    /// Count as last committed, zero when the node isn't stored yet.
    persisted: u64,
}

/// Reference count changes of one write.
pub(super) struct NodeRefs<'a, S> {
    storage: &'a S,
    zero_hashes: &'a [Hash],
    /// Nodes built by this write, picked up once something references them.
    created: BTreeMap<Hash, Node>,
    entries: BTreeMap<Hash, Entry>,
}

impl<'a, S: Storage> NodeRefs<'a, S> {
    pub(super) fn new(storage: &'a S, zero_hashes: &'a [Hash]) -> Self {
        Self {
            storage,
            zero_hashes,
            created: BTreeMap::new(),
            entries: BTreeMap::new(),
        }
    }

    /// Make `node` the content of `hash` should the new root reach it.
    pub(super) fn offer(&mut self, hash: Hash, height: u32, node: Node) {
        if hash != self.zero_hashes[height as usize] {
            self.created.entry(hash).or_insert(node);
        }
    }

    /// Move the meta record's reference from `old_root` to `new_root`.
    pub(super) fn replace_root(
        &mut self,
        old_root: Hash,
        new_root: Hash,
        depth: u32,
    ) -> Result<(), Error> {
        if old_root != new_root {
            self.retain(new_root, depth)?;
            self.release(old_root, depth)?;
        }
        Ok(())
    }

    /// Stage every changed record into `batch`.
    pub(super) fn stage(self, batch: &StorageBatch) {
        for (hash, entry) in self.entries {
            if entry.record.refs == entry.persisted {
                continue;
            }
            trace!(
                node = %hex::encode(hash),
                from = entry.persisted,
                to = entry.record.refs,
                "node references changed"
            );
            if entry.record.refs == 0 {
                batch.delete(hash);
            } else {
                batch.put(hash, &entry.record.encode());
            }
        }
    }

    fn retain(&mut self, hash: Hash, height: u32) -> Result<(), Error> {
        let Some(entry) = self.entry(hash, height)? else {
            return Ok(());
        };
        entry.record.refs += 1;
        let children = if entry.record.refs == 1 {
            entry.record.node.stored_children(height)
        } else {
            None
        };

        if let Some((left, right)) = children {
            self.retain(left, height - 1)?;
            self.retain(right, height - 1)?;
        }
        Ok(())
    }

    fn release(&mut self, hash: Hash, height: u32) -> Result<(), Error> {
        let Some(entry) = self.entry(hash, height)? else {
            return Ok(());
        };
        entry.record.refs = entry.record.refs.checked_sub(1).ok_or_else(|| {
            Error::CorruptedData(format!(
                "node {} released more often than referenced",
                hex::encode(hash)
            ))
        })?;
        let children = if entry.record.refs == 0 {
            entry.record.node.stored_children(height)
        } else {
            None
        };

        if let Some((left, right)) = children {
            self.release(left, height - 1)?;
            self.release(right, height - 1)?;
        }
        Ok(())
    }

    /// The tracked record of `hash`, read from storage or taken from the
    /// nodes built by this write. `None` for leaves and default subtrees.
    fn entry(&mut self, hash: Hash, height: u32) -> Result<Option<&mut Entry>, Error> {
        if height == 0 || hash == self.zero_hashes[height as usize] {
            return Ok(None);
        }

        if !self.entries.contains_key(&hash) {
            let entry = match read_record(self.storage, self.zero_hashes, &hash, height)? {
                Some(record) => Entry {
                    persisted: record.refs,
                    record,
                },
                None => match self.created.remove(&hash) {
                    Some(node) => Entry {
                        record: NodeRecord { refs: 0, node },
                        persisted: 0,
                    },
                    None => return Ok(None),
                },
            };
            self.entries.insert(hash, entry);
        }
        Ok(self.entries.get_mut(&hash))
    }
}
