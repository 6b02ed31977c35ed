//! Storage for notetree

use std::{
    cell::RefCell,
    collections::{BTreeMap, btree_map::IntoValues},
    sync::Arc,
};

use crate::Error;

/// Top-level storage abstraction.
///
/// Reads go straight to the backend. Writes are only possible through
/// [`StorageBatch`], which the backend must apply atomically: after
/// [`Storage::commit_batch`] returns either every staged operation is
/// visible or none is.
pub trait Storage {
    /// Get entry by `key` from data storage
    fn get<K: AsRef<[u8]>>(&self, key: K) -> Result<Option<Vec<u8>>, Error>;

    /// Get entry by `key` from metadata storage
    fn get_meta<K: AsRef<[u8]>>(&self, key: K) -> Result<Option<Vec<u8>>, Error>;

    /// Consumes and atomically applies a batch.
    fn commit_batch(&self, batch: StorageBatch) -> Result<(), Error>;

    /// Forces data to be written
    fn flush(&self) -> Result<(), Error>;
}

impl<S: Storage + ?Sized> Storage for &S {
    fn get<K: AsRef<[u8]>>(&self, key: K) -> Result<Option<Vec<u8>>, Error> {
        (**self).get(key)
    }

    fn get_meta<K: AsRef<[u8]>>(&self, key: K) -> Result<Option<Vec<u8>>, Error> {
        (**self).get_meta(key)
    }

    fn commit_batch(&self, batch: StorageBatch) -> Result<(), Error> {
        (**self).commit_batch(batch)
    }

    fn flush(&self) -> Result<(), Error> {
        (**self).flush()
    }
}

impl<S: Storage + ?Sized> Storage for Arc<S> {
    fn get<K: AsRef<[u8]>>(&self, key: K) -> Result<Option<Vec<u8>>, Error> {
        (**self).get(key)
    }

    fn get_meta<K: AsRef<[u8]>>(&self, key: K) -> Result<Option<Vec<u8>>, Error> {
        (**self).get_meta(key)
    }

    fn commit_batch(&self, batch: StorageBatch) -> Result<(), Error> {
        (**self).commit_batch(batch)
    }

    fn flush(&self) -> Result<(), Error> {
        (**self).flush()
    }
}

/// Structure to hold deferred database operations until they are committed
/// as one unit.
///
/// Operations are keyed: staging a second operation for the same key in the
/// same namespace replaces the first, except that a `delete` never replaces
/// an already staged `put`. Content-addressed writers rely on this, since the
/// same node may be both superseded and re-created within one update.
#[derive(Debug, Default)]
pub struct StorageBatch {
    operations: RefCell<Operations>,
}

#[derive(Default)]
struct Operations {
    data: BTreeMap<Vec<u8>, BatchOperation>,
    meta: BTreeMap<Vec<u8>, BatchOperation>,
}

impl std::fmt::Debug for Operations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut fmt = f.debug_struct("Operations");

        fmt.field("data", &self.data.values());
        fmt.field("meta", &self.meta.values());

        fmt.finish()
    }
}

impl StorageBatch {
    /// Create empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get batch length
    pub fn len(&self) -> usize {
        let operations = self.operations.borrow();
        operations.data.len() + operations.meta.len()
    }

    /// Batch emptiness predicate
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add deferred `put` operation
    pub fn put<K: AsRef<[u8]>>(&self, key: K, value: &[u8]) {
        let key = key.as_ref().to_vec();
        self.operations.borrow_mut().data.insert(
            key.clone(),
            BatchOperation::Put {
                key,
                value: value.to_vec(),
            },
        );
    }

    /// Add deferred `put` operation for metadata storage
    pub fn put_meta<K: AsRef<[u8]>>(&self, key: K, value: &[u8]) {
        let key = key.as_ref().to_vec();
        self.operations.borrow_mut().meta.insert(
            key.clone(),
            BatchOperation::PutMeta {
                key,
                value: value.to_vec(),
            },
        );
    }

    /// Add deferred `delete` operation
    pub fn delete<K: AsRef<[u8]>>(&self, key: K) {
        let operations = &mut self.operations.borrow_mut().data;
        if !operations.contains_key(key.as_ref()) {
            let key = key.as_ref().to_vec();
            operations.insert(key.clone(), BatchOperation::Delete { key });
        }
    }

    /// Add deferred `delete` operation for metadata storage
    pub fn delete_meta<K: AsRef<[u8]>>(&self, key: K) {
        let operations = &mut self.operations.borrow_mut().meta;
        if !operations.contains_key(key.as_ref()) {
            let key = key.as_ref().to_vec();
            operations.insert(key.clone(), BatchOperation::DeleteMeta { key });
        }
    }

    /// Consumes the batch, yielding metadata operations first and data
    /// operations after them, each namespace in key order.
    pub fn into_operations(self) -> StorageBatchIter {
        let operations = self.operations.into_inner();

        StorageBatchIter {
            meta: operations.meta.into_values(),
            data: operations.data.into_values(),
        }
    }
}

/// Iterator over storage batch operations.
pub struct StorageBatchIter {
    meta: IntoValues<Vec<u8>, BatchOperation>,
    data: IntoValues<Vec<u8>, BatchOperation>,
}

impl Iterator for StorageBatchIter {
    type Item = BatchOperation;

    fn next(&mut self) -> Option<Self::Item> {
        self.meta.next().or_else(|| self.data.next())
    }
}

/// Deferred storage operation not tied to any storage implementation.
#[allow(missing_docs)]
#[derive(Clone, PartialEq, Eq, strum::AsRefStr)]
pub enum BatchOperation {
    /// Deferred put operation
    Put { key: Vec<u8>, value: Vec<u8> },
    /// Deferred put operation for metadata storage
    PutMeta { key: Vec<u8>, value: Vec<u8> },
    /// Deferred delete operation
    Delete { key: Vec<u8> },
    /// Deferred delete operation for metadata storage
    DeleteMeta { key: Vec<u8> },
}

impl std::fmt::Debug for BatchOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut fmt = f.debug_struct(self.as_ref());

        match self {
            BatchOperation::Put { key, value } | BatchOperation::PutMeta { key, value } => {
                fmt.field("key", &hex::encode(key))
                    .field("value", &hex::encode(value));
            }
            BatchOperation::Delete { key } | BatchOperation::DeleteMeta { key } => {
                fmt.field("key", &hex::encode(key));
            }
        }

        fmt.finish()
    }
}
