//! In-memory storage backend.

use std::{
    collections::BTreeMap,
    sync::{RwLock, RwLockReadGuard},
};

use tracing::trace;

use crate::{BatchOperation, Error, Storage, StorageBatch};

#[derive(Debug, Default)]
struct Namespaces {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
    meta: BTreeMap<Vec<u8>, Vec<u8>>,
}

/// Storage kept entirely in memory.
///
/// Both namespaces sit behind a single lock, so a committed batch becomes
/// visible to readers all at once. Share it between tree instances with
/// `Arc<MemoryStorage>` or a plain reference.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    namespaces: RwLock<Namespaces>,
}

impl MemoryStorage {
    /// Create empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in data storage.
    pub fn data_len(&self) -> Result<usize, Error> {
        Ok(self.read()?.data.len())
    }

    /// Number of entries in metadata storage.
    pub fn meta_len(&self) -> Result<usize, Error> {
        Ok(self.read()?.meta.len())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Namespaces>, Error> {
        self.namespaces
            .read()
            .map_err(|e| Error::LockPoisoned(e.to_string()))
    }
}

impl Storage for MemoryStorage {
    fn get<K: AsRef<[u8]>>(&self, key: K) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.read()?.data.get(key.as_ref()).cloned())
    }

    fn get_meta<K: AsRef<[u8]>>(&self, key: K) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.read()?.meta.get(key.as_ref()).cloned())
    }

    fn commit_batch(&self, batch: StorageBatch) -> Result<(), Error> {
        let mut namespaces = self
            .namespaces
            .write()
            .map_err(|e| Error::LockPoisoned(e.to_string()))?;

        trace!(operations = batch.len(), "applying batch to memory storage");
        for op in batch.into_operations() {
            match op {
                BatchOperation::Put { key, value } => {
                    namespaces.data.insert(key, value);
                }
                BatchOperation::PutMeta { key, value } => {
                    namespaces.meta.insert(key, value);
                }
                BatchOperation::Delete { key } => {
                    namespaces.data.remove(&key);
                }
                BatchOperation::DeleteMeta { key } => {
                    namespaces.meta.remove(&key);
                }
            }
        }

        Ok(())
    }

    fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}
