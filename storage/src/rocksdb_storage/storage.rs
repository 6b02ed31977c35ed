//! Implementation for a storage abstraction over RocksDB.
use std::path::Path;

use lazy_static::lazy_static;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, OptimisticTransactionDB, WriteBatchWithTransaction,
};
use tracing::trace;

use crate::{BatchOperation, Error, Storage, StorageBatch};

/// Name of column family used to store tree meta records
pub(super) const META_CF_NAME: &str = "meta";

lazy_static! {
    static ref DEFAULT_OPTS: rocksdb::Options = {
        let mut opts = rocksdb::Options::default();
        opts.create_if_missing(true);
        opts.increase_parallelism(num_cpus::get() as i32);
        opts.set_allow_mmap_writes(true);
        opts.set_allow_mmap_reads(true);
        opts.create_missing_column_families(true);
        opts.set_atomic_flush(true);
        opts
    };
}

/// Storage which uses RocksDB as its backend.
///
/// Tree nodes live in the default column family, meta records in `meta`.
/// A [`StorageBatch`] is translated into one RocksDB write batch, which
/// RocksDB applies atomically across column families.
pub struct RocksDbStorage {
    db: OptimisticTransactionDB,
}

impl RocksDbStorage {
    /// Open (creating if missing) a database at `path` with default options.
    pub fn default_rocksdb_with_path<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let db = OptimisticTransactionDB::open_cf_descriptors(
            &DEFAULT_OPTS,
            &path,
            [ColumnFamilyDescriptor::new(
                META_CF_NAME,
                DEFAULT_OPTS.clone(),
            )],
        )?;

        Ok(RocksDbStorage { db })
    }

    fn cf_meta(&self) -> Result<&ColumnFamily, Error> {
        self.db
            .cf_handle(META_CF_NAME)
            .ok_or(Error::MissingColumnFamily(META_CF_NAME))
    }
}

impl Storage for RocksDbStorage {
    fn get<K: AsRef<[u8]>>(&self, key: K) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.db.get(key)?)
    }

    fn get_meta<K: AsRef<[u8]>>(&self, key: K) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.db.get_cf(self.cf_meta()?, key)?)
    }

    fn commit_batch(&self, batch: StorageBatch) -> Result<(), Error> {
        let cf_meta = self.cf_meta()?;
        let mut db_batch = WriteBatchWithTransaction::<true>::default();

        for op in batch.into_operations() {
            match op {
                BatchOperation::Put { key, value } => db_batch.put(key, value),
                BatchOperation::PutMeta { key, value } => db_batch.put_cf(cf_meta, key, value),
                BatchOperation::Delete { key } => db_batch.delete(key),
                BatchOperation::DeleteMeta { key } => db_batch.delete_cf(cf_meta, key),
            }
        }

        trace!(operations = db_batch.len(), "writing rocksdb batch");
        self.db.write(db_batch)?;
        Ok(())
    }

    fn flush(&self) -> Result<(), Error> {
        Ok(self.db.flush()?)
    }
}
