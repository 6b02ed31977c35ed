//! Storage errors

/// Storage and underlying errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Rocks DB error
    #[cfg(feature = "rocksdb_storage")]
    #[error("rocksDB error: {0}")]
    RocksDBError(#[from] rocksdb::Error),
    /// Column family expected by the backend was not opened
    #[error("missing column family: {0}")]
    MissingColumnFamily(&'static str),
    /// A lock guarding in-memory state was poisoned by a panicking writer
    #[error("storage lock poisoned: {0}")]
    LockPoisoned(String),
}
