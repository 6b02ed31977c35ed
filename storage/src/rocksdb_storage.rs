//! notetree storage layer implemented over RocksDB backend.
mod storage;
#[cfg(test)]
pub mod test_utils;

pub use self::storage::RocksDbStorage;
