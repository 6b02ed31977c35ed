#![deny(missing_docs)]

//! Storage abstraction for notetree.
//!
//! Two namespaces are exposed: the data namespace holds content-addressed
//! tree nodes, the meta namespace holds one small record per named tree.
//! All writes go through a [`StorageBatch`] that a backend applies
//! atomically.

mod error;
mod memory_storage;
#[cfg(feature = "rocksdb_storage")]
pub mod rocksdb_storage;
mod storage;

pub use crate::{
    error::Error,
    memory_storage::MemoryStorage,
    storage::{BatchOperation, Storage, StorageBatch},
};
