use thiserror::Error;

/// Errors from note tree operations.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid tree depth {depth}, must be between 1 and {max}")]
    InvalidDepth { depth: u32, max: u32 },
    #[error("tree {name} is stored with depth {stored}, expected {expected}")]
    DepthMismatch {
        name: String,
        stored: u32,
        expected: u32,
    },
    #[error("expected a power of 2 number of leaves, got {0}")]
    NotPowerOfTwo(usize),
    #[error("index {index} out of bounds (limit {limit})")]
    IndexOutOfBounds { index: u64, limit: u64 },
    /// A bulk write targeted a region that already holds different content.
    #[error("attempting to overwrite pre-existing subtree of height {height} at index {index}")]
    PreExistingSubtree { index: u64, height: u32 },
    #[error("no meta record for tree {0}")]
    MetaNotFound(String),
    #[error("corrupted data: {0}")]
    CorruptedData(String),
    #[error("storage error: {0}")]
    StorageError(#[from] notetree_storage::Error),
}
