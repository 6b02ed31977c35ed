//! Per-tree meta record.

use crate::{
    Error,
    hasher::{HASH_LENGTH, Hash},
};

/// Encoded length: root, then depth and size as little-endian `u32`s.
pub(crate) const META_LENGTH: usize = HASH_LENGTH + 8;

/// Everything needed to reattach to a named tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TreeMeta {
    pub(crate) root: Hash,
    pub(crate) depth: u32,
    pub(crate) size: u32,
}

impl TreeMeta {
    pub(crate) fn serialize(&self) -> [u8; META_LENGTH] {
        let mut buf = [0u8; META_LENGTH];
        buf[..HASH_LENGTH].copy_from_slice(&self.root);
        buf[HASH_LENGTH..HASH_LENGTH + 4].copy_from_slice(&self.depth.to_le_bytes());
        buf[HASH_LENGTH + 4..].copy_from_slice(&self.size.to_le_bytes());
        buf
    }

    pub(crate) fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != META_LENGTH {
            return Err(Error::CorruptedData(format!(
                "tree meta expected {META_LENGTH} bytes, got {}",
                bytes.len()
            )));
        }

        let mut root = [0u8; HASH_LENGTH];
        root.copy_from_slice(&bytes[..HASH_LENGTH]);
        let depth = u32::from_le_bytes(
            bytes[HASH_LENGTH..HASH_LENGTH + 4]
                .try_into()
                .map_err(|_| Error::CorruptedData("bad depth bytes".into()))?,
        );
        let size = u32::from_le_bytes(
            bytes[HASH_LENGTH + 4..]
                .try_into()
                .map_err(|_| Error::CorruptedData("bad size bytes".into()))?,
        );

        Ok(Self { root, depth, size })
    }
}
