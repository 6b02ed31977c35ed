//! Authentication paths.

use crate::{
    Error,
    hasher::{HASH_LENGTH, Hash, Hasher},
};

const PAIR_LENGTH: usize = HASH_LENGTH * 2;
const COUNT_LENGTH: usize = 4;

/// Authentication path from a leaf up to the root.
///
/// Entry `i` holds the two children of the node at height `i + 1`, so the
/// first pair contains the leaf itself and the last pair hashes to the root.
/// A path produced by a tree of depth `d` has exactly `d` entries.
///
/// Wire format: a big-endian `u32` pair count followed by `left || right` for
/// each pair, leaf layer first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashPath {
    data: Vec<(Hash, Hash)>,
}

impl HashPath {
    /// Wrap a list of pairs, leaf layer first.
    pub fn new(data: Vec<(Hash, Hash)>) -> Self {
        Self { data }
    }

    /// Path of a tree below `lower` joined with the path of the tree above.
    pub fn concat(lower: &HashPath, upper: &HashPath) -> Self {
        let mut data = Vec::with_capacity(lower.len() + upper.len());
        data.extend_from_slice(&lower.data);
        data.extend_from_slice(&upper.data);
        Self { data }
    }

    /// Pairs, leaf layer first.
    pub fn data(&self) -> &[(Hash, Hash)] {
        &self.data
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the path has no pairs.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Take the pairs out.
    pub fn into_inner(self) -> Vec<(Hash, Hash)> {
        self.data
    }

    /// Root the path commits to, `None` for an empty path.
    pub fn root<H: Hasher>(&self, hasher: &H) -> Option<Hash> {
        self.data
            .last()
            .map(|(left, right)| hasher.compress(left, right))
    }

    /// Checks that `leaf` sits at `index` under `root` according to this path.
    ///
    /// Every level must contain the hash of the level below on the side
    /// selected by the corresponding index bit.
    pub fn verify<H: Hasher>(&self, hasher: &H, index: u64, leaf: &Hash, root: &Hash) -> bool {
        if self.data.is_empty() {
            return leaf == root;
        }

        let mut current = *leaf;
        for (level, (left, right)) in self.data.iter().enumerate() {
            let expected = if (index >> level) & 1 == 1 { right } else { left };
            if *expected != current {
                return false;
            }
            current = hasher.compress(left, right);
        }

        current == *root
    }

    /// Serialize into the wire format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(COUNT_LENGTH + self.data.len() * PAIR_LENGTH);
        bytes.extend_from_slice(&(self.data.len() as u32).to_be_bytes());
        for (left, right) in &self.data {
            bytes.extend_from_slice(left);
            bytes.extend_from_slice(right);
        }
        bytes
    }

    /// Deserialize a path occupying all of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let (path, read) = Self::deserialize(bytes, 0)?;
        if read != bytes.len() {
            return Err(Error::CorruptedData(format!(
                "hash path: {} trailing bytes",
                bytes.len() - read
            )));
        }
        Ok(path)
    }

    /// Deserialize a path starting at `offset`.
    ///
    /// Returns the path and the number of bytes consumed.
    pub fn deserialize(bytes: &[u8], offset: usize) -> Result<(Self, usize), Error> {
        let input = bytes.get(offset..).ok_or_else(|| {
            Error::CorruptedData(format!(
                "hash path: offset {offset} past end of {} bytes",
                bytes.len()
            ))
        })?;

        let count_bytes: [u8; COUNT_LENGTH] = input
            .get(..COUNT_LENGTH)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| Error::CorruptedData("hash path: missing pair count".into()))?;
        let count = u32::from_be_bytes(count_bytes) as usize;

        let needed = count
            .checked_mul(PAIR_LENGTH)
            .and_then(|n| n.checked_add(COUNT_LENGTH))
            .ok_or_else(|| Error::CorruptedData(format!("hash path: bad pair count {count}")))?;
        let body = input.get(COUNT_LENGTH..needed).ok_or_else(|| {
            Error::CorruptedData(format!(
                "hash path: expected {needed} bytes for {count} pairs, got {}",
                input.len()
            ))
        })?;

        let data = body
            .chunks_exact(PAIR_LENGTH)
            .map(|pair| {
                let mut left = [0u8; HASH_LENGTH];
                let mut right = [0u8; HASH_LENGTH];
                left.copy_from_slice(&pair[..HASH_LENGTH]);
                right.copy_from_slice(&pair[HASH_LENGTH..]);
                (left, right)
            })
            .collect();

        Ok((Self { data }, needed))
    }
}

impl From<Vec<(Hash, Hash)>> for HashPath {
    fn from(data: Vec<(Hash, Hash)>) -> Self {
        Self::new(data)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::Blake3Hasher;

    fn sample_path() -> HashPath {
        HashPath::new(vec![([1u8; 32], [2u8; 32]), ([3u8; 32], [4u8; 32])])
    }

    #[test]
    fn test_wire_layout() {
        let bytes = sample_path().to_bytes();
        assert_eq!(bytes.len(), 4 + 2 * 64);
        assert_eq!(&bytes[..4], &[0, 0, 0, 2]);
        assert_eq!(&bytes[4..36], &[1u8; 32]);
        assert_eq!(&bytes[36..68], &[2u8; 32]);
        assert_eq!(&bytes[68..100], &[3u8; 32]);
        assert_eq!(&bytes[100..], &[4u8; 32]);
        assert_eq!(HashPath::from_bytes(&bytes).expect("decode"), sample_path());
    }

    #[test]
    fn test_empty_path() {
        let bytes = HashPath::default().to_bytes();
        assert_eq!(bytes, vec![0, 0, 0, 0]);
        assert!(HashPath::from_bytes(&bytes).expect("decode").is_empty());
    }

    #[test]
    fn test_deserialize_at_offset() {
        let mut bytes = vec![0xAA; 3];
        bytes.extend(sample_path().to_bytes());
        bytes.push(0xBB);

        let (path, read) = HashPath::deserialize(&bytes, 3).expect("decode");
        assert_eq!(path, sample_path());
        assert_eq!(read, 4 + 2 * 64);
        assert_eq!(bytes[3 + read], 0xBB);
    }

    #[test]
    fn test_truncated_input_is_rejected() {
        let bytes = sample_path().to_bytes();
        assert_matches!(
            HashPath::from_bytes(&bytes[..bytes.len() - 1]),
            Err(Error::CorruptedData(_))
        );
        assert_matches!(HashPath::from_bytes(&bytes[..2]), Err(Error::CorruptedData(_)));
        assert_matches!(HashPath::deserialize(&bytes, 500), Err(Error::CorruptedData(_)));
    }

    #[test]
    fn test_trailing_bytes_are_rejected() {
        let mut bytes = sample_path().to_bytes();
        bytes.push(0);
        assert_matches!(HashPath::from_bytes(&bytes), Err(Error::CorruptedData(_)));
    }

    #[test]
    fn test_verify() {
        let hasher = Blake3Hasher;
        let leaves = [[0u8; 32], [1u8; 32], [2u8; 32], [3u8; 32]];
        let left = hasher.compress(&leaves[0], &leaves[1]);
        let right = hasher.compress(&leaves[2], &leaves[3]);
        let root = hasher.compress(&left, &right);

        let path = HashPath::new(vec![(leaves[2], leaves[3]), (left, right)]);
        assert_eq!(path.root(&hasher), Some(root));
        assert!(path.verify(&hasher, 2, &leaves[2], &root));
        assert!(!path.verify(&hasher, 3, &leaves[2], &root));
        assert!(!path.verify(&hasher, 2, &leaves[1], &root));
        assert!(!path.verify(&hasher, 2, &leaves[2], &left));
    }

    #[test]
    fn test_concat() {
        let lower = HashPath::new(vec![([1u8; 32], [2u8; 32])]);
        let upper = HashPath::new(vec![([3u8; 32], [4u8; 32])]);
        assert_eq!(HashPath::concat(&lower, &upper), sample_path());
    }
}
