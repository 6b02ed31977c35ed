//! Helpers shared by the unit tests.

use std::collections::BTreeMap;

use crate::hasher::{Hash, Hasher};

/// Distinct, deterministic leaf value for `i`.
pub(crate) fn leaf(i: u64) -> Hash {
    *blake3::hash(&i.to_le_bytes()).as_bytes()
}

/// Root of a tree of `depth` whose leaves are `leaves` and `default_leaf`
/// everywhere else, computed layer by layer without any storage.
pub(crate) fn naive_root<H: Hasher>(
    hasher: &H,
    depth: u32,
    default_leaf: Hash,
    leaves: &BTreeMap<u64, Hash>,
) -> Hash {
    let mut zero = default_leaf;
    let mut layer = leaves.clone();
    for _ in 0..depth {
        let mut next = BTreeMap::new();
        for &index in layer.keys() {
            let parent = index >> 1;
            if next.contains_key(&parent) {
                continue;
            }
            let left = layer.get(&(parent * 2)).copied().unwrap_or(zero);
            let right = layer.get(&(parent * 2 + 1)).copied().unwrap_or(zero);
            next.insert(parent, hasher.compress(&left, &right));
        }
        layer = next;
        zero = hasher.compress(&zero, &zero);
    }
    layer.get(&0).copied().unwrap_or(zero)
}
