use std::{collections::BTreeMap, sync::Arc};

use assert_matches::assert_matches;
use notetree_storage::MemoryStorage;

use super::*;
use crate::{
    Blake3Hasher,
    test_utils::{leaf, naive_root},
};

fn small_config() -> WorldStateConfig {
    WorldStateConfig {
        tree_name: "notes".to_string(),
        total_depth: 8,
        sub_tree_depth: 2,
    }
}

/// Notes of one batch and the memory tree over them.
fn batch(first_note: u64) -> (Vec<Hash>, MemoryMerkleTree) {
    let notes: Vec<Hash> = (first_note..first_note + 4).map(leaf).collect();
    let tree = MemoryMerkleTree::new(&notes, &Blake3Hasher).expect("memory tree");
    (notes, tree)
}

#[test]
fn test_default_config() {
    let config = WorldStateConfig::default();
    assert_eq!(config.tree_name, DATA_TREE_NAME);
    assert_eq!(config.total_depth, DATA_TREE_DEPTH);
    assert_eq!(config.sub_tree_depth, 0);
    assert_eq!(config.upper_depth(), 32);

    let config = WorldStateConfig::with_sub_tree_depth(NUM_NEW_DATA_TREE_NOTES_PER_TX.ilog2());
    assert_eq!(config.sub_tree_depth, 1);
    assert_eq!(config.upper_depth(), 31);
}

#[test]
fn test_invalid_config() {
    let storage = MemoryStorage::new();
    let config = WorldStateConfig {
        sub_tree_depth: 8,
        ..small_config()
    };
    assert_matches!(
        WorldState::new(&storage, Blake3Hasher, &config),
        Err(Error::InvalidDepth { .. })
    );

    let config = WorldStateConfig {
        total_depth: 33,
        ..small_config()
    };
    assert_matches!(
        WorldState::new(&storage, Blake3Hasher, &config),
        Err(Error::InvalidDepth { depth: 33, .. })
    );

    // the all-zero lower region is built in memory
    let config = WorldStateConfig::with_sub_tree_depth(MAX_SUB_TREE_DEPTH + 1);
    assert_matches!(
        WorldState::new(&storage, Blake3Hasher, &config),
        Err(Error::InvalidDepth {
            depth: 17,
            max: MAX_SUB_TREE_DEPTH
        })
    );
    let config = WorldStateConfig::with_sub_tree_depth(31);
    assert_matches!(
        WorldState::new(&storage, Blake3Hasher, &config),
        Err(Error::InvalidDepth { depth: 31, .. })
    );
}

#[test]
fn test_deepest_lower_region() {
    let storage = MemoryStorage::new();
    let config = WorldStateConfig::with_sub_tree_depth(MAX_SUB_TREE_DEPTH);
    let world = WorldState::new(&storage, Blake3Hasher, &config).expect("world state");
    assert_eq!(world.tree().depth(), DATA_TREE_DEPTH - MAX_SUB_TREE_DEPTH);
    assert_eq!(
        world.tree().default_leaf(),
        world
            .build_zero_hash_path(MAX_SUB_TREE_DEPTH)
            .root(&Blake3Hasher)
            .expect("root")
    );
}

#[test]
fn test_fresh_world_state_is_zero_tree() {
    let storage = MemoryStorage::new();
    let world = WorldState::new(&storage, Blake3Hasher, &small_config()).expect("world state");

    assert_eq!(world.size(), 0);
    assert_eq!(world.tree().depth(), 6);
    assert_eq!(world.tree().name(), "notes");
    assert_eq!(
        world.root(),
        naive_root(&Blake3Hasher, 8, ZERO_ELEMENT, &BTreeMap::new())
    );
    assert_eq!(
        world.tree().default_leaf(),
        world.build_zero_hash_path(2).root(&Blake3Hasher).expect("root")
    );
}

#[test]
fn test_build_zero_hash_path() {
    let storage = MemoryStorage::new();
    let world = WorldState::new(&storage, Blake3Hasher, &small_config()).expect("world state");

    let path = world.build_zero_hash_path(3);
    assert_eq!(path.len(), 3);
    let z1 = Blake3Hasher.compress(&ZERO_ELEMENT, &ZERO_ELEMENT);
    let z2 = Blake3Hasher.compress(&z1, &z1);
    assert_eq!(
        path.data(),
        &[(ZERO_ELEMENT, ZERO_ELEMENT), (z1, z1), (z2, z2)]
    );
    assert!(world.build_zero_hash_path(0).is_empty());
}

#[test]
fn test_convert_index() {
    let storage = MemoryStorage::new();
    let world = WorldState::new(&storage, Blake3Hasher, &small_config()).expect("world state");
    assert_eq!(world.convert_index_to_subtree_index(0), 0);
    assert_eq!(world.convert_index_to_subtree_index(3), 0);
    assert_eq!(world.convert_index_to_subtree_index(4), 1);
    assert_eq!(world.convert_index_to_subtree_index(255), 63);
}

#[test]
fn test_full_hash_path_of_empty_batch() {
    let storage = MemoryStorage::new();
    let world = WorldState::new(&storage, Blake3Hasher, &small_config()).expect("world state");

    let path = world.build_full_hash_path(37).expect("full path");
    assert_eq!(path.len(), 8);
    assert!(path.verify(&Blake3Hasher, 37, &ZERO_ELEMENT, &world.root()));
}

#[test]
fn test_insert_batch_roots() {
    let storage = MemoryStorage::new();
    let mut world =
        WorldState::new(&storage, Blake3Hasher, &small_config()).expect("world state");

    // notes 4..8 form batch 1
    let (notes, sub_tree) = batch(4);
    let root = world.insert_element(4, sub_tree.root()).expect("insert");
    assert_eq!(root, world.root());
    assert_eq!(world.size(), 2);

    let model: BTreeMap<u64, Hash> = (4..8).zip(notes.iter().copied()).collect();
    assert_eq!(world.root(), naive_root(&Blake3Hasher, 8, ZERO_ELEMENT, &model));

    for (offset, note) in notes.iter().enumerate() {
        let index = 4 + offset as u64;
        let lower = sub_tree.hash_path(offset).expect("lower path");
        let path = world
            .build_full_hash_path_with(index, &lower)
            .expect("full path");
        assert_eq!(path.len(), 8);
        assert!(path.verify(&Blake3Hasher, index, note, &world.root()));
    }

    // batches that were never written still verify as zero
    let path = world.build_full_hash_path(13).expect("full path");
    assert!(path.verify(&Blake3Hasher, 13, &ZERO_ELEMENT, &world.root()));
}

#[test]
fn test_insert_elements() {
    let storage = MemoryStorage::new();
    let mut world =
        WorldState::new(&storage, Blake3Hasher, &small_config()).expect("world state");

    let mut model = BTreeMap::new();
    let mut roots = Vec::new();
    for first_note in [8, 12, 16] {
        let (notes, sub_tree) = batch(first_note);
        model.extend((first_note..).zip(notes));
        roots.push(sub_tree.root());
    }

    world.insert_elements(8, &roots).expect("insert");
    assert_eq!(world.size(), 5);
    assert_eq!(world.root(), naive_root(&Blake3Hasher, 8, ZERO_ELEMENT, &model));
    assert_eq!(
        world.hash_path(3).expect("path"),
        world.tree().hash_path(3).expect("path")
    );
}

#[test]
fn test_reattach_and_sync() {
    let storage = Arc::new(MemoryStorage::new());
    let mut writer = WorldState::new(Arc::clone(&storage), Blake3Hasher, &small_config())
        .expect("world state");
    let mut reader = WorldState::new(Arc::clone(&storage), Blake3Hasher, &small_config())
        .expect("world state");

    let (_, sub_tree) = batch(0);
    writer.insert_element(0, sub_tree.root()).expect("insert");
    assert_ne!(reader.root(), writer.root());

    reader.sync_from_db().expect("sync");
    assert_eq!(reader.root(), writer.root());
    assert_eq!(reader.size(), 1);

    let reopened = WorldState::new(Arc::clone(&storage), Blake3Hasher, &small_config())
        .expect("world state");
    assert_eq!(reopened.root(), writer.root());
    assert_eq!(reopened.size(), 1);
}

#[test]
fn test_reattach_with_other_shape_fails() {
    let storage = MemoryStorage::new();
    WorldState::new(&storage, Blake3Hasher, &small_config()).expect("world state");

    let config = WorldStateConfig {
        sub_tree_depth: 3,
        ..small_config()
    };
    assert_matches!(
        WorldState::new(&storage, Blake3Hasher, &config),
        Err(Error::DepthMismatch {
            stored: 6,
            expected: 5,
            ..
        })
    );
}
