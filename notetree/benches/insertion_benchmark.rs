use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use notetree::{Blake3Hasher, Hash, MerkleTree, ZERO_ELEMENT, storage::MemoryStorage};

const DEPTH: u32 = 32;

fn notes(count: u64) -> Vec<Hash> {
    (0..count)
        .map(|i| *blake3::hash(&i.to_le_bytes()).as_bytes())
        .collect()
}

fn empty_tree() -> MerkleTree<MemoryStorage, Blake3Hasher> {
    MerkleTree::new(MemoryStorage::new(), Blake3Hasher, "data", DEPTH, ZERO_ELEMENT).unwrap()
}

pub fn single_insertion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("single element insertion");
    for count in [64u64, 1024] {
        let values = notes(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &values, |b, values| {
            b.iter_batched(
                empty_tree,
                |mut tree| {
                    for (index, value) in values.iter().enumerate() {
                        tree.update_element(index as u64, *value).unwrap();
                    }
                    tree
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

pub fn bulk_insertion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("bulk insertion");
    for count in [64u64, 1024, 1000] {
        let values = notes(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &values, |b, values| {
            b.iter_batched(
                empty_tree,
                |mut tree| {
                    tree.update_elements(0, values).unwrap();
                    tree
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

pub fn hash_path_benchmark(c: &mut Criterion) {
    let mut tree = empty_tree();
    tree.update_elements(0, &notes(1024)).unwrap();
    for index in (0..1024).step_by(7) {
        tree.update_element(index, ZERO_ELEMENT).unwrap();
    }

    c.bench_function("hash path", |b| {
        let mut index = 0u64;
        b.iter(|| {
            index = (index + 13) % 2048;
            tree.hash_path(index).unwrap()
        })
    });
}

criterion_group!(
    benches,
    single_insertion_benchmark,
    bulk_insertion_benchmark,
    hash_path_benchmark,
);
criterion_main!(benches);
