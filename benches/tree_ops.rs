//! CSB+-tree against `std::collections::BTreeMap` on u64 keys.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use csb_tree::CsbTree;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

fn generate_keys(n: usize) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..n).map(|_| rng.gen()).collect()
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");

    for size in [1_000, 10_000, 100_000].iter() {
        let keys = generate_keys(*size);

        group.bench_with_input(BenchmarkId::new("BTreeMap", size), size, |b, _| {
            b.iter(|| {
                let mut map: BTreeMap<u64, u64> = BTreeMap::new();
                for (i, key) in keys.iter().enumerate() {
                    map.insert(*key, i as u64);
                }
                black_box(map)
            });
        });

        group.bench_with_input(BenchmarkId::new("CsbTree", size), size, |b, _| {
            b.iter(|| {
                let mut tree = CsbTree::new();
                for (i, key) in keys.iter().enumerate() {
                    tree.insert(*key, i as u64).unwrap();
                }
                black_box(tree)
            });
        });

        group.bench_with_input(BenchmarkId::new("CsbTree/sequential", size), size, |b, &n| {
            b.iter(|| {
                let mut tree = CsbTree::new();
                for key in 0..n as u64 {
                    tree.insert(key, key).unwrap();
                }
                black_box(tree)
            });
        });
    }

    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");

    for size in [1_000, 10_000, 100_000].iter() {
        let keys = generate_keys(*size);

        let mut btree: BTreeMap<u64, u64> = BTreeMap::new();
        let mut tree = CsbTree::new();
        for (i, key) in keys.iter().enumerate() {
            btree.insert(*key, i as u64);
            tree.insert(*key, i as u64).unwrap();
        }

        group.bench_with_input(BenchmarkId::new("BTreeMap", size), size, |b, _| {
            b.iter(|| {
                let mut sum = 0u64;
                for key in keys.iter() {
                    if let Some(v) = btree.get(key) {
                        sum = sum.wrapping_add(*v);
                    }
                }
                black_box(sum)
            });
        });

        group.bench_with_input(BenchmarkId::new("CsbTree", size), size, |b, _| {
            b.iter(|| {
                let mut sum = 0u64;
                for key in keys.iter() {
                    if let Some(v) = tree.get(*key).unwrap() {
                        sum = sum.wrapping_add(v);
                    }
                }
                black_box(sum)
            });
        });
    }

    group.finish();
}

fn bench_iterate(c: &mut Criterion) {
    let mut group = c.benchmark_group("iterate");

    let keys = generate_keys(100_000);
    let mut btree: BTreeMap<u64, u64> = BTreeMap::new();
    let mut tree = CsbTree::new();
    for (i, key) in keys.iter().enumerate() {
        btree.insert(*key, i as u64);
        tree.insert(*key, i as u64).unwrap();
    }

    group.bench_function("BTreeMap", |b| {
        b.iter(|| black_box(btree.iter().fold(0u64, |acc, (_, v)| acc.wrapping_add(*v))))
    });

    group.bench_function("CsbTree", |b| {
        b.iter(|| {
            black_box(
                tree.iter()
                    .unwrap()
                    .fold(0u64, |acc, (_, v)| acc.wrapping_add(v)),
            )
        })
    });

    group.finish();
}

criterion_group!(benches, bench_insert, bench_lookup, bench_iterate);
criterion_main!(benches);
