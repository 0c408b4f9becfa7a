// SPDX-License-Identifier: PMPL-1.0-or-later
//! Performance benchmarks for the joint nested ragged tensor dictionary.

use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use jnrtd_core::shape::RawValue;
use jnrtd_core::{FlattenMode, Index, Jnrtd, PaddingSide};

/// A depth-1 ragged key: `n_outer` groups, each of `inner_len` leaves, every
/// third group one leaf longer so the shape stays genuinely ragged.
fn ragged_depth1(n_outer: usize, inner_len: usize) -> BTreeMap<String, RawValue> {
    let mut rows = Vec::with_capacity(n_outer);
    for i in 0..n_outer {
        let len = if i % 3 == 0 { inner_len + 1 } else { inner_len };
        let leaves = (0..len).map(|j| RawValue::Int(((i + j) % 1000) as i64)).collect();
        rows.push(RawValue::List(leaves));
    }
    let mut m = BTreeMap::new();
    m.insert("T".to_string(), RawValue::List(rows));
    m
}

/// A depth-2 ragged key nested one level deeper than [`ragged_depth1`].
fn ragged_depth2(n_outer: usize, mid_len: usize, inner_len: usize) -> BTreeMap<String, RawValue> {
    let mut rows = Vec::with_capacity(n_outer);
    for i in 0..n_outer {
        let mut groups = Vec::with_capacity(mid_len);
        for g in 0..mid_len {
            let len = if g % 2 == 0 { inner_len } else { inner_len + 1 };
            let leaves = (0..len).map(|j| RawValue::Int(((i + g + j) % 1000) as i64)).collect();
            groups.push(RawValue::List(leaves));
        }
        rows.push(RawValue::List(groups));
    }
    let mut m = BTreeMap::new();
    m.insert("id".to_string(), RawValue::List(rows));
    m
}

fn bench_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("construction");
    for &n in &[100usize, 1_000, 10_000] {
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("from_raw_depth1", n), &n, |b, &n| {
            b.iter(|| black_box(Jnrtd::from_raw(&ragged_depth1(n, 8)).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("from_raw_depth2", n), &n, |b, &n| {
            b.iter(|| black_box(Jnrtd::from_raw(&ragged_depth2(n, 4, 4)).unwrap()));
        });
    }
    group.finish();
}

fn bench_slicing(c: &mut Criterion) {
    let mut group = c.benchmark_group("slicing");
    let j = Jnrtd::from_raw(&ragged_depth2(10_000, 4, 4)).unwrap();

    group.bench_function("single_index", |b| {
        b.iter(|| black_box(j.get(&Index::Int(5_000)).unwrap()));
    });

    group.bench_function("range_1000_rows", |b| {
        b.iter(|| black_box(j.get(&Index::Range(Some(1_000), Some(2_000))).unwrap()));
    });

    group.bench_function("tuple_index_then_range", |b| {
        b.iter(|| black_box(j.get(&Index::Tuple(vec![Index::Int(3), Index::Range(None, None)])).unwrap()));
    });

    group.bench_function("index_array_100", |b| {
        let picks: Vec<i64> = (0..100).map(|i| (i * 37) % 10_000).collect();
        b.iter(|| black_box(j.get(&Index::Array(picks.clone())).unwrap()));
    });

    group.finish();
}

fn bench_file_backed_slicing(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_backed");
    let j = Jnrtd::from_raw(&ragged_depth2(10_000, 4, 4)).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bench.jnrtd");
    j.save(&path).unwrap();

    group.bench_function("open", |b| {
        b.iter(|| black_box(Jnrtd::open(&path).unwrap()));
    });

    let opened = Jnrtd::open(&path).unwrap();
    group.bench_function("single_index_over_mmap", |b| {
        b.iter(|| black_box(opened.get(&Index::Int(5_000)).unwrap()));
    });

    group.finish();
}

fn bench_densification(c: &mut Criterion) {
    let mut group = c.benchmark_group("densification");
    let j = Jnrtd::from_raw(&ragged_depth2(1_000, 4, 4)).unwrap();

    group.bench_function("to_dense_right_pad", |b| {
        b.iter(|| black_box(j.to_dense(PaddingSide::Right).unwrap()));
    });
    group.bench_function("to_dense_left_pad", |b| {
        b.iter(|| black_box(j.to_dense(PaddingSide::Left).unwrap()));
    });

    group.finish();
}

fn bench_algebra(c: &mut Criterion) {
    let mut group = c.benchmark_group("algebra");
    let j = Jnrtd::from_raw(&ragged_depth1(1_000, 8)).unwrap();

    group.bench_function("unsqueeze", |b| {
        b.iter(|| black_box(j.unsqueeze().unwrap()));
    });

    let wrapped = j.unsqueeze().unwrap();
    group.bench_function("squeeze", |b| {
        b.iter(|| black_box(wrapped.squeeze().unwrap()));
    });

    let rows: Vec<Jnrtd> = (0..100).map(|i| j.get(&Index::Int(i)).unwrap()).collect();
    group.bench_function("vstack_100_rows", |b| {
        b.iter(|| black_box(Jnrtd::vstack(&rows).unwrap()));
    });

    let halves = vec![
        j.get(&Index::Range(Some(0), Some(500))).unwrap(),
        j.get(&Index::Range(Some(500), Some(1_000))).unwrap(),
    ];
    group.bench_function("concatenate_two_halves", |b| {
        b.iter(|| black_box(Jnrtd::concatenate(&halves).unwrap()));
    });

    let j2 = Jnrtd::from_raw(&ragged_depth2(1_000, 4, 4)).unwrap();
    group.bench_function("flatten_innermost_axis", |b| {
        b.iter(|| black_box(j2.flatten(FlattenMode::RejectSiblingKey).unwrap()));
    });

    group.finish();
}

criterion_group!(construction_benches, bench_construction);
criterion_group!(slicing_benches, bench_slicing);
criterion_group!(file_backed_benches, bench_file_backed_slicing);
criterion_group!(densification_benches, bench_densification);
criterion_group!(algebra_benches, bench_algebra);

criterion_main!(
    construction_benches,
    slicing_benches,
    file_backed_benches,
    densification_benches,
    algebra_benches
);
