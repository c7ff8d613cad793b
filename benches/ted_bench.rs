//! Criterion benchmarks for tree edit distance and batch comparison.
//!
//! Run with: cargo bench

use ast_similarity::compare::compare_batch;
use ast_similarity::equivalence::are_equivalent;
use ast_similarity::models::ComparisonParams;
use ast_similarity::ted::tree_edit_distance;
use ast_similarity::AstNode;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::collections::BTreeMap;

/// Ternary tree with `size` nodes; leaves are identifiers labelled by `label`.
fn build_tree(size: usize, label: &dyn Fn(usize) -> String) -> AstNode {
    fn build(i: usize, size: usize, label: &dyn Fn(usize) -> String) -> AstNode {
        let children: Vec<AstNode> = (1..=3)
            .map(|k| 3 * i + k)
            .filter(|&c| c < size)
            .map(|c| build(c, size, label))
            .collect();
        if children.is_empty() {
            AstNode::new("identifier", label(i))
        } else {
            AstNode::branch("block", children)
        }
    }
    build(0, size.max(1), label)
}

fn bench_ted(c: &mut Criterion) {
    let sizes = [50, 200, 500];

    let mut group = c.benchmark_group("zhang_shasha");

    for size in sizes {
        let base = build_tree(size, &|i| format!("v{}", i));

        // Identical trees (every leaf matches)
        group.bench_with_input(BenchmarkId::new("identical", size), &size, |b, _| {
            b.iter(|| tree_edit_distance(black_box(Some(&base)), black_box(Some(&base))))
        });

        // 70% of leaf labels match
        let partial = build_tree(size, &|i| {
            if i % 10 < 7 {
                format!("v{}", i)
            } else {
                format!("w{}", i)
            }
        });
        group.bench_with_input(BenchmarkId::new("70pct_match", size), &size, |b, _| {
            b.iter(|| tree_edit_distance(black_box(Some(&base)), black_box(Some(&partial))))
        });

        // Different shape: half as many nodes
        let smaller = build_tree(size / 2, &|i| format!("v{}", i));
        group.bench_with_input(BenchmarkId::new("half_size", size), &size, |b, _| {
            b.iter(|| tree_edit_distance(black_box(Some(&base)), black_box(Some(&smaller))))
        });
    }

    group.finish();
}

fn bench_equivalence(c: &mut Criterion) {
    let mut group = c.benchmark_group("equivalence");

    for size in [200, 2000] {
        let a = build_tree(size, &|i| format!("v{}", i));
        let b = build_tree(size, &|i| format!("w{}", i));

        group.bench_with_input(BenchmarkId::new("ignore_names", size), &size, |bench, _| {
            bench.iter(|| are_equivalent(black_box(Some(&a)), black_box(Some(&b)), true))
        });
    }

    group.finish();
}

fn bench_batch(c: &mut Criterion) {
    let params = ComparisonParams::default();

    let mut group = c.benchmark_group("batch");
    group.sample_size(10);

    for count in [8, 16] {
        let trees: BTreeMap<String, AstNode> = (0..count)
            .map(|n| {
                let tree = build_tree(100 + n * 5, &|i| format!("v{}", (i + n) % 7));
                (format!("s{:02}.ast.json", n), tree)
            })
            .collect();

        group.bench_with_input(BenchmarkId::new("all_pairs", count), &count, |b, _| {
            b.iter(|| compare_batch(black_box(trees.clone()), &params, false))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_ted, bench_equivalence, bench_batch);
criterion_main!(benches);
