//! Solver and cached lookup benchmarks over square grid networks.
//!
//! Run with: cargo bench -p haven_core

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use haven_core::prelude::*;

/// `side * side` grid with unit roads between orthogonal neighbours and a
/// diagonal band of hazards the solver has to route around
fn build_grid(side: usize) -> RouteService {
    let service = RouteService::builder(Arc::new(GraphStore::new())).build();
    let id = |row: usize, col: usize| format!("n{row}_{col}");

    for row in 0..side {
        for col in 0..side {
            let mut node = Node::new(id(row, col), row as f64 * 0.001, col as f64 * 0.001);
            node.is_safe = !(row == col && row > 0 && row + 1 < side);
            service.create_node(node).expect("grid node");
        }
    }
    for row in 0..side {
        for col in 0..side {
            if col + 1 < side {
                service
                    .create_edge(Edge::new(id(row, col), id(row, col + 1), 1.0))
                    .expect("grid edge");
            }
            if row + 1 < side {
                service
                    .create_edge(Edge::new(id(row, col), id(row + 1, col), 1.0))
                    .expect("grid edge");
            }
        }
    }
    service
}

fn bench_solve(c: &mut Criterion) {
    let mut group = c.benchmark_group("solve");

    for side in [10, 50, 100] {
        let service = build_grid(side);
        let snapshot = service.store().snapshot();
        let end = format!("n{}_{}", side - 1, side - 1);

        group.bench_with_input(BenchmarkId::new("avoid_unsafe", side), &side, |b, _| {
            b.iter(|| {
                let route = solve(&snapshot, black_box("n0_0"), black_box(&end), TraversalPolicy::AvoidUnsafe);
                black_box(route)
            });
        });
        group.bench_with_input(BenchmarkId::new("blocked_only", side), &side, |b, _| {
            b.iter(|| {
                let route = solve(&snapshot, black_box("n0_0"), black_box(&end), TraversalPolicy::BlockedOnly);
                black_box(route)
            });
        });
    }

    group.finish();
}

fn bench_cached_lookup(c: &mut Criterion) {
    let service = build_grid(50);
    service.find_safest_route("n0_0", "n49_49").expect("warm cache");

    c.bench_function("cached_lookup", |b| {
        b.iter(|| black_box(service.find_safest_route(black_box("n0_0"), black_box("n49_49"))));
    });
}

criterion_group!(benches, bench_solve, bench_cached_lookup);
criterion_main!(benches);
