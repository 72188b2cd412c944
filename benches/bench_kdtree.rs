use std::time::Instant;

use criterion::{criterion_group, criterion_main, Criterion};
use nalgebra::Vector3;
use ndarray::Array1;
use pprof::criterion::{Output, PProfProfiler};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use scanfuse::kdtree::KdTree;

fn random_points(n: usize, seed: u64) -> Array1<Vector3<f64>> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            Vector3::new(
                rng.gen_range(-50.0..50.0),
                rng.gen_range(-50.0..50.0),
                rng.gen_range(-2.0..5.0),
            )
        })
        .collect()
}

fn kdtree_benchmark(c: &mut Criterion) {
    const N: usize = 200_000;

    let points = random_points(N, 5);
    let queries = random_points(N, 7);

    c.bench_function("kdtree creation", |b| {
        b.iter(|| KdTree::new(&points.view()));
    });

    c.bench_function("kdtree search", |b| {
        let tree = KdTree::new(&points.view());
        b.iter_custom(|iters| {
            let start = Instant::now();
            for _i in 0..iters {
                tree.nearest_all(&queries.view());
            }
            start.elapsed()
        });
    });

    c.bench_function("kdtree knn", |b| {
        let tree = KdTree::new(&points.view());
        b.iter(|| {
            for query in queries.iter().take(10_000) {
                tree.nearest_k(query, 10);
            }
        });
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().with_profiler(PProfProfiler::new(100, Output::Flamegraph(None)));
    targets = kdtree_benchmark
}

criterion_main!(benches);
