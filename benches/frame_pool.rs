/// Frame pool benchmarks
///
/// Compares pooled frame reuse against fresh allocation and measures the
/// tree-recycle path that runs at every profile end.
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

use medir::frame::{CallFrame, FramePool, FramePoolConfig};

fn build_tree(pool: &mut FramePool, children: usize) -> CallFrame {
    let mut root = pool.acquire("root");
    for _ in 0..children {
        root.push_child(pool.acquire("child"));
    }
    root
}

/// Benchmark: single acquire/release cycle
fn bench_acquire_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("acquire_release");
    group.measurement_time(Duration::from_secs(5));
    group.throughput(Throughput::Elements(1));

    group.bench_function("pooled", |b| {
        let mut pool = FramePool::new(FramePoolConfig::new(1024));
        b.iter(|| {
            let frame = pool.acquire(black_box("hot_fn"));
            black_box(&frame);
            pool.release(frame);
        });
    });

    group.bench_function("unpooled", |b| {
        let mut pool = FramePool::new(FramePoolConfig::disabled());
        b.iter(|| {
            let frame = pool.acquire(black_box("hot_fn"));
            black_box(&frame);
            pool.release(frame);
        });
    });

    group.finish();
}

/// Benchmark: bursts of acquires, the shape of a busy profile
fn bench_acquire_burst(c: &mut Criterion) {
    let mut group = c.benchmark_group("acquire_burst");
    group.measurement_time(Duration::from_secs(5));
    group.throughput(Throughput::Elements(1000));

    group.bench_function("pooled_1000", |b| {
        let mut pool = FramePool::new(FramePoolConfig::new(1024));
        b.iter(|| {
            let mut frames = Vec::with_capacity(1000);
            for _ in 0..1000 {
                frames.push(pool.acquire("hot_fn"));
            }
            for frame in frames {
                pool.release(frame);
            }
        });
    });

    group.bench_function("unpooled_1000", |b| {
        let mut pool = FramePool::new(FramePoolConfig::disabled());
        b.iter(|| {
            let mut frames = Vec::with_capacity(1000);
            for _ in 0..1000 {
                frames.push(pool.acquire("hot_fn"));
            }
            for frame in frames {
                pool.release(frame);
            }
        });
    });

    group.finish();
}

/// Benchmark: recycling whole frame trees at profile end
fn bench_tree_recycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_recycle");
    group.measurement_time(Duration::from_secs(5));

    for children in [10usize, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*children as u64 + 1));
        group.bench_with_input(
            BenchmarkId::from_parameter(children),
            children,
            |b, &children| {
                let mut pool = FramePool::new(FramePoolConfig::new(2048));
                b.iter(|| {
                    let root = build_tree(&mut pool, children);
                    pool.release_tree(root);
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_acquire_release,
    bench_acquire_burst,
    bench_tree_recycle
);

criterion_main!(benches);
