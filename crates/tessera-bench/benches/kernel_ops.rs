//! Criterion micro-benchmarks for the broadcasting iteration engine.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use tessera_arena::ArrayArena;
use tessera_bench::{checkerboard_profile, square_profile};
use tessera_core::Value;
use tessera_engine::{Engine, EngineConfig};
use tessera_test_utils::float64;

fn axpy(args: &[Value]) -> Value {
    let x = args[0].as_f64().unwrap_or(0.0);
    let a = args[1].as_f64().unwrap_or(0.0);
    Value::Float(a * x + 1.0)
}

/// Benchmark: `out = a * x + 1` over 64K elements with a broadcast scalar, one worker.
fn bench_map_sequential(c: &mut Criterion) {
    let arena = ArrayArena::default();
    let x = square_profile(&arena, 256);
    let a = arena.scalar(float64(), Value::Float(2.0)).unwrap();
    let out = arena.entity(&[256, 256], float64()).unwrap();
    let engine = Engine::new(EngineConfig {
        worker_count: Some(1),
        ..EngineConfig::default()
    })
    .unwrap();

    c.bench_function("map_axpy_64k_sequential", |b| {
        b.iter(|| black_box(engine.run_map(&arena, axpy, &[x, a], out).unwrap()));
    });
}

/// Benchmark: the same loop over 256K elements with auto-detected workers.
fn bench_map_parallel(c: &mut Criterion) {
    let arena = ArrayArena::default();
    let x = square_profile(&arena, 512);
    let a = arena.scalar(float64(), Value::Float(2.0)).unwrap();
    let out = arena.entity(&[512, 512], float64()).unwrap();
    let engine = Engine::default();

    c.bench_function("map_axpy_256k_parallel", |b| {
        b.iter(|| black_box(engine.run_map(&arena, axpy, &[x, a], out).unwrap()));
    });
}

/// Benchmark: a half-masked input (mask combine + skip path).
fn bench_map_masked(c: &mut Criterion) {
    let arena = ArrayArena::default();
    let x = checkerboard_profile(&arena, 256).unwrap();
    let a = arena.scalar(float64(), Value::Float(2.0)).unwrap();
    let out = arena.entity(&[256, 256], float64()).unwrap();
    let engine = Engine::default();

    c.bench_function("map_axpy_64k_checkerboard", |b| {
        b.iter(|| black_box(engine.run_map(&arena, axpy, &[x, a], out).unwrap()));
    });
}

criterion_group!(benches, bench_map_sequential, bench_map_parallel, bench_map_masked);
criterion_main!(benches);
