//! Benchmarks for the per-step hot paths: ensemble integration at several
//! sizes, field integration at several grid sizes, and the one-off spatial
//! weight precompute. `cargo bench --features parallel` exercises the rayon
//! derivative loops.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use kurafield::ensemble::{EnsembleConfig, KuramotoEnsemble};
use kurafield::field::{AttentionField, FieldConfig, StimulusSpec};
use kurafield::prng::Prng;
use kurafield::topology::Topology;

fn make_ensemble(n: usize, seed: u64) -> KuramotoEnsemble {
    KuramotoEnsemble::new(EnsembleConfig {
        n,
        coupling: 2.0,
        dt: 0.05,
        noise_level: 0.1,
        seed: Some(seed),
        ..EnsembleConfig::default()
    })
    .expect("valid bench config")
}

/// step() with dense all-to-all coupling at varying N (O(N^2) per call).
fn bench_ensemble_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("ensemble_step");
    for size in [32usize, 64, 128, 256].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("all_to_all", size), size, |b, &size| {
            let mut ens = make_ensemble(size, 42);
            b.iter(|| {
                ens.step();
                black_box(ens.order_parameter())
            });
        });
        group.bench_with_input(BenchmarkId::new("small_world", size), size, |b, &size| {
            let mut ens = make_ensemble(size, 42);
            let mut rng = Prng::new(42);
            ens.set_network(Topology::small_world(size, 6, 0.1, &mut rng))
                .expect("matching size");
            b.iter(|| {
                ens.step();
                black_box(ens.order_parameter())
            });
        });
    }
    group.finish();
}

/// Field step() at varying grid sizes (O(grid^4) coupling support).
fn bench_field_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("field_step");
    group.sample_size(20);
    for grid in [8usize, 16, 24, 32].iter() {
        group.throughput(Throughput::Elements((grid * grid) as u64));
        group.bench_with_input(BenchmarkId::new("spatial", grid), grid, |b, &grid| {
            let mut field = AttentionField::new(FieldConfig {
                grid_size: grid,
                seed: Some(42),
                ..FieldConfig::default()
            })
            .expect("valid bench config");
            field.add_stimulus_object(StimulusSpec {
                vx: Some(0.5),
                vy: Some(0.3),
                ..StimulusSpec::default()
            });
            b.iter(|| {
                field.step();
                black_box(field.attention_map()[0])
            });
        });
    }
    group.finish();
}

/// Spatial weight tensor recomputation (setup cost, O(grid^4)).
fn bench_weight_precompute(c: &mut Criterion) {
    let mut group = c.benchmark_group("weight_precompute");
    group.sample_size(10);
    for grid in [16usize, 32].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(grid), grid, |b, &grid| {
            b.iter(|| {
                let field = AttentionField::new(FieldConfig {
                    grid_size: grid,
                    seed: Some(1),
                    ..FieldConfig::default()
                })
                .expect("valid bench config");
                black_box(field.cell_count())
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_ensemble_step,
    bench_field_step,
    bench_weight_precompute
);
criterion_main!(benches);
