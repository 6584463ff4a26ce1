//! DNC Benchmark Suite
//!
//! Hot paths of one step:
//!   content_addressing/{scalar,lanes}/N ... similarity + softmax over N rows
//!   allocation_weighting/N ............... usage sort + product scan
//!   step/R×N×M ........................... full controller + memory step

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use dnc_bench::{key, patterned_memory, warm_engine};
use dnc_core::addressing::{allocation_weighting, content_weighting};
use dnc_core::{LaneKernel, ScalarKernel};

const WIDTH: usize = 32;

fn bench_content_addressing(c: &mut Criterion) {
    let mut group = c.benchmark_group("content_addressing");
    let key = key(WIDTH);
    for locations in [32, 128, 256] {
        let memory = patterned_memory(locations, WIDTH);
        let mut out = vec![0.0; locations];
        group.bench_with_input(BenchmarkId::new("scalar", locations), &locations, |b, _| {
            b.iter(|| {
                content_weighting(&ScalarKernel, black_box(&memory), &key, 20.0, 1e-6, &mut out);
                black_box(&out);
            });
        });
        group.bench_with_input(BenchmarkId::new("lanes", locations), &locations, |b, _| {
            b.iter(|| {
                content_weighting(&LaneKernel, black_box(&memory), &key, 20.0, 1e-6, &mut out);
                black_box(&out);
            });
        });
    }
    group.finish();
}

fn bench_allocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocation_weighting");
    for locations in [32, 256] {
        let usage: Vec<f32> = (0..locations)
            .map(|i| ((i * 7919) % locations) as f32 / locations as f32)
            .collect();
        let mut order = vec![0; locations];
        let mut out = vec![0.0; locations];
        group.bench_with_input(BenchmarkId::from_parameter(locations), &locations, |b, _| {
            b.iter(|| {
                allocation_weighting(black_box(&usage), &mut order, &mut out);
                black_box(&out);
            });
        });
    }
    group.finish();
}

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("step");
    for (heads, locations, width) in [(2, 32, 8), (4, 128, 32), (4, 256, 64)] {
        let mut dnc = warm_engine(heads, locations, width);
        let input = [0.5_f32; 8];
        let id = format!("{heads}x{locations}x{width}");
        group.bench_function(id, |b| {
            b.iter(|| {
                dnc.step(black_box(&input)).expect("input is 8 wide");
                black_box(dnc.output());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_content_addressing, bench_allocation, bench_step);
criterion_main!(benches);
