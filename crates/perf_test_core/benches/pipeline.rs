//! Benchmarks for the benchmark task pipeline using Criterion.rs.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use perf_test_core::contract::TaskRules;
use perf_test_core::fixtures::{generate_dataset, MakeModel, ReferenceData};
use perf_test_core::task::{encode_records, filter_and_augment, process_dataset, sort_by_plate};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn reference() -> ReferenceData {
    ReferenceData::new(
        vec![
            MakeModel {
                make: "Ford".to_string(),
                model: "Focus".to_string(),
            },
            MakeModel {
                make: "Volkswagen".to_string(),
                model: "Golf".to_string(),
            },
            MakeModel {
                make: "Toyota".to_string(),
                model: "Corolla".to_string(),
            },
        ],
        vec!["Germany".to_string(), "Japan".to_string()],
    )
    .expect("reference data should be valid")
}

fn bench_process_dataset(c: &mut Criterion) {
    let reference = reference();
    let mut group = c.benchmark_group("process_dataset");
    for size in [1_000usize, 10_000, 100_000] {
        let dataset = generate_dataset(&mut StdRng::seed_from_u64(42), &reference, size)
            .expect("dataset should generate");
        group.bench_with_input(BenchmarkId::from_parameter(size), &dataset, |b, dataset| {
            b.iter(|| black_box(process_dataset(dataset, &TaskRules::default())))
        });
    }
    group.finish();
}

fn bench_stages(c: &mut Criterion) {
    let dataset = generate_dataset(&mut StdRng::seed_from_u64(7), &reference(), 10_000)
        .expect("dataset should generate");
    let rules = TaskRules::default();
    let filtered = filter_and_augment(&dataset, &rules).expect("filter should pass");

    c.bench_function("filter_and_augment/10000", |b| {
        b.iter(|| black_box(filter_and_augment(&dataset, &rules)))
    });
    c.bench_function("sort_by_plate/10000", |b| {
        b.iter(|| {
            let mut records = filtered.clone();
            sort_by_plate(&mut records);
            black_box(records)
        })
    });
    c.bench_function("encode_records/10000", |b| {
        b.iter(|| black_box(encode_records(&filtered, rules.separators)))
    });
}

criterion_group!(benches, bench_process_dataset, bench_stages);
criterion_main!(benches);
