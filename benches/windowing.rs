use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::prelude::*;
use seq_windows::prelude::*;

fn create_table(n_rows: usize, n_features: usize) -> TimeTable {
    let mut rng = rand::thread_rng();
    let start = NaiveDate::from_ymd_opt(2020, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let timestamps = (0..n_rows)
        .map(|i| start + Duration::minutes(i as i64))
        .collect();

    let columns = (0..n_features)
        .map(|j| {
            let values: Vec<f64> = (0..n_rows).map(|_| rng.gen::<f64>() * 10.0).collect();
            (format!("feature_{}", j), values)
        })
        .collect();

    TimeTable::from_columns(timestamps, columns).unwrap()
}

fn config(n_features: usize) -> WindowConfig {
    let inputs: Vec<String> = (0..n_features).map(|j| format!("feature_{}", j)).collect();
    WindowConfig::new(inputs, ["feature_0"])
        .with_lookback(48)
        .with_forecast_step(1)
        .with_forecast_length(12)
}

fn bench_anchors(c: &mut Criterion) {
    let mut group = c.benchmark_group("anchors");

    for n_rows in [10_000, 100_000].iter() {
        let table = create_table(*n_rows, 4);
        let step = *n_rows / 50;
        // many short intervals
        let intervals: Vec<(usize, usize)> = (0..50).map(|k| (k * step, k * step + step - 7)).collect();
        let dataset =
            SequenceDataset::new(table, config(4).with_intervals(intervals)).unwrap();

        group.bench_with_input(BenchmarkId::new("enumerate", n_rows), &dataset, |b, ds| {
            b.iter(|| ds.anchors(black_box(RowBounds::all())).unwrap())
        });
    }

    group.finish();
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    group.sample_size(20);

    for n_rows in [10_000, 50_000].iter() {
        let dataset = SequenceDataset::new(create_table(*n_rows, 8), config(8)).unwrap();
        let anchors = dataset.anchors(RowBounds::all()).unwrap();

        group.bench_with_input(BenchmarkId::new("tensors", n_rows), &anchors, |b, anchors| {
            b.iter(|| dataset.data_for(black_box(anchors)).unwrap())
        });
    }

    group.finish();
}

fn bench_deindex(c: &mut Criterion) {
    let mut group = c.benchmark_group("deindex");

    let mut dataset = SequenceDataset::new(
        create_table(20_000, 8),
        config(8).with_split(SplitConfig::random(0.8, 1)),
    )
    .unwrap();
    dataset.generate_split().unwrap();
    let test = dataset.test_data().unwrap();

    group.bench_function("test_set", |b| {
        b.iter(|| {
            dataset
                .deindexify(
                    Some(test.x()),
                    Some(test.y()),
                    black_box(&test.anchors),
                    DeindexOptions::default(),
                )
                .unwrap()
        })
    });

    group.finish();
}

criterion_group!(benches, bench_anchors, bench_build, bench_deindex);
criterion_main!(benches);
