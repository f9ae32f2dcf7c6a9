//! Benchmarks for the history statistics and chart rendering
//!
//! The windowed average is quadratic in the number of records; these
//! benchmarks track it at one day, one week and one month of hourly runs.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use netspeed_bot::{
    chart,
    models::{MeasurementRecord, Sample, SourceKind, SourceResults},
    stats::{aggregate_series, median, windowed_average, HistorySummary, TimePoint},
};
use std::hint::black_box;
use std::time::Duration;

const START: f64 = 1_700_000_000.0;
const AVERAGE_WINDOW: Duration = Duration::from_secs(3 * 60 * 60);

/// Hourly records with all four sources
fn create_history(count: usize) -> Vec<MeasurementRecord> {
    (0..count)
        .map(|i| {
            let wobble = (i % 17) as f64;
            let results: SourceResults = [
                (SourceKind::Speedtest, Sample::new(90.0 + wobble, 9.0 + wobble / 10.0, Some(12.0))),
                (SourceKind::Fastcom, Sample::download_only(95.0 - wobble)),
                (SourceKind::Mlab, Sample::new(85.0 + wobble, 10.0, Some(8.0)).with_retransmission(Some(0.01))),
                (SourceKind::Chromedl, Sample::download_only(70.0 + wobble * 2.0)),
            ]
            .into_iter()
            .collect();
            MeasurementRecord::new(START + i as f64 * 3600.0, i % 8 == 0, &results)
        })
        .collect()
}

fn create_points(count: usize) -> Vec<TimePoint> {
    (0..count)
        .map(|i| TimePoint::new(START + i as f64 * 3600.0, 50.0 + (i % 23) as f64))
        .collect()
}

fn bench_windowed_average(c: &mut Criterion) {
    let mut group = c.benchmark_group("windowed_average");

    for size in [24, 168, 720] {
        let points = create_points(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &points, |b, points| {
            b.iter(|| windowed_average(black_box(points), AVERAGE_WINDOW))
        });
    }

    group.finish();
}

fn bench_median(c: &mut Criterion) {
    let mut group = c.benchmark_group("median");

    for size in [96, 672, 2880] {
        let values: Vec<f64> = (0..size).map(|i| ((i * 7919) % 1000) as f64 / 3.0).collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &values, |b, values| {
            b.iter(|| median(black_box(values.iter().copied())))
        });
    }

    group.finish();
}

fn bench_summary(c: &mut Criterion) {
    let history = create_history(168);

    c.bench_function("aggregate_series_week", |b| {
        b.iter(|| aggregate_series(black_box(&history)))
    });

    c.bench_function("history_summary_week", |b| {
        b.iter(|| HistorySummary::from_history(black_box(&history), AVERAGE_WINDOW))
    });
}

fn bench_chart(c: &mut Criterion) {
    let history = create_history(24);
    let summary = match HistorySummary::from_history(&history, AVERAGE_WINDOW) {
        Ok(summary) => summary,
        Err(e) => panic!("summary failed: {}", e),
    };

    c.bench_function("render_chart_day", |b| b.iter(|| chart::render(black_box(&summary))));
}

criterion_group!(benches, bench_windowed_average, bench_median, bench_summary, bench_chart);
criterion_main!(benches);
