//! Throughput benchmarks for the signal generator and simulator.

use chrono::{Days, NaiveDate};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use kisbook::{DailyBar, PriceSeries, backtest, generate_signals, simulate};

/// Deterministic random-walk series of `n` bars.
fn synthetic_series(n: usize) -> PriceSeries {
    let start = NaiveDate::from_ymd_opt(2000, 1, 3).unwrap();
    let mut rng_state: u32 = 42;
    let mut next = || {
        // xorshift32
        rng_state ^= rng_state << 13;
        rng_state ^= rng_state >> 17;
        rng_state ^= rng_state << 5;
        (rng_state % 401) as f64 / 10_000.0 - 0.02
    };

    let mut close = 100.0_f64;
    let bars = (0..n)
        .map(|i| {
            let open = close * (1.0 + next() / 2.0);
            close = (open * (1.0 + next())).max(1.0);
            let high = open.max(close) * (1.0 + next().abs());
            let low = open.min(close) * (1.0 - next().abs());
            DailyBar::new(start + Days::new(i as u64), open, high, low, close)
        })
        .collect();
    PriceSeries::new(bars).unwrap()
}

fn bench_signals(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate_signals");
    for n in [250, 2_500, 25_000] {
        let series = synthetic_series(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &series, |b, s| {
            b.iter(|| generate_signals(black_box(s)))
        });
    }
    group.finish();
}

fn bench_simulate(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulate");
    for n in [250, 2_500, 25_000] {
        let rows = generate_signals(&synthetic_series(n));
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &rows, |b, rows| {
            b.iter(|| simulate(black_box(rows.clone())).unwrap())
        });
    }
    group.finish();
}

fn bench_end_to_end(c: &mut Criterion) {
    let series = synthetic_series(2_500);
    c.bench_function("backtest_2500", |b| {
        b.iter(|| backtest(black_box(&series)).unwrap().final_hpr())
    });
}

criterion_group!(benches, bench_signals, bench_simulate, bench_end_to_end);
criterion_main!(benches);
