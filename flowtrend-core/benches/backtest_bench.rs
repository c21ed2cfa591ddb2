//! Criterion benchmarks for the analysis hot paths.
//!
//! Benchmarks:
//! 1. Merge (pivot + align) of price and flow records
//! 2. Full backtest over a merged table

use chrono::{Duration, FixedOffset, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use flowtrend_core::backtest::{run_backtest, BacktestConfig};
use flowtrend_core::domain::{FlowRecord, PriceRecord};
use flowtrend_core::merge::merge_records;

const CATEGORIES: [&str; 3] = ["Foreign_Investor", "Investment_Trust", "Dealer_self"];

// ── Helpers ──────────────────────────────────────────────────────────

fn make_prices(n: usize) -> Vec<PriceRecord> {
    let base_date = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
    let offset = FixedOffset::east_opt(8 * 3600).unwrap();
    (0..n)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.1).sin() * 10.0;
            PriceRecord::at_midnight(
                base_date + Duration::days(i as i64),
                offset,
                close - 0.3,
                close + 1.5,
                close - 1.5,
                close,
                1_000_000 + (i as u64 % 500_000),
            )
        })
        .collect()
}

fn make_flows(n: usize) -> Vec<FlowRecord> {
    let base_date = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
    (0..n)
        .flat_map(|i| {
            CATEGORIES.iter().map(move |cat| {
                let buy = ((i * 7919) % 10_000) as i64;
                let sell = ((i * 104_729) % 10_000) as i64;
                FlowRecord::new(base_date + Duration::days(i as i64), *cat, buy, sell)
            })
        })
        .collect()
}

// ── 1. Merge ─────────────────────────────────────────────────────────

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");

    for &rows in &[180, 730, 1095] {
        let prices = make_prices(rows);
        let flows = make_flows(rows);
        group.bench_with_input(BenchmarkId::from_parameter(rows), &rows, |b, _| {
            b.iter(|| merge_records("BENCH", black_box(&prices), black_box(&flows), CATEGORIES[0]))
        });
    }

    group.finish();
}

// ── 2. Backtest ──────────────────────────────────────────────────────

fn bench_backtest(c: &mut Criterion) {
    let mut group = c.benchmark_group("backtest");
    let config = BacktestConfig::default();

    for &rows in &[180, 730, 1095] {
        let table = merge_records("BENCH", &make_prices(rows), &make_flows(rows), CATEGORIES[0])
            .into_table()
            .expect("bench data is non-empty");
        group.bench_with_input(BenchmarkId::from_parameter(rows), &rows, |b, _| {
            b.iter(|| run_backtest(black_box(&table), &config))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_merge, bench_backtest);
criterion_main!(benches);
