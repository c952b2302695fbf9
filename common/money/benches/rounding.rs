use criterion::{black_box, criterion_group, criterion_main, Criterion};
use bigdecimal::BigDecimal;
use std::str::FromStr;

use common_money::{normalize_scale, round2, Money};

fn bench_half_up(c: &mut Criterion) {
    let samples: Vec<BigDecimal> = [
        "1.005", "2.675", "0.005", "-1.005", "-2.505", "12345", "19.90", "1000000.555",
        "-999999.995", "0.3349", "42.4242"
    ].into_iter().map(|s| BigDecimal::from_str(s).unwrap()).collect();
    c.bench_function("round_half_up_normalize", |b| {
        b.iter(|| {
            for v in &samples { black_box(normalize_scale(v)); }
        });
    });
}

fn bench_float_paths(c: &mut Criterion) {
    let samples: Vec<f64> = (0..500).map(|i| i as f64 + (i % 1000) as f64 / 1000.0).collect();
    c.bench_function("round2_f64", |b| {
        b.iter(|| {
            for v in &samples { black_box(round2(*v)); }
        });
    });
    c.bench_function("money_from_major", |b| {
        b.iter(|| {
            for v in &samples { black_box(Money::from_major(*v).ok()); }
        });
    });
}

criterion_group!(rounding, bench_half_up, bench_float_paths);
criterion_main!(rounding);
