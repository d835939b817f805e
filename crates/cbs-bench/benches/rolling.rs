// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use cbs_bench::factor_asset_pair;
use cbs_preprocess::{RollingWindow, rolling_zscore};
use cbs_regression::{RegressionConfig, RollingRegression};
use criterion::{Criterion, black_box, criterion_group, criterion_main};

const N: usize = 50_000;

fn bench_rolling_regression(c: &mut Criterion) {
    let (factor, asset) = factor_asset_pair(N);
    let mut group = c.benchmark_group("rolling_regression_n5e4");
    for window in [12_usize, 36, 120] {
        let engine = RollingRegression::new(RegressionConfig::rolling(window))
            .expect("regression config should be valid");
        group.bench_function(format!("trailing_w{window}"), |b| {
            b.iter(|| {
                engine
                    .fit_series(black_box(&factor), black_box(&asset))
                    .expect("rolling fit should succeed")
            })
        });
    }
    let expanding = RollingRegression::new(RegressionConfig {
        expanding: true,
        ..RegressionConfig::rolling(36)
    })
    .expect("regression config should be valid");
    group.bench_function("expanding", |b| {
        b.iter(|| {
            expanding
                .fit_series(black_box(&factor), black_box(&asset))
                .expect("expanding fit should succeed")
        })
    });
    group.finish();
}

fn bench_rolling_zscore(c: &mut Criterion) {
    let (values, _) = factor_asset_pair(N);
    let window = RollingWindow::new(12, None).expect("window should be valid");
    c.bench_function("rolling_zscore_w12_n5e4", |b| {
        b.iter(|| rolling_zscore(black_box(&values), black_box(&window)))
    });
}

criterion_group!(benches, bench_rolling_regression, bench_rolling_zscore);
criterion_main!(benches);
