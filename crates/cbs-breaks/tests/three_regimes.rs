// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use cbs_breaks::{CostModel, Pelt, PeltConfig, regime_periods};
use cbs_core::TimeIndex;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

fn three_regime_signal(seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 1.0).expect("valid normal");
    [0.0, 3.0, -2.0]
        .into_iter()
        .flat_map(|level| (0..100).map(move |_| level).collect::<Vec<f64>>())
        .map(|level| level + noise.sample(&mut rng))
        .collect()
}

fn assert_near_truth(breakpoints: &[usize]) {
    assert_eq!(breakpoints.len(), 2, "expected two breaks, got {breakpoints:?}");
    assert!(
        breakpoints[0].abs_diff(100) <= 3,
        "first break {} not within 3 of 100",
        breakpoints[0]
    );
    assert!(
        breakpoints[1].abs_diff(200) <= 3,
        "second break {} not within 3 of 200",
        breakpoints[1]
    );
}

#[test]
fn kernel_cost_recovers_three_gaussian_regimes() {
    let values = three_regime_signal(42);
    let result = Pelt::new(PeltConfig {
        penalty: 10.0,
        ..PeltConfig::default()
    })
    .expect("valid config")
    .detect(&values, TimeIndex::None)
    .expect("detect");
    assert_near_truth(&result.breakpoints);
}

#[test]
fn squared_cost_recovers_three_gaussian_regimes() {
    let values = three_regime_signal(42);
    let result = Pelt::new(PeltConfig {
        penalty: 30.0,
        cost: CostModel::L2,
        ..PeltConfig::default()
    })
    .expect("valid config")
    .detect(&values, TimeIndex::None)
    .expect("detect");
    assert_near_truth(&result.breakpoints);

    let regimes = regime_periods(&values, TimeIndex::None, &result.breakpoints).expect("regimes");
    assert_eq!(regimes.len(), 3);
    assert!((regimes[0].mean - 0.0).abs() < 0.5);
    assert!((regimes[1].mean - 3.0).abs() < 0.5);
    assert!((regimes[2].mean + 2.0).abs() < 0.5);
}
