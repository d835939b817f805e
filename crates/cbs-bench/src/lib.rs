// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Deterministic synthetic inputs shared by the benchmarks.

/// Three level regimes of equal length with a small deterministic wiggle.
pub fn regime_series(n: usize) -> Vec<f64> {
    let regime = n / 3;
    (0..n)
        .map(|t| {
            let level = if t < regime {
                0.0
            } else if t < 2 * regime {
                3.0
            } else {
                -2.0
            };
            level + 0.3 * (0.37 * t as f64).sin()
        })
        .collect()
}

/// Linearly related factor/asset pair with every 17th factor value missing.
pub fn factor_asset_pair(n: usize) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    let factor = (0..n)
        .map(|t| (t % 17 != 0).then(|| (0.03 * t as f64).sin() + 0.01 * t as f64))
        .collect::<Vec<_>>();
    let asset = factor
        .iter()
        .enumerate()
        .map(|(t, x)| Some(2.0 * x.unwrap_or(0.0) + (0.11 * t as f64).cos()))
        .collect();
    (factor, asset)
}

pub fn crate_name() -> &'static str {
    let _ = (cbs_core::crate_name(), cbs_breaks::crate_name());
    "cbs-bench"
}

#[cfg(test)]
mod tests {
    use super::{factor_asset_pair, regime_series};

    #[test]
    fn generators_have_requested_length() {
        assert_eq!(regime_series(300).len(), 300);
        let (x, y) = factor_asset_pair(100);
        assert_eq!((x.len(), y.len()), (100, 100));
        assert!(x[0].is_none() && x[1].is_some());
    }
}
