// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Closed-form sample statistics shared by every stage.
//!
//! All estimators are two-pass and Bessel-corrected where applicable. They
//! return `None` instead of NaN whenever the statistic is undefined.

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample variance with `n - 1` denominator; undefined below two values.
pub fn sample_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mu = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - mu) * (v - mu)).sum();
    Some(ss / (values.len() - 1) as f64)
}

pub fn sample_std(values: &[f64]) -> Option<f64> {
    sample_variance(values).map(f64::sqrt)
}

/// Sample covariance with `n - 1` denominator.
pub fn sample_covariance(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let mx = mean(x)?;
    let my = mean(y)?;
    let cross: f64 = x
        .iter()
        .zip(y.iter())
        .map(|(a, b)| (a - mx) * (b - my))
        .sum();
    Some(cross / (x.len() - 1) as f64)
}

/// Pearson correlation; undefined when either side has zero variance.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let cov = sample_covariance(x, y)?;
    let vx = sample_variance(x)?;
    let vy = sample_variance(y)?;
    if vx <= 0.0 || vy <= 0.0 {
        return None;
    }
    Some((cov / (vx * vy).sqrt()).clamp(-1.0, 1.0))
}

/// Pairs where both sides are present, in order.
pub fn pairwise_complete(a: &[Option<f64>], b: &[Option<f64>]) -> (Vec<f64>, Vec<f64>) {
    a.iter()
        .zip(b.iter())
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .unzip()
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some(0.5 * (sorted[mid - 1] + sorted[mid]))
    } else {
        Some(sorted[mid])
    }
}

/// Correlation between the series and itself shifted by `lag` positions.
pub fn autocorrelation(values: &[Option<f64>], lag: usize) -> Option<f64> {
    if lag == 0 {
        let present: Vec<f64> = values.iter().flatten().copied().collect();
        return pearson(&present, &present);
    }
    if values.len() <= lag {
        return None;
    }
    let (current, lagged) = pairwise_complete(&values[lag..], &values[..values.len() - lag]);
    pearson(&current, &lagged)
}

#[cfg(test)]
mod tests {
    use super::{
        autocorrelation, mean, median, pairwise_complete, pearson, sample_covariance, sample_std,
        sample_variance,
    };

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn bessel_corrected_moments() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_close(mean(&values).expect("mean"), 5.0, 1e-12);
        assert_close(sample_variance(&values).expect("var"), 32.0 / 7.0, 1e-12);
        assert_close(sample_std(&values).expect("std"), (32.0f64 / 7.0).sqrt(), 1e-12);
        assert!(sample_variance(&[1.0]).is_none());
        assert!(mean(&[]).is_none());
    }

    #[test]
    fn covariance_and_correlation_of_linear_pair() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v).collect();
        assert_close(sample_covariance(&x, &y).expect("cov"), 5.0, 1e-12);
        assert_close(pearson(&x, &y).expect("corr"), 1.0, 1e-12);
        let neg: Vec<f64> = x.iter().map(|v| -v).collect();
        assert_close(pearson(&x, &neg).expect("corr"), -1.0, 1e-12);
        assert!(pearson(&x, &[1.0; 5]).is_none());
    }

    #[test]
    fn pairwise_complete_drops_either_missing_side() {
        let (a, b) = pairwise_complete(
            &[Some(1.0), None, Some(3.0), Some(4.0)],
            &[Some(1.0), Some(2.0), None, Some(8.0)],
        );
        assert_eq!(a, vec![1.0, 4.0]);
        assert_eq!(b, vec![1.0, 8.0]);
    }

    #[test]
    fn median_handles_even_and_odd_lengths() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn autocorrelation_of_alternating_series_is_negative_one() {
        let values: Vec<Option<f64>> = (0..20)
            .map(|i| Some(if i % 2 == 0 { 1.0 } else { -1.0 }))
            .collect();
        assert_close(autocorrelation(&values, 1).expect("lag 1"), -1.0, 1e-12);
        assert_close(autocorrelation(&values, 2).expect("lag 2"), 1.0, 1e-12);
        assert!(autocorrelation(&values[..1], 1).is_none());
    }
}
