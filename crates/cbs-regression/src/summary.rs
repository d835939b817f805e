// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use cbs_core::{CbsError, Panel, autocorrelation, pairwise_complete, pearson};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};
use tracing::debug;

/// Pairwise-complete Pearson correlations between panel columns.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub names: Vec<String>,
    /// Row-major; `None` where a pair has fewer than two complete
    /// observations or zero variance.
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn get(&self, row: &str, col: &str) -> Option<f64> {
        let i = self.names.iter().position(|n| n == row)?;
        let j = self.names.iter().position(|n| n == col)?;
        self.values[i][j]
    }
}

pub fn correlation_matrix(panel: &Panel) -> Result<CorrelationMatrix, CbsError> {
    if panel.is_empty() {
        return Err(CbsError::empty_input("cannot correlate an empty panel"));
    }
    let columns = panel.columns();
    let d = columns.len();
    let mut values = vec![vec![None; d]; d];
    for i in 0..d {
        for j in i..d {
            let (x, y) = pairwise_complete(&columns[i].values, &columns[j].values);
            let r = pearson(&x, &y);
            values[i][j] = r;
            values[j][i] = r;
        }
    }
    Ok(CorrelationMatrix {
        names: columns.iter().map(|c| c.name.clone()).collect(),
        values,
    })
}

/// Lag-`lag` autocorrelation of every column, in column order.
pub fn autocorrelations(panel: &Panel, lag: usize) -> Vec<(String, Option<f64>)> {
    panel
        .columns()
        .iter()
        .map(|c| (c.name.clone(), autocorrelation(&c.values, lag)))
        .collect()
}

/// Percentile bootstrap interval for a correlation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BootstrapCi {
    pub correlation: f64,
    pub lower: f64,
    pub upper: f64,
    /// Standard deviation of the bootstrap correlations.
    pub std_error: f64,
    pub n_samples: usize,
    /// Resamples that produced a defined correlation.
    pub n_valid: usize,
}

/// Linear-interpolated percentile of sorted data, `q` in `[0, 100]`.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Resamples complete `(x, y)` pairs with replacement from a seeded generator.
///
/// Returns `Ok(None)` when fewer than three complete pairs exist or no
/// resample yields a defined correlation.
pub fn bootstrap_correlation_ci(
    x: &[Option<f64>],
    y: &[Option<f64>],
    samples: usize,
    confidence: f64,
    seed: u64,
) -> Result<Option<BootstrapCi>, CbsError> {
    if x.len() != y.len() {
        return Err(CbsError::misaligned(format!(
            "bootstrap inputs differ in length: {} vs {}",
            x.len(),
            y.len()
        )));
    }
    if samples == 0 {
        return Err(CbsError::invalid_input("bootstrap needs at least one resample"));
    }
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(CbsError::invalid_input(format!(
            "confidence must be in (0, 1); got {confidence}"
        )));
    }
    let (xs, ys) = pairwise_complete(x, y);
    let n = xs.len();
    if n < 3 {
        return Ok(None);
    }
    let Some(correlation) = pearson(&xs, &ys) else {
        return Ok(None);
    };

    let mut rng = StdRng::seed_from_u64(seed);
    let mut draws = Vec::with_capacity(samples);
    let mut bx = vec![0.0; n];
    let mut by = vec![0.0; n];
    for _ in 0..samples {
        for k in 0..n {
            let pick = rng.gen_range(0..n);
            bx[k] = xs[pick];
            by[k] = ys[pick];
        }
        if let Some(r) = pearson(&bx, &by) {
            draws.push(r);
        }
    }
    if draws.is_empty() {
        return Ok(None);
    }
    draws.sort_by(f64::total_cmp);
    let alpha = 1.0 - confidence;
    let mean = draws.iter().sum::<f64>() / draws.len() as f64;
    let std_error =
        (draws.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / draws.len() as f64).sqrt();
    debug!(samples, valid = draws.len(), seed, "bootstrapped correlation");

    Ok(Some(BootstrapCi {
        correlation,
        lower: percentile(&draws, 100.0 * alpha / 2.0),
        upper: percentile(&draws, 100.0 * (1.0 - alpha / 2.0)),
        std_error,
        n_samples: n,
        n_valid: draws.len(),
    }))
}

/// `t = r * sqrt(n - 2) / sqrt(1 - r²)` with `n - 2` degrees of freedom and
/// its two-tailed p-value under Student's t.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CorrelationTest {
    pub correlation: f64,
    /// Infinite (with the sign of `r`) for a perfect correlation; JSON
    /// encodes that as `null`.
    pub t_statistic: f64,
    pub degrees_of_freedom: usize,
    /// Zero for a perfect correlation.
    pub p_value: f64,
    pub n_samples: usize,
}

pub fn correlation_t_test(x: &[Option<f64>], y: &[Option<f64>]) -> Option<CorrelationTest> {
    let (xs, ys) = pairwise_complete(x, y);
    t_test(pearson(&xs, &ys)?, xs.len())
}

fn t_test(r: f64, n: usize) -> Option<CorrelationTest> {
    if n < 3 {
        return None;
    }
    let df = n - 2;
    let (t_statistic, p_value) = if r.abs() >= 1.0 {
        (f64::INFINITY.copysign(r), 0.0)
    } else {
        let t = r * (df as f64).sqrt() / (1.0 - r * r).sqrt();
        let dist = StudentsT::new(0.0, 1.0, df as f64).ok()?;
        (t, (2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0))
    };
    Some(CorrelationTest {
        correlation: r,
        t_statistic,
        degrees_of_freedom: df,
        p_value,
        n_samples: n,
    })
}

#[cfg(test)]
mod tests {
    use super::{
        autocorrelations, bootstrap_correlation_ci, correlation_matrix, correlation_t_test,
        percentile, t_test,
    };
    use cbs_core::{CbsError, Column, Panel};
    use chrono::NaiveDate;

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().map(|v| Some(*v)).collect()
    }

    fn panel() -> Panel {
        let index = (1..=5)
            .map(|m| NaiveDate::from_ymd_opt(2022, m, 1).expect("valid"))
            .collect();
        Panel::new(
            index,
            vec![
                Column {
                    name: "x".to_string(),
                    values: some(&[1.0, 2.0, 3.0, 4.0, 5.0]),
                },
                Column {
                    name: "neg".to_string(),
                    values: some(&[10.0, 8.0, 6.0, 4.0, 2.0]),
                },
                Column {
                    name: "flat".to_string(),
                    values: some(&[3.0; 5]),
                },
            ],
        )
        .expect("valid")
    }

    #[test]
    fn matrix_is_symmetric_with_unit_diagonal() {
        let m = correlation_matrix(&panel()).expect("matrix");
        assert!((m.get("x", "x").expect("defined") - 1.0).abs() < 1e-12);
        assert!((m.get("x", "neg").expect("defined") + 1.0).abs() < 1e-12);
        assert_eq!(m.get("x", "neg"), m.get("neg", "x"));
        assert_eq!(m.get("flat", "x"), None);
        assert_eq!(m.get("missing", "x"), None);
    }

    #[test]
    fn autocorrelation_of_a_ramp_is_one() {
        let ac = autocorrelations(&panel(), 1);
        assert_eq!(ac[0].0, "x");
        assert!((ac[0].1.expect("defined") - 1.0).abs() < 1e-12);
        assert_eq!(ac[2].1, None);
    }

    #[test]
    fn percentile_interpolates_linearly() {
        let sorted = [0.0, 1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&sorted, 50.0), 2.0);
        assert_eq!(percentile(&sorted, 12.5), 0.5);
        assert_eq!(percentile(&sorted, 100.0), 4.0);
    }

    #[test]
    fn bootstrap_is_seeded_and_brackets_the_estimate() {
        let x = some(&[0.1, 0.5, 0.2, 0.9, 0.4, 0.8, 0.3, 0.7, 0.6, 1.0]);
        let y = some(&[0.2, 0.4, 0.1, 1.0, 0.5, 0.7, 0.2, 0.9, 0.5, 0.8]);
        let first = bootstrap_correlation_ci(&x, &y, 500, 0.95, 42)
            .expect("valid")
            .expect("defined");
        let second = bootstrap_correlation_ci(&x, &y, 500, 0.95, 42)
            .expect("valid")
            .expect("defined");
        assert_eq!(first, second);
        assert!(first.lower <= first.upper);
        assert!(first.lower > 0.0 && first.upper <= 1.0);
        assert!(first.std_error > 0.0);
        assert_eq!(first.n_samples, 10);
    }

    #[test]
    fn bootstrap_rejects_bad_parameters_and_tiny_samples() {
        let x = some(&[1.0, 2.0]);
        assert_eq!(bootstrap_correlation_ci(&x, &x, 10, 0.95, 1).expect("valid"), None);
        assert!(matches!(
            bootstrap_correlation_ci(&x, &x, 10, 1.0, 1),
            Err(CbsError::InvalidInput(_))
        ));
        assert!(matches!(
            bootstrap_correlation_ci(&x, &x[..1], 10, 0.9, 1),
            Err(CbsError::MisalignedInput(_))
        ));
    }

    #[test]
    fn t_statistic_follows_closed_form() {
        let x = some(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let y = some(&[2.0, 1.0, 4.0, 3.0, 6.0, 5.0]);
        let test = correlation_t_test(&x, &y).expect("defined");
        let r = test.correlation;
        let expected = r * 4f64.sqrt() / (1.0 - r * r).sqrt();
        assert!((test.t_statistic - expected).abs() < 1e-12);
        assert_eq!(test.degrees_of_freedom, 4);

        assert!(test.p_value > 0.0 && test.p_value < 1.0);
        assert!(correlation_t_test(&x[..2], &y[..2]).is_none());
    }

    #[test]
    fn p_value_is_two_tailed_students_t() {
        let test = t_test(0.5, 12).expect("defined");
        assert_eq!(test.degrees_of_freedom, 10);
        assert!((test.t_statistic - 1.825_741_858).abs() < 1e-8);
        assert!((test.p_value - 0.097_855).abs() < 1e-4);

        let negative = t_test(-0.5, 12).expect("defined");
        assert!((negative.p_value - test.p_value).abs() < 1e-12);
        assert!((t_test(0.0, 12).expect("defined").p_value - 1.0).abs() < 1e-12);
    }

    #[test]
    fn perfect_correlation_has_zero_p_value() {
        let x = some(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let neg: Vec<Option<f64>> = x.iter().map(|v| v.map(|v| -2.0 * v)).collect();

        let perfect = correlation_t_test(&x, &x).expect("defined");
        assert!(perfect.t_statistic.is_infinite() && perfect.t_statistic > 0.0);
        assert_eq!(perfect.p_value, 0.0);

        let inverse = correlation_t_test(&x, &neg).expect("defined");
        assert!(inverse.t_statistic.is_infinite() && inverse.t_statistic < 0.0);
        assert_eq!(inverse.p_value, 0.0);

        let json = serde_json::to_value(&perfect).expect("serializes");
        assert_eq!(json["p_value"], 0.0);
        assert!(json["t_statistic"].is_null());
    }
}
