// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use cbs_core::{CbsError, Column, Panel};
use chrono::NaiveDate;
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

/// Window settings for [`RollingRegression`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegressionConfig {
    pub window: usize,
    /// Pairs required before a value is reported; defaults to `window`.
    pub min_periods: Option<usize>,
    /// Use all history up to `t` instead of the trailing window.
    pub expanding: bool,
    /// Report `1 - (1 - R²)(n - 1)/(n - 2)` instead of raw R².
    pub adjusted_r2: bool,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            window: 36,
            min_periods: None,
            expanding: false,
            adjusted_r2: false,
        }
    }
}

impl RegressionConfig {
    pub fn rolling(window: usize) -> Self {
        Self {
            window,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), CbsError> {
        if self.window < 2 {
            return Err(CbsError::invalid_window(format!(
                "regression window must be >= 2; got {}",
                self.window
            )));
        }
        if let Some(min_periods) = self.min_periods
            && (min_periods == 0 || (!self.expanding && min_periods > self.window))
        {
            return Err(CbsError::invalid_window(format!(
                "min_periods must be in 1..={}; got {min_periods}",
                self.window
            )));
        }
        Ok(())
    }

    /// Never below two, since a variance needs two pairs.
    pub fn effective_min_periods(&self) -> usize {
        self.min_periods.unwrap_or(self.window).max(2)
    }
}

/// Per-timestamp regression of one asset on one factor.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RollingStats {
    pub beta: Vec<Option<f64>>,
    pub r2: Vec<Option<f64>>,
    /// Complete pairs in the window ending at each timestamp.
    pub count: Vec<usize>,
}

/// Running co-moments of the pairs currently inside the window.
#[derive(Clone, Copy, Debug, Default)]
struct Moments {
    n: usize,
    mean_x: f64,
    mean_y: f64,
    m2_x: f64,
    m2_y: f64,
    c_xy: f64,
}

impl Moments {
    fn add(&mut self, x: f64, y: f64) {
        self.n += 1;
        let n = self.n as f64;
        let dx = x - self.mean_x;
        self.mean_x += dx / n;
        let dy = y - self.mean_y;
        self.mean_y += dy / n;
        self.m2_x += dx * (x - self.mean_x);
        self.m2_y += dy * (y - self.mean_y);
        self.c_xy += dx * (y - self.mean_y);
    }

    fn remove(&mut self, x: f64, y: f64) {
        if self.n <= 1 {
            *self = Self::default();
            return;
        }
        let dx = x - self.mean_x;
        let dy = y - self.mean_y;
        self.n -= 1;
        let n = self.n as f64;
        self.mean_x -= dx / n;
        self.mean_y -= dy / n;
        self.m2_x -= dx * (x - self.mean_x);
        self.m2_y -= dy * (y - self.mean_y);
        self.c_xy -= dx * (y - self.mean_y);
    }
}

/// Length of the run of identical values ending at each position.
fn trailing_equal_runs(values: &[f64]) -> Vec<usize> {
    let mut runs: Vec<usize> = Vec::with_capacity(values.len());
    for (k, value) in values.iter().enumerate() {
        let run = match k.checked_sub(1) {
            Some(prev) if values[prev] == *value => runs[prev] + 1,
            _ => 1,
        };
        runs.push(run);
    }
    runs
}

/// Covariance-based rolling beta and R² engine.
#[derive(Clone, Copy, Debug)]
pub struct RollingRegression {
    config: RegressionConfig,
}

/// Betas and R² of every asset against one factor, one column per asset.
#[derive(Clone, Debug, PartialEq)]
pub struct FactorRegression {
    pub betas: Panel,
    pub r_squared: Panel,
}

impl RollingRegression {
    pub fn new(config: RegressionConfig) -> Result<Self, CbsError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RegressionConfig {
        &self.config
    }

    /// Regresses `asset` on `factor` position by position.
    ///
    /// Only positions where both sides are present enter the moments. A
    /// value is reported once the window holds `min_periods` such pairs;
    /// beta is undefined when the factor variance is zero and R² when either
    /// variance is zero.
    pub fn fit_series(
        &self,
        factor: &[Option<f64>],
        asset: &[Option<f64>],
    ) -> Result<RollingStats, CbsError> {
        if factor.is_empty() || asset.is_empty() {
            return Err(CbsError::empty_input("rolling regression input is empty"));
        }
        if factor.len() != asset.len() {
            return Err(CbsError::misaligned(format!(
                "factor has {} values but asset has {}",
                factor.len(),
                asset.len()
            )));
        }

        let pairs: Vec<(usize, f64, f64)> = factor
            .iter()
            .zip(asset)
            .enumerate()
            .filter_map(|(t, (x, y))| Some((t, (*x)?, (*y)?)))
            .collect();
        let x_runs = trailing_equal_runs(&pairs.iter().map(|p| p.1).collect::<Vec<_>>());
        let y_runs = trailing_equal_runs(&pairs.iter().map(|p| p.2).collect::<Vec<_>>());

        let n = factor.len();
        let min_periods = self.config.effective_min_periods();
        let mut out = RollingStats {
            beta: vec![None; n],
            r2: vec![None; n],
            count: vec![0; n],
        };
        let mut moments = Moments::default();
        let mut head = 0usize;
        let mut next = 0usize;
        let mut last_in_window: Option<usize> = None;

        for t in 0..n {
            while next < pairs.len() && pairs[next].0 <= t {
                moments.add(pairs[next].1, pairs[next].2);
                last_in_window = Some(next);
                next += 1;
            }
            if !self.config.expanding {
                while head < next && pairs[head].0 + self.config.window <= t {
                    moments.remove(pairs[head].1, pairs[head].2);
                    head += 1;
                }
            }
            let count = moments.n;
            out.count[t] = count;
            if count < min_periods {
                continue;
            }
            let Some(last) = last_in_window else {
                continue;
            };

            let denom = (count - 1) as f64;
            let var_x = if x_runs[last] >= count {
                0.0
            } else {
                (moments.m2_x / denom).max(0.0)
            };
            let var_y = if y_runs[last] >= count {
                0.0
            } else {
                (moments.m2_y / denom).max(0.0)
            };
            let cov = moments.c_xy / denom;

            if var_x > 0.0 {
                out.beta[t] = Some(cov / var_x);
            }
            if var_x > 0.0 && var_y > 0.0 {
                let r2 = (cov * cov / (var_x * var_y)).min(1.0);
                out.r2[t] = if self.config.adjusted_r2 {
                    (count > 2).then(|| 1.0 - (1.0 - r2) * (count as f64 - 1.0) / (count as f64 - 2.0))
                } else {
                    Some(r2)
                };
            }
        }
        Ok(out)
    }

    /// Every factor column against every asset column, keyed by factor name.
    ///
    /// Mismatched axes are intersected first; rows dropped by the
    /// intersection are logged.
    pub fn fit(
        &self,
        factors: &Panel,
        assets: &Panel,
    ) -> Result<BTreeMap<String, FactorRegression>, CbsError> {
        if factors.is_empty() || assets.is_empty() {
            return Err(CbsError::empty_input(
                "rolling regression needs non-empty factor and asset panels",
            ));
        }
        let (factors, assets) = intersect_axes(factors, assets)?;
        info!(
            window = self.config.window,
            expanding = self.config.expanding,
            factors = factors.n_cols(),
            assets = assets.n_cols(),
            rows = factors.n_rows(),
            "computing rolling betas"
        );

        let fit_factor = |factor: &Column| -> Result<(String, FactorRegression), CbsError> {
            let mut betas = Vec::with_capacity(assets.n_cols());
            let mut r_squared = Vec::with_capacity(assets.n_cols());
            for asset in assets.columns() {
                let stats = self.fit_series(&factor.values, &asset.values)?;
                betas.push(Column {
                    name: asset.name.clone(),
                    values: stats.beta,
                });
                r_squared.push(Column {
                    name: asset.name.clone(),
                    values: stats.r2,
                });
            }
            let index = assets.index().to_vec();
            Ok((
                factor.name.clone(),
                FactorRegression {
                    betas: Panel::new(index.clone(), betas)?,
                    r_squared: Panel::new(index, r_squared)?,
                },
            ))
        };

        #[cfg(feature = "rayon")]
        let results: Vec<Result<(String, FactorRegression), CbsError>> =
            factors.columns().par_iter().map(fit_factor).collect();
        #[cfg(not(feature = "rayon"))]
        let results: Vec<Result<(String, FactorRegression), CbsError>> =
            factors.columns().iter().map(fit_factor).collect();

        results.into_iter().collect()
    }
}

fn intersect_axes(factors: &Panel, assets: &Panel) -> Result<(Panel, Panel), CbsError> {
    if factors.index() == assets.index() {
        return Ok((factors.clone(), assets.clone()));
    }
    let asset_dates: BTreeSet<NaiveDate> = assets.index().iter().copied().collect();
    let common: Vec<NaiveDate> = factors
        .index()
        .iter()
        .copied()
        .filter(|d| asset_dates.contains(d))
        .collect();
    warn!(
        factor_rows = factors.n_rows(),
        asset_rows = assets.n_rows(),
        common_rows = common.len(),
        "indices do not match exactly; aligning on the common axis"
    );
    if common.is_empty() {
        return Err(CbsError::empty_input(
            "factor and asset panels share no timestamps",
        ));
    }
    Ok((factors.restrict_to(&common), assets.restrict_to(&common)))
}

#[cfg(test)]
mod tests {
    use super::{RegressionConfig, RollingRegression};
    use cbs_core::{CbsError, Column, Panel};
    use chrono::NaiveDate;

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().map(|v| Some(*v)).collect()
    }

    fn months(offset: u32, n: u32) -> Vec<NaiveDate> {
        (offset..offset + n)
            .map(|m| NaiveDate::from_ymd_opt(2020 + (m / 12) as i32, m % 12 + 1, 1).expect("valid"))
            .collect()
    }

    fn engine(config: RegressionConfig) -> RollingRegression {
        RollingRegression::new(config).expect("valid config")
    }

    #[test]
    fn perfect_line_has_unit_r2_and_exact_slope() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v).collect();
        let stats = engine(RegressionConfig {
            window: 5,
            expanding: true,
            ..RegressionConfig::default()
        })
        .fit_series(&some(&x), &some(&y))
        .expect("fit");
        let beta = stats.beta[4].expect("defined at full history");
        let r2 = stats.r2[4].expect("defined at full history");
        assert!((beta - 2.0).abs() < 1e-12);
        assert!((r2 - 1.0).abs() < 1e-12);
        assert_eq!(&stats.beta[..4], &[None, None, None, None]);
    }

    #[test]
    fn trailing_window_matches_closed_form() {
        let x = [1.0, 3.0, 2.0, 5.0, 4.0, 6.0, 2.0];
        let y = [2.0, 1.0, 4.0, 3.0, 6.0, 5.0, 1.0];
        let stats = engine(RegressionConfig::rolling(3))
            .fit_series(&some(&x), &some(&y))
            .expect("fit");
        for t in 2..x.len() {
            let xs = &x[t - 2..=t];
            let ys = &y[t - 2..=t];
            let mx = xs.iter().sum::<f64>() / 3.0;
            let my = ys.iter().sum::<f64>() / 3.0;
            let cov: f64 = xs.iter().zip(ys).map(|(a, b)| (a - mx) * (b - my)).sum::<f64>() / 2.0;
            let vx: f64 = xs.iter().map(|a| (a - mx).powi(2)).sum::<f64>() / 2.0;
            let vy: f64 = ys.iter().map(|b| (b - my).powi(2)).sum::<f64>() / 2.0;
            assert!((stats.beta[t].expect("beta") - cov / vx).abs() < 1e-9, "beta at {t}");
            assert!(
                (stats.r2[t].expect("r2") - cov * cov / (vx * vy)).abs() < 1e-9,
                "r2 at {t}"
            );
            assert_eq!(stats.count[t], 3);
        }
        assert_eq!(stats.beta[1], None);
    }

    #[test]
    fn constant_factor_window_leaves_beta_undefined() {
        let x = [1.0, 1.0, 1.0, 2.0, 2.0, 2.0];
        let y = [0.5, 0.7, 0.2, 0.9, 0.1, 0.3];
        let stats = engine(RegressionConfig::rolling(3))
            .fit_series(&some(&x), &some(&y))
            .expect("fit");
        assert_eq!(stats.beta[2], None);
        assert_eq!(stats.r2[2], None);
        assert!(stats.beta[3].is_some());
        assert_eq!(stats.beta[5], None);
    }

    #[test]
    fn gaps_shrink_the_pair_count() {
        let x = [Some(1.0), None, Some(3.0), Some(4.0), Some(2.0)];
        let y = [Some(1.0), Some(2.0), Some(2.0), None, Some(5.0)];
        let stats = engine(RegressionConfig {
            window: 3,
            min_periods: Some(2),
            ..RegressionConfig::default()
        })
        .fit_series(&x, &y)
        .expect("fit");
        assert_eq!(stats.count, vec![1, 1, 2, 1, 2]);
        assert_eq!(stats.beta[0], None);
        // pairs (1,1) and (3,2)
        assert!((stats.beta[2].expect("beta") - 0.5).abs() < 1e-12);
        assert_eq!(stats.beta[3], None);
    }

    #[test]
    fn adjusted_r2_corrects_for_window_size() {
        let x = [1.0, 2.0, 4.0, 3.0];
        let y = [1.5, 2.0, 3.5, 4.0];
        let raw = engine(RegressionConfig::rolling(4))
            .fit_series(&some(&x), &some(&y))
            .expect("fit");
        let adjusted = engine(RegressionConfig {
            window: 4,
            adjusted_r2: true,
            ..RegressionConfig::default()
        })
        .fit_series(&some(&x), &some(&y))
        .expect("fit");
        let r2 = raw.r2[3].expect("r2");
        let expected = 1.0 - (1.0 - r2) * 3.0 / 2.0;
        assert!((adjusted.r2[3].expect("adjusted") - expected).abs() < 1e-12);
    }

    #[test]
    fn invalid_configs_and_inputs_fail() {
        assert!(matches!(
            RollingRegression::new(RegressionConfig::rolling(1)),
            Err(CbsError::InvalidWindow(_))
        ));
        assert!(matches!(
            RollingRegression::new(RegressionConfig {
                window: 3,
                min_periods: Some(4),
                ..RegressionConfig::default()
            }),
            Err(CbsError::InvalidWindow(_))
        ));
        let e = engine(RegressionConfig::rolling(3));
        assert!(matches!(e.fit_series(&[], &[]), Err(CbsError::EmptyInput(_))));
        assert!(matches!(
            e.fit_series(&[Some(1.0)], &[Some(1.0), Some(2.0)]),
            Err(CbsError::MisalignedInput(_))
        ));
    }

    #[test]
    fn panel_fit_intersects_axes_and_maps_every_pair() {
        let factors = Panel::new(
            months(0, 6),
            vec![
                Column {
                    name: "hawkish".to_string(),
                    values: some(&[1.0, 2.0, 0.0, 3.0, 1.0, 2.0]),
                },
                Column {
                    name: "dovish".to_string(),
                    values: some(&[0.0, 1.0, 1.0, 0.0, 2.0, 1.0]),
                },
            ],
        )
        .expect("valid");
        let assets = Panel::new(
            months(1, 6),
            vec![
                Column {
                    name: "Macro Index".to_string(),
                    values: some(&[0.3, -0.2, 0.8, 0.1, 0.4, 0.0]),
                },
                Column {
                    name: "Inflation Index".to_string(),
                    values: some(&[1.0, 0.2, 0.1, -0.4, 0.6, 0.9]),
                },
            ],
        )
        .expect("valid");
        let results = engine(RegressionConfig::rolling(3))
            .fit(&factors, &assets)
            .expect("fit");
        assert_eq!(results.len(), 2);
        let hawkish = &results["hawkish"];
        assert_eq!(hawkish.betas.n_rows(), 5);
        assert_eq!(hawkish.betas.index()[0], months(1, 1)[0]);
        assert_eq!(
            hawkish.r_squared.column_names(),
            vec!["Macro Index", "Inflation Index"]
        );
        assert!(hawkish.betas.column("Macro Index").expect("macro")[2].is_some());

        let disjoint = Panel::new(
            months(20, 3),
            vec![Column {
                name: "Macro Index".to_string(),
                values: some(&[1.0, 2.0, 3.0]),
            }],
        )
        .expect("valid");
        assert!(matches!(
            engine(RegressionConfig::rolling(3)).fit(&factors, &disjoint),
            Err(CbsError::EmptyInput(_))
        ));
    }
}
