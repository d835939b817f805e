// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::eigen::symmetric_eigen;
use cbs_core::{CbsError, Column, Panel, TimeSeries};
use serde::Serialize;
use tracing::{debug, info, warn};

/// `PC1`, `PC2`, ... for a zero-based component index.
pub fn component_name(k: usize) -> String {
    format!("PC{}", k + 1)
}

/// Principal component reducer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pca {
    /// Components to keep; `None` keeps `min(rows, columns)`.
    pub n_components: Option<usize>,
}

impl Pca {
    pub fn new(n_components: Option<usize>) -> Result<Self, CbsError> {
        if n_components == Some(0) {
            return Err(CbsError::invalid_input("n_components must be >= 1"));
        }
        Ok(Self { n_components })
    }

    /// Fits on the complete rows of `panel` and projects them.
    ///
    /// Columns with no observations are logged and left out. Rows with any
    /// remaining missing value are dropped before fitting.
    pub fn fit(&self, panel: &Panel) -> Result<PcaResult, CbsError> {
        if panel.is_empty() {
            return Err(CbsError::empty_input("PCA input panel is empty"));
        }

        let (usable, all_missing): (Vec<&Column>, Vec<&Column>) = panel
            .columns()
            .iter()
            .partition(|c| c.values.iter().any(Option::is_some));
        if !all_missing.is_empty() {
            let names: Vec<&str> = all_missing.iter().map(|c| c.name.as_str()).collect();
            warn!(columns = ?names, "some columns contain only missing values; excluding them from PCA");
        }
        if usable.is_empty() {
            return Err(CbsError::empty_input("every PCA input column is entirely missing"));
        }
        let names: Vec<&str> = usable.iter().map(|c| c.name.as_str()).collect();
        let complete = panel.select(&names)?.drop_incomplete_rows();
        if complete.n_rows() < panel.n_rows() {
            debug!(
                dropped = panel.n_rows() - complete.n_rows(),
                kept = complete.n_rows(),
                "dropping incomplete rows before PCA"
            );
        }
        let n = complete.n_rows();
        let d = complete.n_cols();
        if n == 0 {
            return Err(CbsError::empty_input("no complete rows remain for PCA"));
        }
        if n < 2 {
            return Err(CbsError::invalid_input(
                "PCA needs at least two complete rows to estimate a covariance",
            ));
        }

        let max_components = n.min(d);
        let k = match self.n_components {
            Some(requested) if requested > max_components => {
                return Err(CbsError::invalid_input(format!(
                    "n_components={requested} exceeds min(rows={n}, columns={d})"
                )));
            }
            Some(requested) => requested,
            None => max_components,
        };
        info!(components = k, samples = n, features = d, "fitting PCA");

        let data: Vec<Vec<f64>> = complete
            .columns()
            .iter()
            .map(|c| c.values.iter().map(|v| v.unwrap_or(0.0)).collect())
            .collect();
        let means: Vec<f64> = data
            .iter()
            .map(|col| col.iter().sum::<f64>() / n as f64)
            .collect();
        let centered: Vec<Vec<f64>> = data
            .iter()
            .zip(&means)
            .map(|(col, m)| col.iter().map(|x| x - m).collect())
            .collect();

        let mut covariance = vec![vec![0.0; d]; d];
        for i in 0..d {
            for j in i..d {
                let dot: f64 = centered[i].iter().zip(&centered[j]).map(|(a, b)| a * b).sum();
                let value = dot / (n as f64 - 1.0);
                covariance[i][j] = value;
                covariance[j][i] = value;
            }
        }

        let eig = symmetric_eigen(&covariance)?;
        let eigenvalues: Vec<f64> = eig.values.iter().map(|v| v.max(0.0)).collect();
        let total: f64 = eigenvalues.iter().sum();
        if total <= 0.0 || !total.is_finite() {
            return Err(CbsError::numerical_issue("PCA input has zero total variance"));
        }

        let loadings: Vec<Vec<f64>> = eig.vectors.into_iter().take(k).collect();
        let explained_variance: Vec<f64> = eigenvalues.iter().take(k).copied().collect();
        let explained_variance_ratio: Vec<f64> =
            explained_variance.iter().map(|v| v / total).collect();

        let columns = loadings
            .iter()
            .enumerate()
            .map(|(component, weights)| Column {
                name: component_name(component),
                values: (0..n)
                    .map(|row| {
                        Some(
                            weights
                                .iter()
                                .zip(&centered)
                                .map(|(w, col)| w * col[row])
                                .sum(),
                        )
                    })
                    .collect(),
            })
            .collect();
        let scores = Panel::new(complete.index().to_vec(), columns)?;

        Ok(PcaResult {
            feature_names: names.iter().map(|s| (*s).to_string()).collect(),
            means,
            loadings,
            explained_variance,
            explained_variance_ratio,
            scores,
        })
    }
}

/// One component row of the loadings table, in percent.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LoadingsRow {
    pub component: String,
    pub weights: Vec<f64>,
    pub explained_variance: f64,
}

/// Per-component explained variance, in percent.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VarianceRow {
    pub component: String,
    pub variance_explained: f64,
    pub cumulative_variance: f64,
}

/// Fitted components and their projections.
#[derive(Clone, Debug, PartialEq)]
pub struct PcaResult {
    pub feature_names: Vec<String>,
    pub means: Vec<f64>,
    /// `loadings[k][j]` is the weight of feature `j` in component `k`.
    pub loadings: Vec<Vec<f64>>,
    /// Eigenvalues of the sample covariance.
    pub explained_variance: Vec<f64>,
    pub explained_variance_ratio: Vec<f64>,
    /// Scores `PC1..PCk` on the complete rows of the input.
    pub scores: Panel,
}

impl PcaResult {
    pub fn n_components(&self) -> usize {
        self.loadings.len()
    }

    pub fn cumulative_variance_ratio(&self) -> Vec<f64> {
        self.explained_variance_ratio
            .iter()
            .scan(0.0, |acc, r| {
                *acc += r;
                Some(*acc)
            })
            .collect()
    }

    /// Smallest 1-based count whose cumulative ratio meets `threshold`.
    ///
    /// When the fitted components never reach it, every component is needed.
    pub fn n_components_for_threshold(&self, threshold: f64) -> Result<usize, CbsError> {
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(CbsError::invalid_input(format!(
                "variance threshold must be in (0, 1]; got {threshold}"
            )));
        }
        Ok(self
            .cumulative_variance_ratio()
            .iter()
            .position(|c| *c >= threshold)
            .map_or(self.n_components(), |k| k + 1))
    }

    pub fn component(&self, k: usize) -> Result<TimeSeries, CbsError> {
        self.scores.series(&component_name(k))
    }

    /// First `names.len()` components renamed to `names`.
    pub fn named_components(&self, names: &[String]) -> Result<Panel, CbsError> {
        if names.len() > self.n_components() {
            return Err(CbsError::invalid_input(format!(
                "{} index names requested but only {} components were fitted",
                names.len(),
                self.n_components()
            )));
        }
        let columns = names
            .iter()
            .enumerate()
            .map(|(k, name)| {
                Ok(Column {
                    name: name.clone(),
                    values: self.scores.column(&component_name(k))?.to_vec(),
                })
            })
            .collect::<Result<Vec<_>, CbsError>>()?;
        Panel::new(self.scores.index().to_vec(), columns)
    }

    pub fn loadings_table(&self) -> Vec<LoadingsRow> {
        self.loadings
            .iter()
            .zip(&self.explained_variance_ratio)
            .enumerate()
            .map(|(k, (weights, ratio))| LoadingsRow {
                component: component_name(k),
                weights: weights.iter().map(|w| w * 100.0).collect(),
                explained_variance: ratio * 100.0,
            })
            .collect()
    }

    pub fn variance_table(&self) -> Vec<VarianceRow> {
        self.explained_variance_ratio
            .iter()
            .zip(self.cumulative_variance_ratio())
            .enumerate()
            .map(|(k, (ratio, cumulative))| VarianceRow {
                component: component_name(k),
                variance_explained: ratio * 100.0,
                cumulative_variance: cumulative * 100.0,
            })
            .collect()
    }
}
