// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use cbs_core::{CbsError, CostKind, median};

/// Segment cost strategy, selected once at construction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CostModel {
    /// Gaussian kernel dispersion. `gamma = None` resolves to the inverse
    /// median pairwise squared distance of the signal.
    Rbf { gamma: Option<f64> },
    /// Absolute deviation from the segment median.
    L1,
    /// Squared deviation from the segment mean.
    L2,
}

impl Default for CostModel {
    fn default() -> Self {
        Self::Rbf { gamma: None }
    }
}

impl From<CostKind> for CostModel {
    fn from(kind: CostKind) -> Self {
        match kind {
            CostKind::Rbf => Self::Rbf { gamma: None },
            CostKind::L1 => Self::L1,
            CostKind::L2 => Self::L2,
        }
    }
}

impl CostModel {
    pub fn kind(&self) -> CostKind {
        match self {
            Self::Rbf { .. } => CostKind::Rbf,
            Self::L1 => CostKind::L1,
            Self::L2 => CostKind::L2,
        }
    }

    pub fn validate(&self) -> Result<(), CbsError> {
        if let Self::Rbf { gamma: Some(gamma) } = self
            && (!gamma.is_finite() || *gamma <= 0.0)
        {
            return Err(CbsError::invalid_input(format!(
                "rbf gamma must be finite and > 0; got {gamma}"
            )));
        }
        Ok(())
    }

    /// Builds the per-signal state every segment query reads from.
    pub fn precompute(&self, values: &[f64]) -> Result<CostCache, CbsError> {
        self.validate()?;
        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            return Err(CbsError::invalid_input(format!(
                "change-point input must be finite; position {pos} is {}",
                values[pos]
            )));
        }
        let n = values.len();
        Ok(match self {
            Self::Rbf { gamma } => {
                let gamma = gamma.unwrap_or_else(|| median_heuristic_gamma(values));
                let (prefix, diag_prefix) = kernel_prefix_sums(values, gamma);
                CostCache::Kernel {
                    n,
                    gamma,
                    prefix,
                    diag_prefix,
                }
            }
            Self::L1 => CostCache::Absolute {
                values: values.to_vec(),
            },
            Self::L2 => {
                let mut sum = vec![0.0; n + 1];
                let mut sum_sq = vec![0.0; n + 1];
                for (i, x) in values.iter().enumerate() {
                    sum[i + 1] = sum[i] + x;
                    sum_sq[i + 1] = sum_sq[i] + x * x;
                }
                CostCache::Squared { sum, sum_sq }
            }
        })
    }
}

fn median_heuristic_gamma(values: &[f64]) -> f64 {
    let mut distances = Vec::with_capacity(values.len() * values.len().saturating_sub(1) / 2);
    for left in 0..values.len() {
        for right in left + 1..values.len() {
            let delta = values[left] - values[right];
            distances.push(delta * delta);
        }
    }
    match median(&distances) {
        Some(m) if m > 0.0 && m.is_finite() => 1.0 / m,
        _ => 1.0,
    }
}

fn kernel_prefix_sums(values: &[f64], gamma: f64) -> (Vec<f64>, Vec<f64>) {
    let n = values.len();
    let mut gram = vec![0.0; n * n];
    for left in 0..n {
        for right in left..n {
            let delta = values[left] - values[right];
            let value = (-gamma * delta * delta).exp();
            gram[left * n + right] = value;
            gram[right * n + left] = value;
        }
    }

    let mut prefix = vec![0.0; (n + 1) * (n + 1)];
    for row in 0..n {
        for col in 0..n {
            let idx = (row + 1) * (n + 1) + (col + 1);
            prefix[idx] = gram[row * n + col]
                + prefix[row * (n + 1) + (col + 1)]
                + prefix[(row + 1) * (n + 1) + col]
                - prefix[row * (n + 1) + col];
        }
    }

    let mut diag_prefix = vec![0.0; n + 1];
    for i in 0..n {
        diag_prefix[i + 1] = diag_prefix[i] + gram[i * n + i];
    }
    (prefix, diag_prefix)
}

/// Precomputed state for one signal.
#[derive(Clone, Debug, PartialEq)]
pub enum CostCache {
    Kernel {
        n: usize,
        gamma: f64,
        prefix: Vec<f64>,
        diag_prefix: Vec<f64>,
    },
    Absolute {
        values: Vec<f64>,
    },
    Squared {
        sum: Vec<f64>,
        sum_sq: Vec<f64>,
    },
}

impl CostCache {
    pub fn len(&self) -> usize {
        match self {
            Self::Kernel { n, .. } => *n,
            Self::Absolute { values } => values.len(),
            Self::Squared { sum, .. } => sum.len() - 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolved kernel bandwidth, for the kernel cost only.
    pub fn gamma(&self) -> Option<f64> {
        match self {
            Self::Kernel { gamma, .. } => Some(*gamma),
            _ => None,
        }
    }

    /// Cost of the half-open segment `[start, end)`.
    pub fn compute_segment_cost(&self, start: usize, end: usize) -> Result<f64, CbsError> {
        if end <= start || end > self.len() {
            return Err(CbsError::invalid_input(format!(
                "invalid segment bounds: start={start}, end={end}, n={}",
                self.len()
            )));
        }
        let len = (end - start) as f64;
        let cost = match self {
            Self::Kernel {
                n,
                prefix,
                diag_prefix,
                ..
            } => {
                let stride = n + 1;
                let block = prefix[end * stride + end]
                    - prefix[start * stride + end]
                    - prefix[end * stride + start]
                    + prefix[start * stride + start];
                diag_prefix[end] - diag_prefix[start] - block / len
            }
            Self::Squared { sum, sum_sq } => {
                let s = sum[end] - sum[start];
                sum_sq[end] - sum_sq[start] - s * s / len
            }
            Self::Absolute { values } => {
                let segment = &values[start..end];
                let m = median(segment).unwrap_or(0.0);
                segment.iter().map(|x| (x - m).abs()).sum()
            }
        };
        if !cost.is_finite() {
            return Err(CbsError::numerical_issue(format!(
                "non-finite segment cost at [{start}, {end})"
            )));
        }
        Ok(if cost < 0.0 && cost > -1.0e-9 { 0.0 } else { cost })
    }
}

#[cfg(test)]
mod tests {
    use super::CostModel;
    use cbs_core::{CbsError, CostKind};

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn l2_is_sum_of_squared_deviations() {
        let cache = CostModel::L2.precompute(&[1.0, 2.0, 3.0, 10.0]).expect("cache");
        assert!(close(cache.compute_segment_cost(0, 3).expect("cost"), 2.0));
        assert!(close(cache.compute_segment_cost(3, 4).expect("cost"), 0.0));
    }

    #[test]
    fn l1_is_absolute_deviation_from_median() {
        let cache = CostModel::L1.precompute(&[1.0, 2.0, 9.0, 4.0]).expect("cache");
        // median of [1, 2, 9] is 2
        assert!(close(cache.compute_segment_cost(0, 3).expect("cost"), 8.0));
        // median of [1, 2, 9, 4] is 3
        assert!(close(cache.compute_segment_cost(0, 4).expect("cost"), 2.0 + 1.0 + 6.0 + 1.0));
    }

    #[test]
    fn rbf_matches_direct_gram_formula() {
        let values = [0.0, 0.5, 3.0, 3.2, -1.0];
        let gamma = 0.7;
        let cache = CostModel::Rbf { gamma: Some(gamma) }
            .precompute(&values)
            .expect("cache");
        let (start, end) = (1, 4);
        let len = (end - start) as f64;
        let mut block = 0.0;
        for i in start..end {
            for j in start..end {
                let d = values[i] - values[j];
                block += (-gamma * d * d).exp();
            }
        }
        let expected = len - block / len;
        assert!(close(cache.compute_segment_cost(start, end).expect("cost"), expected));
        assert!(close(cache.compute_segment_cost(2, 3).expect("cost"), 0.0));
    }

    #[test]
    fn rbf_gamma_uses_median_heuristic_with_unit_fallback() {
        // pairwise squared distances: 1, 4, 1 -> median 1
        let cache = CostModel::default().precompute(&[0.0, 1.0, 2.0]).expect("cache");
        assert_eq!(cache.gamma(), Some(1.0));
        let flat = CostModel::default().precompute(&[5.0, 5.0, 5.0]).expect("cache");
        assert_eq!(flat.gamma(), Some(1.0));
        let spread = CostModel::default().precompute(&[0.0, 2.0, 4.0]).expect("cache");
        assert_eq!(spread.gamma(), Some(0.25));
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        assert!(matches!(
            CostModel::Rbf { gamma: Some(0.0) }.precompute(&[1.0]),
            Err(CbsError::InvalidInput(_))
        ));
        assert!(matches!(
            CostModel::L2.precompute(&[1.0, f64::NAN]),
            Err(CbsError::InvalidInput(_))
        ));
        let cache = CostModel::L2.precompute(&[1.0, 2.0]).expect("cache");
        assert!(cache.compute_segment_cost(1, 1).is_err());
        assert!(cache.compute_segment_cost(0, 3).is_err());
    }

    #[test]
    fn cost_kind_round_trips_through_the_strategy() {
        for kind in [CostKind::Rbf, CostKind::L1, CostKind::L2] {
            assert_eq!(CostModel::from(kind).kind(), kind);
        }
    }
}
