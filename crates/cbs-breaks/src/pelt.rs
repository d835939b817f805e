// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::cost::{CostCache, CostModel};
use cbs_core::{CbsError, CostKind, TimeIndex, TimeSeries};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Configuration for [`Pelt`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PeltConfig {
    /// Cost added per segment; higher values yield fewer breaks.
    pub penalty: f64,
    pub cost: CostModel,
    pub min_segment_len: usize,
    /// Only multiples of `jump` are considered as breakpoints.
    pub jump: usize,
}

impl Default for PeltConfig {
    fn default() -> Self {
        Self {
            penalty: 4.0,
            cost: CostModel::default(),
            min_segment_len: 2,
            jump: 1,
        }
    }
}

impl PeltConfig {
    fn validate(&self) -> Result<(), CbsError> {
        if !self.penalty.is_finite() || self.penalty <= 0.0 {
            return Err(CbsError::invalid_window(format!(
                "penalty must be finite and > 0.0; got {}",
                self.penalty
            )));
        }
        if self.min_segment_len == 0 {
            return Err(CbsError::invalid_window(
                "PeltConfig.min_segment_len must be >= 1; got 0",
            ));
        }
        if self.jump == 0 {
            return Err(CbsError::invalid_window("PeltConfig.jump must be >= 1; got 0"));
        }
        self.cost.validate()
    }
}

/// Interior breakpoints of one series and the parameters that produced them.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Segmentation {
    /// Strictly increasing; never `0` or `n`.
    pub breakpoints: Vec<usize>,
    /// Date of the last observation before each breakpoint, when known.
    pub dates: Vec<NaiveDate>,
    pub n: usize,
    pub penalty: f64,
    pub cost: CostKind,
    pub min_segment_len: usize,
    pub objective: f64,
}

impl Segmentation {
    pub fn n_breaks(&self) -> usize {
        self.breakpoints.len()
    }

    /// Half-open segment bounds covering `[0, n)`.
    pub fn segments(&self) -> Vec<(usize, usize)> {
        let mut out = Vec::with_capacity(self.breakpoints.len() + 1);
        let mut start = 0;
        for &end in self.breakpoints.iter().chain(std::iter::once(&self.n)) {
            out.push((start, end));
            start = end;
        }
        out
    }
}

/// Pruned exact linear time search minimizing total cost plus `penalty` per break.
#[derive(Clone, Copy, Debug)]
pub struct Pelt {
    config: PeltConfig,
}

impl Pelt {
    pub fn new(config: PeltConfig) -> Result<Self, CbsError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PeltConfig {
        &self.config
    }

    /// Detects breakpoints in a positional series.
    ///
    /// Dates are attached from `index` when present; without them the result
    /// is still valid but `dates` stays empty.
    pub fn detect(&self, values: &[f64], index: TimeIndex<'_>) -> Result<Segmentation, CbsError> {
        let n = values.len();
        if n == 0 {
            return Err(CbsError::empty_input("change-point input series is empty"));
        }
        if let TimeIndex::Dates(dates) = index
            && dates.len() != n
        {
            return Err(CbsError::misaligned(format!(
                "time index has {} dates for {n} values",
                dates.len()
            )));
        }
        if n < self.config.min_segment_len {
            return Err(CbsError::invalid_window(format!(
                "series of length {n} is shorter than min_segment_len={}",
                self.config.min_segment_len
            )));
        }
        if index.dates().is_none() {
            warn!("series carries no temporal index; breakpoint dates cannot be attached");
        }
        info!(
            penalty = self.config.penalty,
            cost = self.config.cost.kind().label(),
            min_segment_len = self.config.min_segment_len,
            n,
            "detecting breakpoints"
        );

        let cache = self.config.cost.precompute(values)?;
        if let Some(gamma) = cache.gamma() {
            debug!(gamma, "resolved rbf bandwidth");
        }
        let (breakpoints, objective) = run_pelt(&cache, &self.config)?;
        let dates = index
            .dates()
            .map(|dates| breakpoints.iter().map(|&bp| dates[bp - 1]).collect())
            .unwrap_or_default();

        Ok(Segmentation {
            breakpoints,
            dates,
            n,
            penalty: self.config.penalty,
            cost: self.config.cost.kind(),
            min_segment_len: self.config.min_segment_len,
            objective,
        })
    }

    /// Detects breakpoints in a dated series with no missing observations.
    pub fn detect_series(&self, series: &TimeSeries) -> Result<Segmentation, CbsError> {
        if series.present_count() != series.len() {
            return Err(CbsError::invalid_input(format!(
                "series '{}' has {} missing values; drop them before change-point detection",
                series.name(),
                series.len() - series.present_count()
            )));
        }
        self.detect(&series.to_f64_lossy(), TimeIndex::Dates(series.index()))
    }
}

fn build_targets(n: usize, min_segment_len: usize, jump: usize) -> Vec<usize> {
    let mut targets: Vec<usize> = (min_segment_len..n)
        .filter(|p| p.is_multiple_of(jump) && n - p >= min_segment_len)
        .collect();
    targets.push(n);
    targets
}

fn reconstruct_breakpoints(n: usize, last_cp: &[usize]) -> Result<Vec<usize>, CbsError> {
    let mut reverse = vec![];
    let mut cursor = n;
    let mut hops = 0usize;

    while cursor > 0 {
        hops += 1;
        if hops > n + 1 {
            return Err(CbsError::numerical_issue(
                "invalid DP backtrack state: cycle detected",
            ));
        }
        let tau = last_cp[cursor];
        if tau == usize::MAX || tau >= cursor {
            return Err(CbsError::numerical_issue(format!(
                "invalid DP backtrack state at t={cursor}: predecessor {tau}"
            )));
        }
        if tau == 0 {
            break;
        }
        reverse.push(tau);
        cursor = tau;
    }

    reverse.reverse();
    Ok(reverse)
}

fn run_pelt(cache: &CostCache, config: &PeltConfig) -> Result<(Vec<usize>, f64), CbsError> {
    let n = cache.len();
    let beta = config.penalty;
    let min_segment_len = config.min_segment_len;
    let targets = build_targets(n, min_segment_len, config.jump);

    let mut f = vec![f64::INFINITY; n + 1];
    let mut last_cp = vec![usize::MAX; n + 1];
    f[0] = -beta;
    last_cp[0] = 0;

    let mut candidate_set = vec![0usize];
    let mut pruned = 0usize;

    for &t in &targets {
        let mut scored = vec![None; candidate_set.len()];
        let mut best_cost = f64::INFINITY;
        let mut best_tau = usize::MAX;

        for (idx, &tau) in candidate_set.iter().enumerate() {
            if t <= tau || t - tau < min_segment_len || !f[tau].is_finite() {
                continue;
            }
            let score_no_penalty = f[tau] + cache.compute_segment_cost(tau, t)?;
            let candidate = score_no_penalty + beta;
            if !candidate.is_finite() {
                return Err(CbsError::numerical_issue(format!(
                    "non-finite objective at t={t}, tau={tau}: F(tau)={}, candidate={candidate}",
                    f[tau]
                )));
            }
            scored[idx] = Some(score_no_penalty);
            if candidate < best_cost || (candidate == best_cost && tau < best_tau) {
                best_cost = candidate;
                best_tau = tau;
            }
        }

        if best_tau == usize::MAX {
            return Err(CbsError::invalid_window(format!(
                "no feasible segmentation at t={t}; check min_segment_len and jump"
            )));
        }
        f[t] = best_cost;
        last_cp[t] = best_tau;

        let mut next_candidate_set = Vec::with_capacity(candidate_set.len() + 1);
        for (idx, &tau) in candidate_set.iter().enumerate() {
            match scored[idx] {
                Some(score_no_penalty) if score_no_penalty > best_cost => pruned += 1,
                _ => next_candidate_set.push(tau),
            }
        }
        if t < n {
            next_candidate_set.push(t);
        }
        candidate_set = next_candidate_set;
    }

    if !f[n].is_finite() {
        return Err(CbsError::invalid_window(
            "no feasible segmentation reached the end of the series",
        ));
    }
    debug!(pruned, targets = targets.len(), "PELT search finished");
    Ok((reconstruct_breakpoints(n, &last_cp)?, f[n]))
}
