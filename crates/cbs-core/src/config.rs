// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::CbsError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const DEFAULT_STANDARDIZE_WINDOW: usize = 12;
const DEFAULT_REGRESSION_WINDOW: usize = 36;
const DEFAULT_BREAKPOINT_PENALTY: f64 = 4.0;
const DEFAULT_MIN_SEGMENT_LEN: usize = 2;
const DEFAULT_VARIANCE_THRESHOLD: f64 = 0.80;
const DEFAULT_SENTIMENT_SHIFT: usize = 1;
const DEFAULT_RANDOM_SEED: u64 = 42;
const DEFAULT_BOOTSTRAP_SAMPLES: usize = 1000;
const DEFAULT_MIN_RETAINED_COMPONENTS: usize = 2;

/// FRED series ids with their display names, in report order.
pub const DEFAULT_FRED_SERIES: [(&str, &str); 6] = [
    ("FEDFUNDS", "FED Funds Rate"),
    ("CPIAUCNS", "CPI"),
    ("PPIACO", "PPI"),
    ("GDP", "GDP"),
    ("UNRATE", "Unemployment"),
    ("PAYEMS", "Nonfarm Payrolls"),
];

/// Segment cost model identifier for change-point detection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostKind {
    /// Gaussian-kernel dispersion.
    #[default]
    Rbf,
    /// Absolute deviation from the segment median.
    L1,
    /// Squared deviation from the segment mean.
    L2,
}

impl CostKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Rbf => "rbf",
            Self::L1 => "l1",
            Self::L2 => "l2",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, CbsError> {
        match raw.to_ascii_lowercase().as_str() {
            "rbf" => Ok(Self::Rbf),
            "l1" => Ok(Self::L1),
            "l2" => Ok(Self::L2),
            _ => Err(CbsError::invalid_input(format!(
                "invalid cost model '{raw}'; expected one of: rbf, l1, l2"
            ))),
        }
    }
}

/// One macro indicator to acquire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesSpec {
    pub id: String,
    pub name: String,
}

/// Explicit configuration for a full pipeline run.
///
/// Constructed once by the caller and passed into every component.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub standardize_window: usize,
    pub standardize_min_periods: Option<usize>,
    pub regression_window: usize,
    pub breakpoint_penalty: f64,
    pub breakpoint_cost: CostKind,
    pub min_segment_len: usize,
    pub breakpoint_jump: usize,
    pub variance_threshold: f64,
    pub min_retained_components: usize,
    pub sentiment_shift: usize,
    pub country_code: Option<String>,
    pub index_names: Vec<String>,
    pub random_seed: u64,
    pub bootstrap_samples: usize,
    pub macro_series: Vec<SeriesSpec>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(1996, 1, 1).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap_or_default(),
            standardize_window: DEFAULT_STANDARDIZE_WINDOW,
            standardize_min_periods: None,
            regression_window: DEFAULT_REGRESSION_WINDOW,
            breakpoint_penalty: DEFAULT_BREAKPOINT_PENALTY,
            breakpoint_cost: CostKind::Rbf,
            min_segment_len: DEFAULT_MIN_SEGMENT_LEN,
            breakpoint_jump: 1,
            variance_threshold: DEFAULT_VARIANCE_THRESHOLD,
            min_retained_components: DEFAULT_MIN_RETAINED_COMPONENTS,
            sentiment_shift: DEFAULT_SENTIMENT_SHIFT,
            country_code: Some("US".to_string()),
            index_names: vec!["Macro Index".to_string(), "Inflation Index".to_string()],
            random_seed: DEFAULT_RANDOM_SEED,
            bootstrap_samples: DEFAULT_BOOTSTRAP_SAMPLES,
            macro_series: DEFAULT_FRED_SERIES
                .iter()
                .map(|(id, name)| SeriesSpec {
                    id: (*id).to_string(),
                    name: (*name).to_string(),
                })
                .collect(),
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), CbsError> {
        if self.start > self.end {
            return Err(CbsError::invalid_input(format!(
                "start date {} must not be after end date {}",
                self.start, self.end
            )));
        }
        if self.standardize_window == 0 {
            return Err(CbsError::invalid_window(
                "standardize_window must be >= 1; got 0",
            ));
        }
        if let Some(min_periods) = self.standardize_min_periods
            && (min_periods == 0 || min_periods > self.standardize_window)
        {
            return Err(CbsError::invalid_window(format!(
                "standardize_min_periods must be in 1..={}; got {min_periods}",
                self.standardize_window
            )));
        }
        if self.regression_window < 2 {
            return Err(CbsError::invalid_window(format!(
                "regression_window must be >= 2; got {}",
                self.regression_window
            )));
        }
        if !self.breakpoint_penalty.is_finite() || self.breakpoint_penalty <= 0.0 {
            return Err(CbsError::invalid_window(format!(
                "breakpoint_penalty must be finite and > 0; got {}",
                self.breakpoint_penalty
            )));
        }
        if self.min_segment_len == 0 || self.breakpoint_jump == 0 {
            return Err(CbsError::invalid_window(format!(
                "min_segment_len and breakpoint_jump must be >= 1; got {} and {}",
                self.min_segment_len, self.breakpoint_jump
            )));
        }
        if !(self.variance_threshold > 0.0 && self.variance_threshold <= 1.0) {
            return Err(CbsError::invalid_input(format!(
                "variance_threshold must be in (0, 1]; got {}",
                self.variance_threshold
            )));
        }
        if self.macro_series.is_empty() {
            return Err(CbsError::invalid_input(
                "macro_series must name at least one indicator",
            ));
        }
        Ok(())
    }

    /// Minimum present values required by the standardizer.
    pub fn effective_standardize_min_periods(&self) -> usize {
        self.standardize_min_periods
            .unwrap_or(self.standardize_window)
    }

    /// Display name for the zero-based component `k`.
    pub fn index_name(&self, k: usize) -> String {
        self.index_names
            .get(k)
            .cloned()
            .unwrap_or_else(|| format!("PC{}", k + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::{AnalysisConfig, CostKind};
    use crate::CbsError;

    #[test]
    fn defaults_match_the_reference_run() {
        let cfg = AnalysisConfig::default();
        assert_eq!(cfg.standardize_window, 12);
        assert_eq!(cfg.regression_window, 36);
        assert_eq!(cfg.breakpoint_penalty, 4.0);
        assert_eq!(cfg.breakpoint_cost, CostKind::Rbf);
        assert_eq!(cfg.variance_threshold, 0.80);
        assert_eq!(cfg.macro_series.len(), 6);
        assert_eq!(cfg.index_name(0), "Macro Index");
        assert_eq!(cfg.index_name(2), "PC3");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_window_is_an_invalid_window() {
        let cfg = AnalysisConfig {
            standardize_window: 0,
            ..AnalysisConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(CbsError::InvalidWindow(_))));

        let cfg = AnalysisConfig {
            breakpoint_penalty: -1.0,
            ..AnalysisConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(CbsError::InvalidWindow(_))));
    }

    #[test]
    fn threshold_outside_unit_interval_is_rejected() {
        let cfg = AnalysisConfig {
            variance_threshold: 1.5,
            ..AnalysisConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(CbsError::InvalidInput(_))));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: AnalysisConfig =
            serde_json::from_str(r#"{"regression_window": 24, "breakpoint_cost": "l2"}"#)
                .expect("partial config should deserialize");
        assert_eq!(cfg.regression_window, 24);
        assert_eq!(cfg.breakpoint_cost, CostKind::L2);
        assert_eq!(cfg.standardize_window, 12);
    }

    #[test]
    fn cost_kind_parses_case_insensitively() {
        assert_eq!(CostKind::parse("RBF").expect("rbf"), CostKind::Rbf);
        assert!(CostKind::parse("linear").is_err());
    }
}
