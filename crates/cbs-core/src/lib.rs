// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod panel;
pub mod stats;
pub mod time_series;

pub use config::{AnalysisConfig, CostKind, DEFAULT_FRED_SERIES, SeriesSpec};
pub use diagnostics::{Stage, StageOutcome, StageReport};
pub use error::CbsError;
pub use panel::{Column, Panel};
pub use stats::{
    autocorrelation, mean, median, pairwise_complete, pearson, sample_covariance, sample_std,
    sample_variance,
};
pub use time_series::{Frequency, TimeIndex, TimeSeries, validate_index};

/// Core shared types for the cbs workspace.
pub fn crate_name() -> &'static str {
    "cbs-core"
}
