// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::pelt::{Pelt, PeltConfig, Segmentation};
use cbs_core::{CbsError, TimeSeries};
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;

/// Persisted form of one index's breakpoints.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BreakpointSummary {
    pub indices: Vec<usize>,
    /// ISO-8601 dates.
    pub dates: Vec<String>,
    pub n_breaks: usize,
}

impl From<&Segmentation> for BreakpointSummary {
    fn from(segmentation: &Segmentation) -> Self {
        Self {
            indices: segmentation.breakpoints.clone(),
            dates: segmentation
                .dates
                .iter()
                .map(|d| d.format("%Y-%m-%d").to_string())
                .collect(),
            n_breaks: segmentation.n_breaks(),
        }
    }
}

/// Runs the same search on every series, keyed by series name.
///
/// Series are independent; with the `rayon` feature they are searched in
/// parallel. The first failure aborts the whole batch.
pub fn detect_multiple(
    series: &[TimeSeries],
    config: &PeltConfig,
) -> Result<BTreeMap<String, Segmentation>, CbsError> {
    let pelt = Pelt::new(*config)?;

    #[cfg(feature = "rayon")]
    let results: Vec<Result<(String, Segmentation), CbsError>> = series
        .par_iter()
        .map(|s| Ok((s.name().to_string(), pelt.detect_series(s)?)))
        .collect();
    #[cfg(not(feature = "rayon"))]
    let results: Vec<Result<(String, Segmentation), CbsError>> = series
        .iter()
        .map(|s| Ok((s.name().to_string(), pelt.detect_series(s)?)))
        .collect();

    results.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::{BreakpointSummary, detect_multiple};
    use crate::{CostModel, PeltConfig};
    use cbs_core::{CbsError, Frequency, TimeSeries};
    use chrono::NaiveDate;

    fn series(name: &str, values: &[f64]) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2005, 1, 1).expect("valid");
        let end = NaiveDate::from_ymd_opt(2030, 1, 1).expect("valid");
        let index = Frequency::MonthStart
            .range(start, end)
            .into_iter()
            .take(values.len())
            .collect();
        TimeSeries::from_f64(name, index, values).expect("valid")
    }

    fn config() -> PeltConfig {
        PeltConfig {
            cost: CostModel::L2,
            penalty: 5.0,
            ..PeltConfig::default()
        }
    }

    #[test]
    fn every_series_gets_its_own_result() {
        let mut stepped = vec![0.0; 12];
        stepped.extend(vec![4.0; 12]);
        let inputs = vec![series("Macro Index", &stepped), series("Inflation Index", &[1.0; 24])];
        let results = detect_multiple(&inputs, &config()).expect("detect");
        assert_eq!(results.len(), 2);
        assert_eq!(results["Macro Index"].breakpoints, vec![12]);
        assert_eq!(results["Inflation Index"].n_breaks(), 0);

        let summary = BreakpointSummary::from(&results["Macro Index"]);
        assert_eq!(summary.dates, vec!["2005-12-01".to_string()]);
        let json = serde_json::to_value(&summary).expect("serializes");
        assert_eq!(json["n_breaks"], 1);
        assert_eq!(json["indices"][0], 12);
    }

    #[test]
    fn a_failing_series_fails_the_batch() {
        let inputs = vec![series("ok", &[1.0, 2.0, 3.0]), series("short", &[1.0])];
        assert!(matches!(
            detect_multiple(&inputs, &config()),
            Err(CbsError::InvalidWindow(_))
        ));
    }
}
