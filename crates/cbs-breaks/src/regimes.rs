// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use cbs_core::{CbsError, TimeIndex, mean, sample_std};
use chrono::NaiveDate;
use serde::Serialize;

/// Summary of one segment between consecutive breakpoints.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RegimePeriod {
    /// 1-based.
    pub regime: usize,
    pub start: usize,
    /// Exclusive.
    pub end: usize,
    /// First observation of the segment.
    pub start_date: Option<NaiveDate>,
    /// Last observation of the segment.
    pub end_date: Option<NaiveDate>,
    pub duration: usize,
    pub mean: f64,
    /// Undefined for single-observation segments.
    pub std: Option<f64>,
}

/// Partitions `values` at `breakpoints` into non-overlapping `[start, end)` regimes.
pub fn regime_periods(
    values: &[f64],
    index: TimeIndex<'_>,
    breakpoints: &[usize],
) -> Result<Vec<RegimePeriod>, CbsError> {
    let n = values.len();
    if n == 0 {
        return Err(CbsError::empty_input("cannot summarize regimes of an empty series"));
    }
    let dates = index.dates();
    if let Some(dates) = dates
        && dates.len() != n
    {
        return Err(CbsError::misaligned(format!(
            "time index has {} dates for {n} values",
            dates.len()
        )));
    }
    let mut previous = 0usize;
    for &bp in breakpoints {
        if bp <= previous || bp >= n {
            return Err(CbsError::invalid_input(format!(
                "breakpoints must be strictly increasing interior positions in (0, {n}); got {breakpoints:?}"
            )));
        }
        previous = bp;
    }

    let bounds = std::iter::once(0)
        .chain(breakpoints.iter().copied())
        .zip(breakpoints.iter().copied().chain(std::iter::once(n)));
    Ok(bounds
        .enumerate()
        .map(|(k, (start, end))| {
            let segment = &values[start..end];
            RegimePeriod {
                regime: k + 1,
                start,
                end,
                start_date: dates.map(|d| d[start]),
                end_date: dates.map(|d| d[end - 1]),
                duration: end - start,
                mean: mean(segment).unwrap_or(f64::NAN),
                std: sample_std(segment),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::regime_periods;
    use cbs_core::{CbsError, TimeIndex};
    use chrono::NaiveDate;

    #[test]
    fn segments_are_disjoint_and_cover_the_series() {
        let values = [1.0, 1.0, 5.0, 7.0, 6.0, 2.0];
        let regimes = regime_periods(&values, TimeIndex::None, &[2, 5]).expect("regimes");
        assert_eq!(regimes.len(), 3);
        assert_eq!((regimes[0].start, regimes[0].end), (0, 2));
        assert_eq!((regimes[1].start, regimes[1].end), (2, 5));
        assert_eq!(regimes[1].mean, 6.0);
        assert_eq!(regimes[1].std, Some(1.0));
        assert_eq!(regimes[2].duration, 1);
        assert_eq!(regimes[2].std, None);
        assert_eq!(regimes.iter().map(|r| r.duration).sum::<usize>(), values.len());
        assert!(regimes[0].start_date.is_none());
    }

    #[test]
    fn dates_bound_each_regime() {
        let dates: Vec<NaiveDate> = (1..=4)
            .map(|m| NaiveDate::from_ymd_opt(2010, m, 1).expect("valid"))
            .collect();
        let regimes =
            regime_periods(&[0.0, 0.0, 3.0, 3.0], TimeIndex::Dates(&dates), &[2]).expect("regimes");
        assert_eq!(regimes[0].end_date, Some(dates[1]));
        assert_eq!(regimes[1].start_date, Some(dates[2]));
        assert_eq!(regimes[1].regime, 2);
    }

    #[test]
    fn no_breakpoints_yields_one_regime() {
        let regimes = regime_periods(&[2.0, 4.0], TimeIndex::None, &[]).expect("regimes");
        assert_eq!(regimes.len(), 1);
        assert_eq!(regimes[0].mean, 3.0);
    }

    #[test]
    fn invalid_breakpoints_are_rejected() {
        let values = [1.0, 2.0, 3.0];
        assert!(matches!(
            regime_periods(&values, TimeIndex::None, &[0]),
            Err(CbsError::InvalidInput(_))
        ));
        assert!(matches!(
            regime_periods(&values, TimeIndex::None, &[2, 1]),
            Err(CbsError::InvalidInput(_))
        ));
        assert!(matches!(
            regime_periods(&values, TimeIndex::None, &[3]),
            Err(CbsError::InvalidInput(_))
        ));
        assert!(matches!(
            regime_periods(&[], TimeIndex::None, &[]),
            Err(CbsError::EmptyInput(_))
        ));
    }
}
