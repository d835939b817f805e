// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use cbs_core::{CbsError, Panel, mean, sample_std};
use tracing::info;

/// Trailing window with a minimum count of present values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RollingWindow {
    window: usize,
    min_periods: usize,
}

impl RollingWindow {
    /// `min_periods` defaults to `window`.
    pub fn new(window: usize, min_periods: Option<usize>) -> Result<Self, CbsError> {
        if window == 0 {
            return Err(CbsError::invalid_window("window must be >= 1; got 0"));
        }
        let min_periods = min_periods.unwrap_or(window);
        if min_periods == 0 || min_periods > window {
            return Err(CbsError::invalid_window(format!(
                "min_periods must be in 1..={window}; got {min_periods}"
            )));
        }
        Ok(Self {
            window,
            min_periods,
        })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn min_periods(&self) -> usize {
        self.min_periods
    }

    /// Present values of the window ending at `t` (inclusive).
    fn present_ending_at(&self, values: &[Option<f64>], t: usize) -> Vec<f64> {
        let start = (t + 1).saturating_sub(self.window);
        values[start..=t].iter().flatten().copied().collect()
    }
}

/// Trailing z-score `(x - mean) / std` of every position.
///
/// A position is undefined when `x` is missing, when the window holds fewer
/// than `min_periods` (or fewer than two) present values, or when every
/// present value in the window is identical.
pub fn rolling_zscore(values: &[Option<f64>], window: &RollingWindow) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|t| {
            let x = values[t]?;
            let present = window.present_ending_at(values, t);
            if present.len() < window.min_periods || present.len() < 2 {
                return None;
            }
            let (lo, hi) = present
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                    (lo.min(*v), hi.max(*v))
                });
            if lo == hi {
                return None;
            }
            let mu = mean(&present)?;
            let sd = sample_std(&present)?;
            if sd == 0.0 || !sd.is_finite() {
                return None;
            }
            Some((x - mu) / sd).filter(|z| z.is_finite())
        })
        .collect()
}

/// `y_t = x_t - x_{t-1}`; the first position and any gap are undefined.
pub fn first_difference(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    out.extend(values.first().map(|_| None));
    out.extend(values.windows(2).map(|pair| Some(pair[1]? - pair[0]?)));
    out
}

/// First-differences every column of a panel.
pub fn difference_panel(panel: &Panel) -> Result<Panel, CbsError> {
    if panel.is_empty() {
        return Err(CbsError::empty_input("cannot difference an empty panel"));
    }
    panel.map_columns(|_, values| Ok(first_difference(values)))
}

/// Column-wise rolling z-score transform of a panel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RollingStandardizer {
    window: RollingWindow,
}

impl RollingStandardizer {
    pub fn new(window: usize, min_periods: Option<usize>) -> Result<Self, CbsError> {
        Ok(Self {
            window: RollingWindow::new(window, min_periods)?,
        })
    }

    pub fn window(&self) -> &RollingWindow {
        &self.window
    }

    /// Returns a panel on the same axis; undefined cells are `None`.
    pub fn standardize(&self, panel: &Panel) -> Result<Panel, CbsError> {
        if panel.is_empty() {
            return Err(CbsError::empty_input(
                "rolling standardization received an empty panel",
            ));
        }
        info!(
            window = self.window.window,
            min_periods = self.window.min_periods,
            rows = panel.n_rows(),
            columns = panel.n_cols(),
            "applying rolling standardization"
        );
        panel.map_columns(|_, values| Ok(rolling_zscore(values, &self.window)))
    }
}

#[cfg(test)]
mod tests {
    use super::{RollingStandardizer, RollingWindow, difference_panel, first_difference, rolling_zscore};
    use cbs_core::{CbsError, Column, Panel};
    use chrono::NaiveDate;

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().map(|v| Some(*v)).collect()
    }

    fn round2(value: Option<f64>) -> Option<f64> {
        value.map(|v| (v * 100.0).round() / 100.0)
    }

    #[test]
    fn window_three_matches_closed_form_zscores() {
        let window = RollingWindow::new(3, None).expect("valid window");
        let z = rolling_zscore(&some(&[10.0, 12.0, 11.0, 15.0, 14.0, 16.0]), &window);
        let rounded: Vec<Option<f64>> = z.into_iter().map(round2).collect();
        assert_eq!(
            rounded,
            vec![None, None, Some(0.0), Some(1.12), Some(0.32), Some(1.0)]
        );
    }

    #[test]
    fn zero_deviation_window_is_undefined_not_zero() {
        let window = RollingWindow::new(3, None).expect("valid window");
        let z = rolling_zscore(&some(&[0.1, 0.1, 0.1, 0.1, 0.7]), &window);
        assert_eq!(&z[..4], &[None, None, None, None]);
        assert!(z[4].is_some());
    }

    #[test]
    fn min_periods_allows_partial_windows_and_skips_gaps() {
        let window = RollingWindow::new(4, Some(2)).expect("valid window");
        let z = rolling_zscore(&[Some(1.0), Some(3.0), None, Some(5.0)], &window);
        assert_eq!(z[0], None);
        // window [1, 3]: mean 2, std sqrt(2)
        assert!((z[1].expect("defined") - 1.0 / 2f64.sqrt()).abs() < 1e-12);
        assert_eq!(z[2], None);
        // window [1, 3, 5]: mean 3, std 2
        assert!((z[3].expect("defined") - 1.0).abs() < 1e-12);
    }

    #[test]
    fn invalid_windows_are_rejected() {
        assert!(matches!(
            RollingWindow::new(0, None),
            Err(CbsError::InvalidWindow(_))
        ));
        assert!(matches!(
            RollingWindow::new(3, Some(4)),
            Err(CbsError::InvalidWindow(_))
        ));
        assert!(RollingStandardizer::new(0, None).is_err());
    }

    #[test]
    fn first_difference_drops_first_observation() {
        assert_eq!(
            first_difference(&[Some(1.0), Some(4.0), None, Some(2.0), Some(2.5)]),
            vec![None, Some(3.0), None, None, Some(0.5)]
        );
        assert!(first_difference(&[]).is_empty());
    }

    #[test]
    fn empty_panels_fail_fast() {
        let empty = Panel::new(vec![], vec![]).expect("empty panel is constructible");
        let standardizer = RollingStandardizer::new(3, None).expect("valid");
        assert!(matches!(
            standardizer.standardize(&empty),
            Err(CbsError::EmptyInput(_))
        ));
        assert!(matches!(difference_panel(&empty), Err(CbsError::EmptyInput(_))));
    }

    #[test]
    fn standardize_keeps_axis_and_column_order() {
        let index: Vec<NaiveDate> = (1..=4)
            .map(|m| NaiveDate::from_ymd_opt(2021, m, 1).expect("valid"))
            .collect();
        let panel = Panel::new(
            index.clone(),
            vec![
                Column {
                    name: "b".to_string(),
                    values: some(&[1.0, 2.0, 4.0, 8.0]),
                },
                Column {
                    name: "a".to_string(),
                    values: some(&[5.0, 5.0, 5.0, 5.0]),
                },
            ],
        )
        .expect("valid panel");
        let out = RollingStandardizer::new(2, None)
            .expect("valid")
            .standardize(&panel)
            .expect("standardized");
        assert_eq!(out.index(), index.as_slice());
        assert_eq!(out.column_names(), vec!["b", "a"]);
        assert!(out.column("a").expect("a").iter().all(Option::is_none));
    }
}
