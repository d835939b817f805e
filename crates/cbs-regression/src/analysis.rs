// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::engine::RollingRegression;
use cbs_core::{CbsError, Column, Frequency, Panel, TimeSeries};
use cbs_preprocess::{AlignConfig, Aligner, FillPolicy, JoinHow, difference_panel};
use tracing::debug;

/// Outer-merges panels monthly, forward-fills, keeps complete rows and
/// first-differences them, keeping only rows where every difference exists.
pub fn merge_and_difference(panels: &[&Panel]) -> Result<Panel, CbsError> {
    let mut series = Vec::new();
    for panel in panels {
        if panel.is_empty() {
            return Err(CbsError::empty_input("cannot merge an empty panel"));
        }
        for name in panel.column_names() {
            series.push(panel.series(name)?);
        }
    }
    let merged = Aligner::new(AlignConfig {
        frequency: Frequency::MonthStart,
        how: JoinHow::Outer,
        fill: FillPolicy::Forward,
    })
    .align(&series)?
    .drop_incomplete_rows();
    let differenced = difference_panel(&merged)?.drop_incomplete_rows();
    debug!(
        merged_rows = merged.n_rows(),
        differenced_rows = differenced.n_rows(),
        "merged and differenced panels"
    );
    if differenced.n_rows() == 0 {
        return Err(CbsError::empty_input(
            "no complete rows remain after merging and differencing",
        ));
    }
    Ok(differenced)
}

/// Rolling regression of one index against the sentiment factors.
#[derive(Clone, Debug, PartialEq)]
pub struct RollingAnalysis {
    pub index_name: String,
    /// Index and factor columns after merging and differencing.
    pub differenced: Panel,
    /// One column per factor.
    pub betas: Panel,
    /// One column per factor.
    pub r_squared: Panel,
}

impl RollingAnalysis {
    /// `<factor>_beta` and `<factor>_r2` columns, factor by factor.
    pub fn results_table(&self) -> Result<Panel, CbsError> {
        let mut columns = Vec::with_capacity(self.betas.n_cols() * 2);
        for (beta, r2) in self.betas.columns().iter().zip(self.r_squared.columns()) {
            columns.push(Column {
                name: format!("{}_beta", beta.name),
                values: beta.values.clone(),
            });
            columns.push(Column {
                name: format!("{}_r2", r2.name),
                values: r2.values.clone(),
            });
        }
        Panel::new(self.betas.index().to_vec(), columns)
    }
}

/// Differences `index` together with `sentiment` and regresses the index on
/// each factor column of `sentiment`.
pub fn rolling_analysis(
    index: &TimeSeries,
    sentiment: &Panel,
    engine: &RollingRegression,
) -> Result<RollingAnalysis, CbsError> {
    if index.is_empty() {
        return Err(CbsError::empty_input("index series is empty"));
    }
    if sentiment.is_empty() {
        return Err(CbsError::empty_input("sentiment panel is empty"));
    }
    let index_panel = Panel::from_series(vec![index.clone()])?;
    let differenced = merge_and_difference(&[&index_panel, sentiment])?;

    let factor_names = sentiment.column_names();
    let factors = differenced.select(&factor_names)?;
    let assets = differenced.select(&[index.name()])?;
    let fitted = engine.fit(&factors, &assets)?;

    let mut betas = Vec::with_capacity(factor_names.len());
    let mut r_squared = Vec::with_capacity(factor_names.len());
    for name in &factor_names {
        let Some(result) = fitted.get(*name) else {
            return Err(CbsError::missing_column(format!(
                "no regression result for factor '{name}'"
            )));
        };
        betas.push(Column {
            name: (*name).to_string(),
            values: result.betas.column(index.name())?.to_vec(),
        });
        r_squared.push(Column {
            name: (*name).to_string(),
            values: result.r_squared.column(index.name())?.to_vec(),
        });
    }
    let axis = assets.index().to_vec();
    Ok(RollingAnalysis {
        index_name: index.name().to_string(),
        betas: Panel::new(axis.clone(), betas)?,
        r_squared: Panel::new(axis, r_squared)?,
        differenced,
    })
}

#[cfg(test)]
mod tests {
    use super::{merge_and_difference, rolling_analysis};
    use crate::{RegressionConfig, RollingRegression};
    use cbs_core::{CbsError, Column, Frequency, Panel, TimeSeries};
    use chrono::NaiveDate;

    fn months(start: (i32, u32), n: usize) -> Vec<NaiveDate> {
        let first = NaiveDate::from_ymd_opt(start.0, start.1, 1).expect("valid");
        let last = NaiveDate::from_ymd_opt(start.0 + 10, 1, 1).expect("valid");
        Frequency::MonthStart.range(first, last).into_iter().take(n).collect()
    }

    fn sentiment(n: usize) -> Panel {
        let hawkish: Vec<Option<f64>> = (0..n).map(|i| Some(((i * 7) % 5) as f64)).collect();
        let dovish: Vec<Option<f64>> = (0..n).map(|i| Some(((i * 3) % 4) as f64)).collect();
        Panel::new(
            months((2020, 1), n),
            vec![
                Column {
                    name: "hawkish".to_string(),
                    values: hawkish,
                },
                Column {
                    name: "dovish".to_string(),
                    values: dovish,
                },
            ],
        )
        .expect("valid")
    }

    #[test]
    fn merge_forward_fills_then_differences() {
        let a = Panel::new(
            months((2020, 1), 4),
            vec![Column {
                name: "a".to_string(),
                values: vec![Some(1.0), None, Some(4.0), Some(8.0)],
            }],
        )
        .expect("valid");
        let b = Panel::new(
            months((2020, 2), 3),
            vec![Column {
                name: "b".to_string(),
                values: vec![Some(10.0), Some(11.0), Some(13.0)],
            }],
        )
        .expect("valid");
        let out = merge_and_difference(&[&a, &b]).expect("merged");
        // complete rows after fill: Feb (1, 10), Mar (4, 11), Apr (8, 13)
        assert_eq!(out.index(), &months((2020, 3), 2)[..]);
        assert_eq!(out.column("a").expect("a"), &[Some(3.0), Some(4.0)]);
        assert_eq!(out.column("b").expect("b"), &[Some(1.0), Some(2.0)]);
    }

    #[test]
    fn analysis_regresses_index_on_every_factor() {
        let n = 24;
        let index_values: Vec<f64> = (0..n).map(|i| (i as f64 * 0.4).sin() * 3.0).collect();
        let index = TimeSeries::from_f64("Macro Index", months((2020, 1), n), &index_values)
            .expect("valid");
        let engine = RollingRegression::new(RegressionConfig::rolling(6)).expect("valid");
        let analysis = rolling_analysis(&index, &sentiment(n), &engine).expect("analysis");
        assert_eq!(analysis.differenced.n_rows(), n - 1);
        assert_eq!(
            analysis.differenced.column_names(),
            vec!["Macro Index", "hawkish", "dovish"]
        );
        assert_eq!(analysis.betas.column_names(), vec!["hawkish", "dovish"]);
        assert!(analysis.betas.column("hawkish").expect("hawkish")[4].is_none());
        assert!(analysis.betas.column("hawkish").expect("hawkish")[5].is_some());

        let table = analysis.results_table().expect("table");
        assert_eq!(
            table.column_names(),
            vec!["hawkish_beta", "hawkish_r2", "dovish_beta", "dovish_r2"]
        );
    }

    #[test]
    fn empty_sides_fail() {
        let engine = RollingRegression::new(RegressionConfig::rolling(3)).expect("valid");
        let empty_index = TimeSeries::new("Macro Index", vec![], vec![]).expect("valid");
        assert!(matches!(
            rolling_analysis(&empty_index, &sentiment(5), &engine),
            Err(CbsError::EmptyInput(_))
        ));
        let index =
            TimeSeries::from_f64("Macro Index", months((2020, 1), 3), &[1.0, 2.0, 3.0]).expect("valid");
        let empty = Panel::new(vec![], vec![]).expect("valid");
        assert!(matches!(
            rolling_analysis(&index, &empty, &engine),
            Err(CbsError::EmptyInput(_))
        ));
    }
}
