// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use cbs_core::{CbsError, Column, Frequency, Panel, TimeSeries, validate_index};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// How the canonical axis is derived from the input axes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinHow {
    /// Buckets observed in every input.
    Inner,
    /// Every bucket between the earliest and latest observation of any input.
    #[default]
    Outer,
}

/// Treatment of buckets with no observation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillPolicy {
    /// Leave as missing.
    #[default]
    None,
    /// Carry the last present value forward.
    Forward,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignConfig {
    pub frequency: Frequency,
    pub how: JoinHow,
    pub fill: FillPolicy,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            frequency: Frequency::MonthStart,
            how: JoinHow::Outer,
            fill: FillPolicy::None,
        }
    }
}

/// Merges independently sampled series onto one calendar axis.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Aligner {
    config: AlignConfig,
}

struct Bucketed {
    name: String,
    keys: BTreeSet<NaiveDate>,
    values: BTreeMap<NaiveDate, f64>,
}

impl Aligner {
    pub fn new(config: AlignConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AlignConfig {
        &self.config
    }

    /// Aligns raw `(name, dates, values)` triples, validating each axis first.
    pub fn align_raw(
        &self,
        inputs: Vec<(String, Vec<NaiveDate>, Vec<Option<f64>>)>,
    ) -> Result<Panel, CbsError> {
        let series = inputs
            .into_iter()
            .map(|(name, index, values)| TimeSeries::new(name, index, values))
            .collect::<Result<Vec<_>, _>>()?;
        self.align(&series)
    }

    pub fn align(&self, series: &[TimeSeries]) -> Result<Panel, CbsError> {
        if series.is_empty() {
            return Err(CbsError::empty_input("aligner received zero series"));
        }

        let bucketed = series
            .iter()
            .map(|s| self.bucket_series(s))
            .collect::<Result<Vec<_>, _>>()?;

        let axis = self.canonical_axis(&bucketed);
        let mut columns = Vec::with_capacity(bucketed.len());
        for b in bucketed {
            let mut values: Vec<Option<f64>> =
                axis.iter().map(|key| b.values.get(key).copied()).collect();
            if self.config.fill == FillPolicy::Forward {
                forward_fill(&mut values);
            }
            columns.push(Column {
                name: b.name,
                values,
            });
        }

        info!(
            series = series.len(),
            rows = axis.len(),
            how = ?self.config.how,
            frequency = self.config.frequency.label(),
            "aligned series onto canonical axis"
        );
        Panel::new(axis, columns)
    }

    fn bucket_series(&self, series: &TimeSeries) -> Result<Bucketed, CbsError> {
        validate_index(series.name(), series.index())?;
        let mut keys = BTreeSet::new();
        let mut values = BTreeMap::new();
        // Last present observation within a bucket wins.
        for (date, value) in series.index().iter().zip(series.values()) {
            let key = self.config.frequency.bucket(*date);
            keys.insert(key);
            if let Some(v) = value {
                values.insert(key, *v);
            }
        }
        if keys.len() < series.len() {
            debug!(
                series = series.name(),
                observations = series.len(),
                buckets = keys.len(),
                "collapsed observations into calendar buckets"
            );
        }
        Ok(Bucketed {
            name: series.name().to_string(),
            keys,
            values,
        })
    }

    fn canonical_axis(&self, bucketed: &[Bucketed]) -> Vec<NaiveDate> {
        match self.config.how {
            JoinHow::Inner => {
                let mut iter = bucketed.iter();
                let Some(first) = iter.next() else {
                    return vec![];
                };
                let mut common = first.keys.clone();
                for b in iter {
                    common = common.intersection(&b.keys).copied().collect();
                }
                common.into_iter().collect()
            }
            JoinHow::Outer => {
                let first = bucketed.iter().filter_map(|b| b.keys.first()).min();
                let last = bucketed.iter().filter_map(|b| b.keys.last()).max();
                match (first, last) {
                    (Some(first), Some(last)) => self.config.frequency.range(*first, *last),
                    _ => vec![],
                }
            }
        }
    }
}

fn forward_fill(values: &mut [Option<f64>]) {
    let mut last = None;
    for value in values.iter_mut() {
        match value {
            Some(v) => last = Some(*v),
            None => *value = last,
        }
    }
}
