// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::CbsError;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Calendar frequency onto which series are bucketed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    /// One bucket per calendar day.
    Daily,
    /// One bucket per month, keyed by the first day of the month.
    MonthStart,
}

impl Frequency {
    /// Maps a date to the key of the bucket that contains it.
    pub fn bucket(self, date: NaiveDate) -> NaiveDate {
        match self {
            Self::Daily => date,
            Self::MonthStart => date.with_day(1).unwrap_or(date),
        }
    }

    /// Returns the key of the bucket following `key`.
    pub fn next(self, key: NaiveDate) -> Option<NaiveDate> {
        match self {
            Self::Daily => key.succ_opt(),
            Self::MonthStart => {
                let (year, month) = if key.month() == 12 {
                    (key.year() + 1, 1)
                } else {
                    (key.year(), key.month() + 1)
                };
                NaiveDate::from_ymd_opt(year, month, 1)
            }
        }
    }

    /// Every bucket key from the bucket of `start` through the bucket of `end`.
    pub fn range(self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        let mut out = vec![];
        let last = self.bucket(end);
        let mut cursor = Some(self.bucket(start));
        while let Some(key) = cursor {
            if key > last {
                break;
            }
            out.push(key);
            cursor = self.next(key);
        }
        out
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::MonthStart => "month_start",
        }
    }
}

/// Optional temporal metadata for a positional series.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeIndex<'a> {
    /// Implicit sample index (0..n-1); no dates can be attached.
    None,
    /// Explicit dates, length must match the series.
    Dates(&'a [NaiveDate]),
}

impl<'a> TimeIndex<'a> {
    pub fn dates(&self) -> Option<&'a [NaiveDate]> {
        match self {
            Self::None => None,
            Self::Dates(dates) => Some(dates),
        }
    }
}

/// Checks that a timestamp axis is strictly increasing.
pub fn validate_index(name: &str, index: &[NaiveDate]) -> Result<(), CbsError> {
    if let Some(pos) = index.windows(2).position(|pair| pair[1] <= pair[0]) {
        let (left, right) = (index[pos], index[pos + 1]);
        let kind = if left == right {
            "duplicate"
        } else {
            "non-monotonic"
        };
        return Err(CbsError::misaligned(format!(
            "series '{name}' has a {kind} timestamp axis at position {}: {left} followed by {right}",
            pos + 1
        )));
    }
    Ok(())
}

/// Ordered `(date, value)` observations with a unique, increasing key.
///
/// Missing observations are `None`; non-finite inputs are normalized to `None`.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeSeries {
    name: String,
    index: Vec<NaiveDate>,
    values: Vec<Option<f64>>,
}

impl TimeSeries {
    /// Constructs a validated series.
    pub fn new(
        name: impl Into<String>,
        index: Vec<NaiveDate>,
        values: Vec<Option<f64>>,
    ) -> Result<Self, CbsError> {
        let name = name.into();
        if index.len() != values.len() {
            return Err(CbsError::invalid_input(format!(
                "series '{name}' length mismatch: {} dates, {} values",
                index.len(),
                values.len()
            )));
        }
        validate_index(&name, &index)?;
        let values = values
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect();
        Ok(Self {
            name,
            index,
            values,
        })
    }

    /// Convenience constructor where NaN marks a missing value.
    pub fn from_f64(
        name: impl Into<String>,
        index: Vec<NaiveDate>,
        values: &[f64],
    ) -> Result<Self, CbsError> {
        Self::new(name, index, values.iter().map(|v| Some(*v)).collect())
    }

    /// Sorts unordered observations by date; duplicate dates are rejected.
    pub fn from_unsorted(
        name: impl Into<String>,
        mut observations: Vec<(NaiveDate, Option<f64>)>,
    ) -> Result<Self, CbsError> {
        observations.sort_by_key(|(date, _)| *date);
        let (index, values) = observations.into_iter().unzip();
        Self::new(name, index, values)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> &[NaiveDate] {
        &self.index
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Number of non-missing observations.
    pub fn present_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.index
            .binary_search(&date)
            .ok()
            .and_then(|pos| self.values[pos])
    }

    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Values with missing entries as NaN, for numeric kernels.
    pub fn to_f64_lossy(&self) -> Vec<f64> {
        self.values.iter().map(|v| v.unwrap_or(f64::NAN)).collect()
    }

    /// Drops missing observations.
    pub fn dropna(&self) -> Self {
        let (index, values) = self
            .index
            .iter()
            .zip(self.values.iter())
            .filter(|(_, v)| v.is_some())
            .map(|(d, v)| (*d, *v))
            .unzip();
        Self {
            name: self.name.clone(),
            index,
            values,
        }
    }

    pub fn into_parts(self) -> (String, Vec<NaiveDate>, Vec<Option<f64>>) {
        (self.name, self.index, self.values)
    }
}
