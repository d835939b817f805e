// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::{CbsError, TimeSeries, validate_index};
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// Named column of a [`Panel`].
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// Named series sharing one canonical timestamp axis.
///
/// Every column has exactly one value per index entry. Column order is the
/// insertion order and is preserved through every transform.
#[derive(Clone, Debug, PartialEq)]
pub struct Panel {
    index: Vec<NaiveDate>,
    columns: Vec<Column>,
}

impl Panel {
    /// Constructs a validated panel.
    pub fn new(index: Vec<NaiveDate>, columns: Vec<Column>) -> Result<Self, CbsError> {
        validate_index("panel", &index)?;
        let mut seen = BTreeSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(CbsError::invalid_input(format!(
                    "panel column '{}' appears more than once",
                    column.name
                )));
            }
            if column.values.len() != index.len() {
                return Err(CbsError::misaligned(format!(
                    "panel column '{}' has {} values for {} timestamps",
                    column.name,
                    column.values.len(),
                    index.len()
                )));
            }
        }
        let columns = columns
            .into_iter()
            .map(|c| Column {
                name: c.name,
                values: c
                    .values
                    .into_iter()
                    .map(|v| v.filter(|x| x.is_finite()))
                    .collect(),
            })
            .collect();
        Ok(Self { index, columns })
    }

    /// Builds a panel from series that already share the same axis.
    pub fn from_series(series: Vec<TimeSeries>) -> Result<Self, CbsError> {
        let Some(first) = series.first() else {
            return Self::new(vec![], vec![]);
        };
        let index = first.index().to_vec();
        let mut columns = Vec::with_capacity(series.len());
        for s in series {
            if s.index() != index.as_slice() {
                return Err(CbsError::misaligned(format!(
                    "series '{}' does not share the panel timestamp axis; align first",
                    s.name()
                )));
            }
            let (name, _, values) = s.into_parts();
            columns.push(Column { name, values });
        }
        Self::new(index, columns)
    }

    pub fn index(&self) -> &[NaiveDate] {
        &self.index
    }

    pub fn n_rows(&self) -> usize {
        self.index.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// True when the panel has no rows or no columns.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty() || self.columns.is_empty()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Result<&[Option<f64>], CbsError> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
            .ok_or_else(|| {
                CbsError::missing_column(format!(
                    "'{name}' not found; available: {:?}",
                    self.column_names()
                ))
            })
    }

    /// Extracts one column as a standalone series.
    pub fn series(&self, name: &str) -> Result<TimeSeries, CbsError> {
        let values = self.column(name)?.to_vec();
        TimeSeries::new(name, self.index.clone(), values)
    }

    /// Keeps the named columns, in the requested order.
    pub fn select(&self, names: &[&str]) -> Result<Self, CbsError> {
        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            columns.push(Column {
                name: (*name).to_string(),
                values: self.column(name)?.to_vec(),
            });
        }
        Self::new(self.index.clone(), columns)
    }

    /// Values of row `row` across all columns.
    pub fn row(&self, row: usize) -> Vec<Option<f64>> {
        self.columns.iter().map(|c| c.values[row]).collect()
    }

    /// Keeps only rows where every column is present.
    pub fn drop_incomplete_rows(&self) -> Self {
        let keep: Vec<usize> = (0..self.n_rows())
            .filter(|&row| self.columns.iter().all(|c| c.values[row].is_some()))
            .collect();
        self.take_rows(&keep)
    }

    /// Keeps only rows whose timestamps appear in `dates`.
    pub fn restrict_to(&self, dates: &[NaiveDate]) -> Self {
        let wanted: BTreeSet<NaiveDate> = dates.iter().copied().collect();
        let keep: Vec<usize> = (0..self.n_rows())
            .filter(|&row| wanted.contains(&self.index[row]))
            .collect();
        self.take_rows(&keep)
    }

    fn take_rows(&self, rows: &[usize]) -> Self {
        Self {
            index: rows.iter().map(|&r| self.index[r]).collect(),
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    values: rows.iter().map(|&r| c.values[r]).collect(),
                })
                .collect(),
        }
    }

    /// Applies `f` to every column, keeping names and axis.
    pub fn map_columns<F>(&self, mut f: F) -> Result<Self, CbsError>
    where
        F: FnMut(&str, &[Option<f64>]) -> Result<Vec<Option<f64>>, CbsError>,
    {
        let mut columns = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            columns.push(Column {
                name: column.name.clone(),
                values: f(&column.name, &column.values)?,
            });
        }
        Self::new(self.index.clone(), columns)
    }

    /// Appends the columns of `other`, which must share this axis.
    pub fn hstack(&self, other: &Self) -> Result<Self, CbsError> {
        if self.index != other.index {
            return Err(CbsError::misaligned(
                "cannot stack panels with different timestamp axes",
            ));
        }
        let mut columns = self.columns.clone();
        columns.extend(other.columns.iter().cloned());
        Self::new(self.index.clone(), columns)
    }
}
