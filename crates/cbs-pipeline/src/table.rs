// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Flat CSV codec for date-indexed panels.
//!
//! Dates are written as `%Y-%m-%d`; floats use the shortest representation
//! that parses back to the same value, and undefined cells are empty.

use cbs_core::{CbsError, Column, Frequency, Panel};
use chrono::{NaiveDate, NaiveDateTime};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Header names recognised as the timestamp column, in priority order.
pub const DATE_COLUMNS: [&str; 5] = ["date", "Date", "datetime", "Datetime", "index"];

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

pub fn format_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parses a timestamp with or without a time-of-day part.
pub fn parse_datetime(raw: &str) -> Result<NaiveDateTime, CbsError> {
    let raw = raw.trim();
    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(parsed);
        }
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map(|d| d.and_time(chrono::NaiveTime::MIN))
        .map_err(|_| CbsError::invalid_input(format!("unrecognised timestamp '{raw}'")))
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, CbsError> {
    parse_datetime(raw).map(|dt| dt.date())
}

/// Empty, `.`, and NaN spellings are missing.
pub fn parse_cell(raw: &str) -> Result<Option<f64>, CbsError> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "." || raw.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .map_err(|_| CbsError::invalid_input(format!("unparseable numeric cell '{raw}'")))
}

/// Writes `date` followed by one column per panel column.
pub fn write_panel<W: Write>(writer: W, panel: &Panel) -> Result<(), CbsError> {
    let mut out = csv::Writer::from_writer(writer);
    let mut header = Vec::with_capacity(panel.n_cols() + 1);
    header.push("date".to_string());
    header.extend(panel.column_names().into_iter().map(str::to_string));
    out.write_record(&header)
        .map_err(|e| CbsError::io("failed to write csv header", e))?;
    for (row, date) in panel.index().iter().enumerate() {
        let mut record = Vec::with_capacity(panel.n_cols() + 1);
        record.push(format_date(*date));
        record.extend(panel.columns().iter().map(|c| format_cell(c.values[row])));
        out.write_record(&record)
            .map_err(|e| CbsError::io("failed to write csv row", e))?;
    }
    out.flush()
        .map_err(|e| CbsError::io("failed to flush csv writer", e))
}

pub fn write_panel_file(path: &Path, panel: &Panel) -> Result<(), CbsError> {
    let file = File::create(path)
        .map_err(|e| CbsError::io(format!("failed to create {}", path.display()), e))?;
    write_panel(file, panel)
}

/// Reads a panel, detecting the timestamp column by name.
///
/// An unnamed first column is also taken as the timestamp. Without any
/// timestamp column, rows are assigned consecutive month starts from
/// `fallback_start`.
pub fn read_panel<R: Read>(reader: R, fallback_start: Option<NaiveDate>) -> Result<Panel, CbsError> {
    let mut input = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = input
        .headers()
        .map_err(|e| CbsError::io("failed to read csv headers", e))?
        .clone();
    let date_position = DATE_COLUMNS
        .iter()
        .find_map(|name| headers.iter().position(|h| h == *name))
        .or_else(|| (headers.get(0) == Some("")).then_some(0));

    let value_positions: Vec<usize> = (0..headers.len())
        .filter(|k| Some(*k) != date_position)
        .collect();
    let mut dates = Vec::new();
    let mut columns: Vec<Column> = value_positions
        .iter()
        .map(|k| Column {
            name: headers.get(*k).unwrap_or_default().to_string(),
            values: Vec::new(),
        })
        .collect();

    for (row, record) in input.records().enumerate() {
        let line = row + 2;
        let record = record.map_err(|e| CbsError::io(format!("failed to read csv line {line}"), e))?;
        if let Some(position) = date_position {
            let raw = record.get(position).unwrap_or_default();
            dates.push(parse_date(raw).map_err(|e| {
                CbsError::invalid_input(format!("line {line}: {e}"))
            })?);
        }
        for (column, k) in columns.iter_mut().zip(&value_positions) {
            let raw = record.get(*k).unwrap_or_default();
            let value = parse_cell(raw).map_err(|e| {
                CbsError::invalid_input(format!("line {line}, column '{}': {e}", column.name))
            })?;
            column.values.push(value);
        }
    }

    let n_rows = columns.first().map_or(dates.len(), |c| c.values.len());
    if date_position.is_none() {
        let Some(start) = fallback_start else {
            return Err(CbsError::missing_column(format!(
                "no timestamp column among {DATE_COLUMNS:?} and no fallback start date"
            )));
        };
        dates = month_starts(start, n_rows)?;
    }
    Panel::new(dates, columns)
}

pub fn read_panel_file(path: &Path, fallback_start: Option<NaiveDate>) -> Result<Panel, CbsError> {
    let file = File::open(path)
        .map_err(|e| CbsError::io(format!("failed to open {}", path.display()), e))?;
    read_panel(file, fallback_start)
}

fn month_starts(start: NaiveDate, count: usize) -> Result<Vec<NaiveDate>, CbsError> {
    let mut dates = Vec::with_capacity(count);
    let mut current = Frequency::MonthStart.bucket(start);
    for _ in 0..count {
        dates.push(current);
        current = Frequency::MonthStart
            .next(current)
            .ok_or_else(|| CbsError::invalid_input("monthly calendar overflowed"))?;
    }
    Ok(dates)
}
