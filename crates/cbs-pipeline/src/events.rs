// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::table::parse_datetime;
use cbs_core::CbsError;
use cbs_preprocess::SentimentEvent;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const REQUIRED_COLUMNS: [&str; 3] = ["datetime", "country_code", "sentiment"];

/// Supplier of classified events.
pub trait EventSource {
    fn describe(&self) -> String;

    fn load_events(&self) -> Result<Vec<SentimentEvent>, CbsError>;
}

impl EventSource for Vec<SentimentEvent> {
    fn describe(&self) -> String {
        format!("{} in-memory events", self.len())
    }

    fn load_events(&self) -> Result<Vec<SentimentEvent>, CbsError> {
        Ok(self.clone())
    }
}

/// Reads events from a table with `datetime`, `country_code` and
/// `sentiment` columns; any other columns are ignored.
///
/// Rows with an empty label are skipped.
pub fn read_events<R: Read>(reader: R) -> Result<Vec<SentimentEvent>, CbsError> {
    let mut input = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = input
        .headers()
        .map_err(|e| CbsError::io("failed to read event headers", e))?
        .clone();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|name| !headers.iter().any(|h| h == *name))
        .collect();
    if !missing.is_empty() {
        return Err(CbsError::missing_column(format!(
            "event table lacks required columns {missing:?}"
        )));
    }
    let position = |name: &str| headers.iter().position(|h| h == name).unwrap_or_default();
    let (at, country, label) = (
        position("datetime"),
        position("country_code"),
        position("sentiment"),
    );

    let mut events = Vec::new();
    let mut unlabeled = 0usize;
    for (row, record) in input.records().enumerate() {
        let line = row + 2;
        let record =
            record.map_err(|e| CbsError::io(format!("failed to read event line {line}"), e))?;
        let sentiment = record.get(label).unwrap_or_default();
        if sentiment.is_empty() {
            unlabeled += 1;
            continue;
        }
        let timestamp = parse_datetime(record.get(at).unwrap_or_default())
            .map_err(|e| CbsError::invalid_input(format!("event line {line}: {e}")))?;
        events.push(SentimentEvent::new(
            timestamp,
            record.get(country).unwrap_or_default(),
            sentiment,
        ));
    }
    if unlabeled > 0 {
        debug!(unlabeled, "skipped events without a sentiment label");
    }
    Ok(events)
}

/// Event table stored as CSV.
#[derive(Clone, Debug)]
pub struct CsvEventSource {
    path: PathBuf,
}

impl CsvEventSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSource for CsvEventSource {
    fn describe(&self) -> String {
        format!("event table {}", self.path.display())
    }

    fn load_events(&self) -> Result<Vec<SentimentEvent>, CbsError> {
        let file = File::open(&self.path)
            .map_err(|e| CbsError::io(format!("failed to open {}", self.path.display()), e))?;
        let events = read_events(file)?;
        info!(path = %self.path.display(), events = events.len(), "loaded sentiment events");
        Ok(events)
    }
}
