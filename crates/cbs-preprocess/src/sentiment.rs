// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::rolling::{RollingWindow, rolling_zscore};
use cbs_core::{CbsError, Column, Frequency, Panel};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{info, warn};

pub const HAWKISH: &str = "hawkish";
pub const DOVISH: &str = "dovish";
pub const NEUTRAL: &str = "neutral";
pub const TOTAL: &str = "total";

const KNOWN_LABELS: [&str; 3] = [HAWKISH, DOVISH, NEUTRAL];

/// One classified statement.
#[derive(Clone, Debug, PartialEq)]
pub struct SentimentEvent {
    pub timestamp: NaiveDateTime,
    pub country_code: String,
    pub label: String,
}

impl SentimentEvent {
    pub fn new(
        timestamp: NaiveDateTime,
        country_code: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            country_code: country_code.into(),
            label: label.into(),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

/// Monthly aggregation settings.
#[derive(Clone, Debug, PartialEq)]
pub struct SentimentConfig {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Months by which counts are delayed so month `t` only sees `t - shift`.
    pub shift_periods: usize,
    /// Trailing standardization; `None` keeps raw counts.
    pub window: Option<RollingWindow>,
    /// Only events from this country are counted; `None` counts all.
    pub country: Option<String>,
}

impl SentimentConfig {
    pub fn validate(&self) -> Result<(), CbsError> {
        if self.start > self.end {
            return Err(CbsError::invalid_input(format!(
                "sentiment start {} is after end {}",
                self.start, self.end
            )));
        }
        Ok(())
    }
}

/// Turns classified events into monthly `hawkish` / `dovish` columns.
#[derive(Clone, Debug)]
pub struct SentimentAggregator {
    config: SentimentConfig,
}

impl SentimentAggregator {
    pub fn new(config: SentimentConfig) -> Result<Self, CbsError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SentimentConfig {
        &self.config
    }

    fn filtered<'a>(&self, events: &'a [SentimentEvent]) -> Result<Vec<&'a SentimentEvent>, CbsError> {
        if events.is_empty() {
            return Err(CbsError::empty_input("no sentiment events supplied"));
        }
        let kept = filter_country(events, self.config.country.as_deref());
        if kept.is_empty() {
            return Err(CbsError::empty_input(format!(
                "no sentiment events for country {:?}",
                self.config.country
            )));
        }
        Ok(kept)
    }

    /// Shifted monthly label counts over every month of `[start, end]`.
    ///
    /// Events outside the date range are ignored; the first `shift_periods`
    /// months are undefined.
    pub fn monthly_counts(&self, events: &[SentimentEvent]) -> Result<Panel, CbsError> {
        let kept = self.filtered(events)?;
        let months = Frequency::MonthStart.range(self.config.start, self.config.end);
        let mut counts: BTreeMap<NaiveDate, (f64, f64)> =
            months.iter().map(|m| (*m, (0.0, 0.0))).collect();
        let mut outside = 0usize;
        for event in kept {
            let day = event.date();
            if day < self.config.start || day > self.config.end {
                outside += 1;
                continue;
            }
            let key = Frequency::MonthStart.bucket(day);
            let Some(slot) = counts.get_mut(&key) else {
                continue;
            };
            match event.label.as_str() {
                HAWKISH => slot.0 += 1.0,
                DOVISH => slot.1 += 1.0,
                _ => {}
            }
        }
        if outside > 0 {
            info!(
                outside,
                start = %self.config.start,
                end = %self.config.end,
                "ignoring sentiment events outside the analysis range"
            );
        }

        let shift = self.config.shift_periods;
        let shifted = |pick: fn(&(f64, f64)) -> f64| -> Vec<Option<f64>> {
            let raw: Vec<f64> = counts.values().map(pick).collect();
            (0..raw.len())
                .map(|t| t.checked_sub(shift).map(|src| raw[src]))
                .collect()
        };
        Panel::new(
            months,
            vec![
                Column {
                    name: HAWKISH.to_string(),
                    values: shifted(|c| c.0),
                },
                Column {
                    name: DOVISH.to_string(),
                    values: shifted(|c| c.1),
                },
            ],
        )
    }

    /// Unshifted number of events per month of `[start, end]`, any label.
    pub fn monthly_totals(&self, events: &[SentimentEvent]) -> Result<Panel, CbsError> {
        let kept = self.filtered(events)?;
        let months = Frequency::MonthStart.range(self.config.start, self.config.end);
        let mut totals: BTreeMap<NaiveDate, f64> = months.iter().map(|m| (*m, 0.0)).collect();
        for event in kept {
            let day = event.date();
            if day < self.config.start || day > self.config.end {
                continue;
            }
            if let Some(total) = totals.get_mut(&Frequency::MonthStart.bucket(day)) {
                *total += 1.0;
            }
        }
        Panel::new(
            months,
            vec![Column {
                name: TOTAL.to_string(),
                values: totals.into_values().map(Some).collect(),
            }],
        )
    }

    /// Monthly counts, standardized when a window is configured.
    pub fn aggregate(&self, events: &[SentimentEvent]) -> Result<Panel, CbsError> {
        let counts = self.monthly_counts(events)?;
        let Some(window) = self.config.window else {
            return Ok(counts);
        };
        info!(
            months = counts.n_rows(),
            shift = self.config.shift_periods,
            window = window.window(),
            "standardizing monthly sentiment counts"
        );
        counts.map_columns(|_, values| Ok(rolling_zscore(values, &window)))
    }
}

fn filter_country<'a>(events: &'a [SentimentEvent], country: Option<&str>) -> Vec<&'a SentimentEvent> {
    events
        .iter()
        .filter(|e| country.is_none_or(|c| e.country_code == c))
        .collect()
}

/// Label distribution of a set of events.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SentimentSummary {
    pub hawkish: usize,
    pub dovish: usize,
    pub neutral: usize,
    pub total: usize,
}

impl SentimentSummary {
    /// Share of `count` in percent; zero when there are no events.
    pub fn percentage(&self, count: usize) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            count as f64 / self.total as f64 * 100.0
        }
    }

    /// `(label, count, percent)` rows in report order.
    pub fn rows(&self) -> [(&'static str, usize, f64); 4] {
        [
            ("Hawkish", self.hawkish, self.percentage(self.hawkish)),
            ("Dovish", self.dovish, self.percentage(self.dovish)),
            ("Neutral", self.neutral, self.percentage(self.neutral)),
            ("Total", self.total, 100.0),
        ]
    }
}

impl fmt::Display for SentimentSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (label, count, pct) in self.rows() {
            writeln!(f, "{label:<8} {count:>6} {pct:>6.1}%")?;
        }
        Ok(())
    }
}

/// Counts labels for one country and warns about unexpected or absent labels.
///
/// Anything that is neither hawkish nor dovish counts as neutral.
pub fn summarize_sentiment(events: &[SentimentEvent], country: Option<&str>) -> SentimentSummary {
    let kept = filter_country(events, country);
    let unexpected: BTreeSet<&str> = kept
        .iter()
        .map(|e| e.label.as_str())
        .filter(|label| !KNOWN_LABELS.contains(label))
        .collect();
    if !unexpected.is_empty() {
        warn!(labels = ?unexpected, "unexpected sentiment labels found");
    }

    let total = kept.len();
    let hawkish = kept.iter().filter(|e| e.label == HAWKISH).count();
    let dovish = kept.iter().filter(|e| e.label == DOVISH).count();
    if hawkish == 0 {
        warn!("no '{HAWKISH}' sentiment labels found");
    }
    if dovish == 0 {
        warn!("no '{DOVISH}' sentiment labels found");
    }
    info!(hawkish, dovish, total, "sentiment distribution");

    SentimentSummary {
        hawkish,
        dovish,
        neutral: total - hawkish - dovish,
        total,
    }
}
