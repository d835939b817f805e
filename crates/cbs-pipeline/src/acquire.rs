// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::table::{parse_cell, parse_date, read_panel_file, write_panel_file};
use cbs_core::{AnalysisConfig, CbsError, Panel, SeriesSpec, TimeSeries};
use cbs_preprocess::{AlignConfig, Aligner, FillPolicy, JoinHow};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const FRED_BASE_URL: &str = "https://api.stlouisfed.org/fred/series/observations";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Supplier of the raw macro panel.
pub trait MacroSource {
    /// Short human-readable origin, used in logs.
    fn describe(&self) -> String;

    fn load(&self, config: &AnalysisConfig) -> Result<Panel, CbsError>;
}

/// An already-built panel, served as is.
impl MacroSource for Panel {
    fn describe(&self) -> String {
        format!("in-memory panel ({} rows, {} columns)", self.n_rows(), self.n_cols())
    }

    fn load(&self, _config: &AnalysisConfig) -> Result<Panel, CbsError> {
        Ok(self.clone())
    }
}

/// Outer monthly merge with forward fill, used for slow-moving indicators.
pub fn merge_monthly(series: &[TimeSeries]) -> Result<Panel, CbsError> {
    Aligner::new(AlignConfig {
        how: JoinHow::Outer,
        fill: FillPolicy::Forward,
        ..AlignConfig::default()
    })
    .align(series)
}

/// Cached tabular snapshot on disk.
#[derive(Clone, Debug)]
pub struct CsvSnapshotSource {
    path: PathBuf,
}

impl CsvSnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Overwrites the snapshot with `panel`.
    pub fn store(&self, panel: &Panel) -> Result<(), CbsError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                CbsError::io(format!("failed to create {}", parent.display()), e)
            })?;
        }
        write_panel_file(&self.path, panel)?;
        info!(path = %self.path.display(), rows = panel.n_rows(), "saved macro snapshot");
        Ok(())
    }
}

impl MacroSource for CsvSnapshotSource {
    fn describe(&self) -> String {
        format!("cached snapshot {}", self.path.display())
    }

    /// Rows without a recognised timestamp column are dated monthly from
    /// `config.start`.
    fn load(&self, config: &AnalysisConfig) -> Result<Panel, CbsError> {
        let panel = read_panel_file(&self.path, Some(config.start))?;
        if panel.is_empty() {
            return Err(CbsError::empty_input(format!(
                "macro snapshot {} has no data",
                self.path.display()
            )));
        }
        info!(
            path = %self.path.display(),
            rows = panel.n_rows(),
            columns = ?panel.column_names(),
            "loaded cached macro data"
        );
        Ok(panel)
    }
}

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    observations: Vec<Observation>,
}

#[derive(Debug, Deserialize)]
struct Observation {
    date: String,
    value: String,
}

/// Live FRED observations endpoint.
#[derive(Clone, Debug)]
pub struct FredSource {
    client: Client,
    api_key: String,
    base_url: String,
}

impl FredSource {
    pub fn new(api_key: impl Into<String>) -> Result<Self, CbsError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(CbsError::acquisition("FRED API key is empty"));
        }
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| CbsError::acquisition(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key,
            base_url: FRED_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetches one indicator over `[config.start, config.end]`.
    pub fn fetch_series(
        &self,
        spec: &SeriesSpec,
        config: &AnalysisConfig,
    ) -> Result<TimeSeries, CbsError> {
        let start = config.start.format("%Y-%m-%d").to_string();
        let end = config.end.format("%Y-%m-%d").to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("series_id", spec.id.as_str()),
                ("api_key", self.api_key.as_str()),
                ("file_type", "json"),
                ("observation_start", start.as_str()),
                ("observation_end", end.as_str()),
            ])
            .send()
            .map_err(|e| CbsError::acquisition(format!("request for {} failed: {e}", spec.id)))?;
        if !response.status().is_success() {
            return Err(CbsError::acquisition(format!(
                "request for {} failed with status {}",
                spec.id,
                response.status()
            )));
        }
        let body: ObservationsResponse = response.json().map_err(|e| {
            CbsError::acquisition(format!("malformed response for {}: {e}", spec.id))
        })?;
        observations_to_series(&spec.name, &body.observations)
    }
}

fn observations_to_series(name: &str, observations: &[Observation]) -> Result<TimeSeries, CbsError> {
    let parsed = observations
        .iter()
        .map(|o| Ok((parse_date(&o.date)?, parse_cell(&o.value)?)))
        .collect::<Result<Vec<_>, CbsError>>()?;
    TimeSeries::from_unsorted(name, parsed)
}

impl MacroSource for FredSource {
    fn describe(&self) -> String {
        format!("FRED ({})", self.base_url)
    }

    /// Fetches every configured indicator; individual failures are logged
    /// and skipped, but at least one must succeed.
    fn load(&self, config: &AnalysisConfig) -> Result<Panel, CbsError> {
        let mut fetched = Vec::with_capacity(config.macro_series.len());
        let mut failed = Vec::new();
        for spec in &config.macro_series {
            match self.fetch_series(spec, config) {
                Ok(series) => {
                    debug!(id = %spec.id, name = %spec.name, points = series.len(), "fetched series");
                    fetched.push(series);
                }
                Err(err) => {
                    warn!(id = %spec.id, name = %spec.name, error = %err, "failed to fetch series");
                    failed.push(spec.id.clone());
                }
            }
        }
        if fetched.is_empty() {
            return Err(CbsError::acquisition(format!(
                "failed to fetch any FRED series; failed: {failed:?}"
            )));
        }
        if !failed.is_empty() {
            warn!(missing = ?failed, "partially loaded macro data");
        }
        let panel = merge_monthly(&fetched)?;
        info!(rows = panel.n_rows(), columns = panel.n_cols(), "fetched macro data from FRED");
        Ok(panel)
    }
}

/// Serves the snapshot when allowed and present, otherwise fetches live
/// data and refreshes the snapshot.
pub struct CachedSource {
    snapshot: CsvSnapshotSource,
    live: Option<Box<dyn MacroSource>>,
    use_cached: bool,
}

impl CachedSource {
    pub fn new(
        snapshot: CsvSnapshotSource,
        live: Option<Box<dyn MacroSource>>,
        use_cached: bool,
    ) -> Self {
        Self {
            snapshot,
            live,
            use_cached,
        }
    }
}

impl MacroSource for CachedSource {
    fn describe(&self) -> String {
        match &self.live {
            Some(live) => format!("{} backed by {}", self.snapshot.describe(), live.describe()),
            None => self.snapshot.describe(),
        }
    }

    fn load(&self, config: &AnalysisConfig) -> Result<Panel, CbsError> {
        if self.use_cached && self.snapshot.exists() {
            return self.snapshot.load(config);
        }
        let Some(live) = &self.live else {
            return Err(CbsError::acquisition(format!(
                "no cached snapshot at {} and no live source configured",
                self.snapshot.path().display()
            )));
        };
        info!(source = %live.describe(), "fetching live macro data");
        let panel = live.load(config)?;
        self.snapshot.store(&panel)?;
        Ok(panel)
    }
}
