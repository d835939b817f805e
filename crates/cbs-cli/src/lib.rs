// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use cbs_core::{AnalysisConfig, CbsError, CostKind};
use cbs_pipeline::{CachedSource, CsvSnapshotSource, FredSource, MacroSource};
use std::fs;
use std::path::Path;

/// Command-line values that take precedence over the configuration file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConfigOverrides {
    pub standardize_window: Option<usize>,
    pub regression_window: Option<usize>,
    pub penalty: Option<f64>,
    pub variance_threshold: Option<f64>,
    pub cost: Option<CostKind>,
}

impl ConfigOverrides {
    pub fn apply(&self, mut config: AnalysisConfig) -> AnalysisConfig {
        if let Some(window) = self.standardize_window {
            config.standardize_window = window;
        }
        if let Some(window) = self.regression_window {
            config.regression_window = window;
        }
        if let Some(penalty) = self.penalty {
            config.breakpoint_penalty = penalty;
        }
        if let Some(threshold) = self.variance_threshold {
            config.variance_threshold = threshold;
        }
        if let Some(cost) = self.cost {
            config.breakpoint_cost = cost;
        }
        config
    }
}

/// Reads a JSON configuration; absent fields keep their defaults.
pub fn load_config(path: Option<&Path>) -> Result<AnalysisConfig, CbsError> {
    let Some(path) = path else {
        return Ok(AnalysisConfig::default());
    };
    let raw = fs::read_to_string(path)
        .map_err(|e| CbsError::io(format!("failed to read config {}", path.display()), e))?;
    serde_json::from_str(&raw)
        .map_err(|e| CbsError::invalid_input(format!("invalid config {}: {e}", path.display())))
}

/// File configuration with overrides applied, validated once.
pub fn resolve_config(
    path: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<AnalysisConfig, CbsError> {
    let config = overrides.apply(load_config(path)?);
    config.validate()?;
    Ok(config)
}

/// Cached snapshot at `snapshot`, refreshed from FRED when a key is given.
pub fn macro_source(
    snapshot: &Path,
    use_cached: bool,
    fred_api_key: Option<String>,
) -> Result<CachedSource, CbsError> {
    let live = fred_api_key
        .map(FredSource::new)
        .transpose()?
        .map(|source| Box::new(source) as Box<dyn MacroSource>);
    Ok(CachedSource::new(
        CsvSnapshotSource::new(snapshot),
        live,
        use_cached,
    ))
}

pub fn crate_name() -> &'static str {
    let _ = (cbs_core::crate_name(), cbs_pipeline::crate_name());
    "cbs-cli"
}
