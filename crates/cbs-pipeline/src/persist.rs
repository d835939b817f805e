// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::orchestrator::Artifacts;
use crate::table::{format_cell, format_date, write_panel_file};
use cbs_breaks::{BreakpointSummary, RegimePeriod};
use cbs_core::CbsError;
use cbs_pca::PcaResult;
use cbs_regression::CorrelationMatrix;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::info;

pub const PROCESSED_MACRO: &str = "processed_macro.csv";
pub const PCA_COMPONENTS: &str = "pca_components.csv";
pub const PCA_LOADINGS: &str = "pca_loadings.csv";
pub const PCA_VARIANCE: &str = "pca_variance.csv";
pub const BREAKPOINTS: &str = "breakpoints.json";
pub const SENTIMENT_AGGREGATED: &str = "sentiment_aggregated.csv";
pub const MERGED_DIFFERENCED: &str = "merged_differenced.csv";
pub const CORRELATION_MATRIX: &str = "correlation_matrix.csv";

/// Lowercase file-name fragment for an index name: `Macro Index` -> `macro_index`.
pub fn file_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_matches('_').to_string()
}

pub fn regimes_file(index: &str) -> String {
    format!("regimes_{}.csv", file_slug(index))
}

pub fn rolling_results_file(index: &str) -> String {
    format!("rolling_results_{}.csv", file_slug(index))
}

/// Writes every artifact into `dir`, overwriting previous runs.
///
/// Returns the written paths in write order.
pub fn persist(artifacts: &Artifacts, dir: &Path) -> Result<Vec<PathBuf>, CbsError> {
    fs::create_dir_all(dir)
        .map_err(|e| CbsError::io(format!("failed to create {}", dir.display()), e))?;
    let mut written = Vec::new();
    let mut record = |path: PathBuf| {
        info!(path = %path.display(), "saved artifact");
        written.push(path);
    };

    let path = dir.join(PROCESSED_MACRO);
    write_panel_file(&path, &artifacts.processed_macro)?;
    record(path);

    let path = dir.join(PCA_COMPONENTS);
    write_panel_file(&path, &artifacts.pca.scores)?;
    record(path);

    let path = dir.join(PCA_LOADINGS);
    write_loadings(&path, &artifacts.pca)?;
    record(path);

    let path = dir.join(PCA_VARIANCE);
    write_variance(&path, &artifacts.pca)?;
    record(path);

    let path = dir.join(BREAKPOINTS);
    let summaries: BTreeMap<String, BreakpointSummary> = artifacts
        .breakpoints
        .iter()
        .map(|(name, segmentation)| (file_slug(name), BreakpointSummary::from(segmentation)))
        .collect();
    let mut json = serde_json::to_string_pretty(&summaries)
        .map_err(|e| CbsError::io("failed to encode breakpoints", e))?;
    json.push('\n');
    fs::write(&path, json)
        .map_err(|e| CbsError::io(format!("failed to write {}", path.display()), e))?;
    record(path);

    for (name, periods) in &artifacts.regimes {
        let path = dir.join(regimes_file(name));
        write_regimes(&path, periods)?;
        record(path);
    }

    let path = dir.join(SENTIMENT_AGGREGATED);
    write_panel_file(&path, &artifacts.sentiment)?;
    record(path);

    let path = dir.join(MERGED_DIFFERENCED);
    write_panel_file(&path, &artifacts.merged_differenced)?;
    record(path);

    for analysis in &artifacts.rolling {
        let path = dir.join(rolling_results_file(&analysis.index_name));
        write_panel_file(&path, &analysis.results_table()?)?;
        record(path);
    }

    let path = dir.join(CORRELATION_MATRIX);
    write_correlation(&path, &artifacts.correlation)?;
    record(path);

    Ok(written)
}

fn write_rows(path: &Path, header: Vec<String>, rows: Vec<Vec<String>>) -> Result<(), CbsError> {
    let file = File::create(path)
        .map_err(|e| CbsError::io(format!("failed to create {}", path.display()), e))?;
    let mut out = csv::Writer::from_writer(file);
    let context = || format!("failed to write {}", path.display());
    out.write_record(&header).map_err(|e| CbsError::io(context(), e))?;
    for row in rows {
        out.write_record(&row).map_err(|e| CbsError::io(context(), e))?;
    }
    out.flush().map_err(|e| CbsError::io(context(), e))
}

/// Component by feature weights in percent, plus explained variance.
fn write_loadings(path: &Path, pca: &PcaResult) -> Result<(), CbsError> {
    let mut header = vec!["component".to_string()];
    header.extend(pca.feature_names.iter().cloned());
    header.push("Explained Variance".to_string());
    let rows = pca
        .loadings_table()
        .into_iter()
        .map(|row| {
            let mut cells = vec![row.component];
            cells.extend(row.weights.iter().map(|w| format_cell(Some(*w))));
            cells.push(format_cell(Some(row.explained_variance)));
            cells
        })
        .collect();
    write_rows(path, header, rows)
}

fn write_variance(path: &Path, pca: &PcaResult) -> Result<(), CbsError> {
    let header = ["component", "variance_explained", "cumulative_variance"]
        .map(str::to_string)
        .to_vec();
    let rows = pca
        .variance_table()
        .into_iter()
        .map(|row| {
            vec![
                row.component,
                format_cell(Some(row.variance_explained)),
                format_cell(Some(row.cumulative_variance)),
            ]
        })
        .collect();
    write_rows(path, header, rows)
}

fn write_regimes(path: &Path, periods: &[RegimePeriod]) -> Result<(), CbsError> {
    let header = [
        "regime",
        "start",
        "end",
        "start_date",
        "end_date",
        "duration",
        "mean",
        "std",
    ]
    .map(str::to_string)
    .to_vec();
    let rows = periods
        .iter()
        .map(|p| {
            vec![
                p.regime.to_string(),
                p.start.to_string(),
                p.end.to_string(),
                p.start_date.map(format_date).unwrap_or_default(),
                p.end_date.map(format_date).unwrap_or_default(),
                p.duration.to_string(),
                format_cell(Some(p.mean)),
                format_cell(p.std),
            ]
        })
        .collect();
    write_rows(path, header, rows)
}

fn write_correlation(path: &Path, matrix: &CorrelationMatrix) -> Result<(), CbsError> {
    let mut header = vec![String::new()];
    header.extend(matrix.names.iter().cloned());
    let rows = matrix
        .names
        .iter()
        .zip(&matrix.values)
        .map(|(name, values)| {
            let mut cells = vec![name.clone()];
            cells.extend(values.iter().map(|v| format_cell(*v)));
            cells
        })
        .collect();
    write_rows(path, header, rows)
}
