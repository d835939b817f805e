// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::acquire::{MacroSource, merge_monthly};
use crate::events::EventSource;
use crate::persist::persist;
use cbs_breaks::{CostModel, PeltConfig, RegimePeriod, Segmentation, detect_multiple, regime_periods};
use cbs_core::{
    AnalysisConfig, CbsError, Frequency, Panel, Stage, StageOutcome, StageReport, TimeIndex,
};
use cbs_pca::{Pca, PcaResult};
use cbs_preprocess::{
    RollingStandardizer, RollingWindow, SentimentAggregator, SentimentConfig, SentimentSummary,
    TOTAL, summarize_sentiment,
};
use cbs_regression::{
    BootstrapCi, CorrelationMatrix, CorrelationTest, RegressionConfig, RollingAnalysis,
    RollingRegression, autocorrelations, bootstrap_correlation_ci, correlation_matrix,
    correlation_t_test, merge_and_difference, rolling_analysis,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};

const BOOTSTRAP_CONFIDENCE: f64 = 0.95;

/// A fatal stage error together with every stage outcome recorded so far.
#[derive(Debug, Error)]
#[error("stage {stage} failed: {source}")]
pub struct PipelineFailure {
    pub stage: Stage,
    #[source]
    pub source: CbsError,
    /// Ends with the failed stage.
    pub stages: Vec<StageReport>,
}

/// Everything the run produced, ready for [`persist`].
#[derive(Clone, Debug)]
pub struct Artifacts {
    /// Standardized macro panel.
    pub processed_macro: Panel,
    pub pca: PcaResult,
    /// Retained components under their index names.
    pub indices: Panel,
    /// Keyed by index name; empty when detection degraded.
    pub breakpoints: BTreeMap<String, Segmentation>,
    pub regimes: BTreeMap<String, Vec<RegimePeriod>>,
    pub sentiment: Panel,
    /// Indices and sentiment factors after merging and differencing.
    pub merged_differenced: Panel,
    pub rolling: Vec<RollingAnalysis>,
    pub correlation: CorrelationMatrix,
}

/// Contemporaneous correlation of one differenced index with one factor.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FactorCorrelation {
    pub index: String,
    pub factor: String,
    pub correlation: Option<f64>,
    pub bootstrap: Option<BootstrapCi>,
    pub t_test: Option<CorrelationTest>,
}

/// The fixed end-of-run report.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Summary {
    pub variance_threshold: f64,
    /// Components needed to reach `variance_threshold`.
    pub components_for_threshold: usize,
    pub retained_components: usize,
    /// Cumulative explained-variance ratio of the retained components.
    pub cumulative_variance: f64,
    /// In index order.
    pub breakpoint_counts: Vec<(String, usize)>,
    pub correlations: Vec<FactorCorrelation>,
    pub sentiment: SentimentSummary,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "PCA: {} components explain {:.1}% of variance; {} retained ({:.2}% cumulative)",
            self.components_for_threshold,
            self.variance_threshold * 100.0,
            self.retained_components,
            self.cumulative_variance * 100.0
        )?;
        writeln!(f, "Breakpoints:")?;
        for (index, count) in &self.breakpoint_counts {
            writeln!(f, "  {index}: {count}")?;
        }
        writeln!(f, "Sentiment events:")?;
        for (label, count, pct) in self.sentiment.rows() {
            writeln!(f, "  {label:<8} {count:>6} {pct:>6.1}%")?;
        }
        writeln!(f, "Correlations (first differences):")?;
        for c in &self.correlations {
            let Some(r) = c.correlation else {
                writeln!(f, "  {} vs {}: undefined", c.index, c.factor)?;
                continue;
            };
            write!(f, "  {} vs {}: {r:.4}", c.index, c.factor)?;
            if let Some(ci) = &c.bootstrap {
                write!(
                    f,
                    " [{:.0}% CI {:.4}, {:.4}]",
                    BOOTSTRAP_CONFIDENCE * 100.0,
                    ci.lower,
                    ci.upper
                )?;
            }
            if let Some(test) = &c.t_test {
                write!(f, " p={:.4}", test.p_value)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Outcome of a successful run.
#[derive(Clone, Debug)]
pub struct PipelineRun {
    pub artifacts: Artifacts,
    pub summary: Summary,
    pub stages: Vec<StageReport>,
    /// Files written by [`Pipeline::execute`]; empty after [`Pipeline::run`].
    pub written: Vec<PathBuf>,
}

#[derive(Default)]
struct StageLog {
    reports: Vec<StageReport>,
}

impl StageLog {
    fn push(&mut self, stage: Stage, outcome: StageOutcome) {
        self.reports.push(StageReport { stage, outcome });
    }

    fn fatal<T>(&mut self, stage: Stage, result: Result<T, CbsError>) -> Result<T, PipelineFailure> {
        match result {
            Ok(value) => {
                self.push(stage, StageOutcome::Ok);
                Ok(value)
            }
            Err(source) => {
                error!(stage = %stage, error = %source, "stage failed");
                self.push(stage, StageOutcome::Failed(source.to_string()));
                Err(PipelineFailure {
                    stage,
                    source,
                    stages: self.reports.clone(),
                })
            }
        }
    }
}

type Breaks = (
    BTreeMap<String, Segmentation>,
    BTreeMap<String, Vec<RegimePeriod>>,
);

struct Regression {
    rolling: Vec<RollingAnalysis>,
    merged: Panel,
    correlation: CorrelationMatrix,
    correlations: Vec<FactorCorrelation>,
}

/// Runs every stage in order against one configuration.
#[derive(Clone, Debug)]
pub struct Pipeline {
    config: AnalysisConfig,
}

impl Pipeline {
    pub fn new(config: AnalysisConfig) -> Result<Self, CbsError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Computes every artifact without touching the filesystem.
    ///
    /// Breakpoint detection failures degrade the run; any other stage
    /// failure aborts it.
    pub fn run(
        &self,
        macro_source: &dyn MacroSource,
        events: &dyn EventSource,
    ) -> Result<PipelineRun, PipelineFailure> {
        let mut log = StageLog::default();

        let macro_panel = log.fatal(Stage::LoadMacro, self.load_macro(macro_source))?;
        let processed = log.fatal(Stage::Standardize, self.standardize(&macro_panel))?;
        let (pca, indices, components_for_threshold) =
            log.fatal(Stage::Pca, self.reduce(&processed))?;

        let (breakpoints, regimes) = match self.detect_breaks(&indices) {
            Ok(found) => {
                log.push(Stage::Breakpoints, StageOutcome::Ok);
                found
            }
            Err(err) => {
                warn!(error = %err, "breakpoint detection failed; continuing without breakpoints");
                log.push(Stage::Breakpoints, StageOutcome::Degraded(err.to_string()));
                (BTreeMap::new(), BTreeMap::new())
            }
        };

        let (sentiment, sentiment_summary) =
            log.fatal(Stage::Sentiment, self.aggregate_sentiment(events))?;
        let regression = log.fatal(Stage::Regression, self.regress(&indices, &sentiment))?;

        let retained = indices.n_cols();
        let summary = Summary {
            variance_threshold: self.config.variance_threshold,
            components_for_threshold,
            retained_components: retained,
            cumulative_variance: retained
                .checked_sub(1)
                .and_then(|k| pca.cumulative_variance_ratio().get(k).copied())
                .unwrap_or(0.0),
            breakpoint_counts: indices
                .column_names()
                .into_iter()
                .map(|name| {
                    let count = breakpoints.get(name).map_or(0, Segmentation::n_breaks);
                    (name.to_string(), count)
                })
                .collect(),
            correlations: regression.correlations,
            sentiment: sentiment_summary,
        };
        info!(
            components = summary.components_for_threshold,
            retained = summary.retained_components,
            "analysis complete"
        );

        Ok(PipelineRun {
            artifacts: Artifacts {
                processed_macro: processed,
                pca,
                indices,
                breakpoints,
                regimes,
                sentiment,
                merged_differenced: regression.merged,
                rolling: regression.rolling,
                correlation: regression.correlation,
            },
            summary,
            stages: log.reports,
            written: Vec::new(),
        })
    }

    /// [`Pipeline::run`] followed by a single [`persist`] into `out_dir`.
    pub fn execute(
        &self,
        macro_source: &dyn MacroSource,
        events: &dyn EventSource,
        out_dir: &Path,
    ) -> Result<PipelineRun, PipelineFailure> {
        let mut run = self.run(macro_source, events)?;
        let mut log = StageLog {
            reports: std::mem::take(&mut run.stages),
        };
        run.written = log.fatal(Stage::Persist, persist(&run.artifacts, out_dir))?;
        run.stages = log.reports;
        Ok(run)
    }

    /// Aligns the raw panel monthly and keeps `[start, end]`.
    fn load_macro(&self, source: &dyn MacroSource) -> Result<Panel, CbsError> {
        info!(source = %source.describe(), "loading macro data");
        let raw = source.load(&self.config)?;
        if raw.is_empty() {
            return Err(CbsError::empty_input("macro source returned no data"));
        }
        let series = raw
            .column_names()
            .into_iter()
            .map(|name| raw.series(name))
            .collect::<Result<Vec<_>, _>>()?;
        let aligned = merge_monthly(&series)?;
        let first = Frequency::MonthStart.bucket(self.config.start);
        let in_range: Vec<_> = aligned
            .index()
            .iter()
            .copied()
            .filter(|d| *d >= first && *d <= self.config.end)
            .collect();
        let panel = aligned.restrict_to(&in_range);
        if panel.n_rows() == 0 {
            return Err(CbsError::empty_input(format!(
                "no macro observations between {} and {}",
                self.config.start, self.config.end
            )));
        }
        info!(
            rows = panel.n_rows(),
            columns = ?panel.column_names(),
            "macro data ready"
        );
        Ok(panel)
    }

    fn standardize(&self, panel: &Panel) -> Result<Panel, CbsError> {
        RollingStandardizer::new(
            self.config.standardize_window,
            self.config.standardize_min_periods,
        )?
        .standardize(panel)
    }

    /// Fits every component and keeps at least `min_retained_components`.
    fn reduce(&self, processed: &Panel) -> Result<(PcaResult, Panel, usize), CbsError> {
        let pca = Pca::new(None)?.fit(processed)?;
        let needed = pca.n_components_for_threshold(self.config.variance_threshold)?;
        let retained = needed
            .max(self.config.min_retained_components)
            .min(pca.n_components());
        let names: Vec<String> = (0..retained).map(|k| self.config.index_name(k)).collect();
        let indices = pca.named_components(&names)?;
        info!(
            threshold = self.config.variance_threshold,
            needed,
            retained,
            ratios = ?pca.explained_variance_ratio,
            "principal components fitted"
        );
        Ok((pca, indices, needed))
    }

    fn detect_breaks(&self, indices: &Panel) -> Result<Breaks, CbsError> {
        let config = PeltConfig {
            penalty: self.config.breakpoint_penalty,
            cost: CostModel::from(self.config.breakpoint_cost),
            min_segment_len: self.config.min_segment_len,
            jump: self.config.breakpoint_jump,
        };
        let series = indices
            .column_names()
            .into_iter()
            .map(|name| indices.series(name))
            .collect::<Result<Vec<_>, _>>()?;
        let breakpoints = detect_multiple(&series, &config)?;

        let mut regimes = BTreeMap::new();
        for s in &series {
            let Some(found) = breakpoints.get(s.name()) else {
                continue;
            };
            info!(
                index = s.name(),
                breaks = found.n_breaks(),
                dates = ?found.dates,
                "breakpoints detected"
            );
            let periods = regime_periods(
                &s.to_f64_lossy(),
                TimeIndex::Dates(s.index()),
                &found.breakpoints,
            )?;
            regimes.insert(s.name().to_string(), periods);
        }
        Ok((breakpoints, regimes))
    }

    fn aggregate_sentiment(
        &self,
        events: &dyn EventSource,
    ) -> Result<(Panel, SentimentSummary), CbsError> {
        info!(source = %events.describe(), "loading sentiment events");
        let events = events.load_events()?;
        let country = self.config.country_code.as_deref();
        let summary = summarize_sentiment(&events, country);
        info!(
            hawkish = summary.hawkish,
            dovish = summary.dovish,
            neutral = summary.neutral,
            total = summary.total,
            "sentiment distribution"
        );
        let aggregator = SentimentAggregator::new(SentimentConfig {
            start: self.config.start,
            end: self.config.end,
            shift_periods: self.config.sentiment_shift,
            window: Some(RollingWindow::new(
                self.config.standardize_window,
                self.config.standardize_min_periods,
            )?),
            country: self.config.country_code.clone(),
        })?;
        let totals = aggregator.monthly_totals(&events)?;
        let busiest = totals.column(TOTAL)?.iter().flatten().fold(0.0, |a: f64, b| a.max(*b));
        debug!(months = totals.n_rows(), busiest, "monthly event totals");
        Ok((aggregator.aggregate(&events)?, summary))
    }

    fn regress(&self, indices: &Panel, sentiment: &Panel) -> Result<Regression, CbsError> {
        let engine = RollingRegression::new(RegressionConfig::rolling(self.config.regression_window))?;
        let rolling = indices
            .column_names()
            .into_iter()
            .map(|name| rolling_analysis(&indices.series(name)?, sentiment, &engine))
            .collect::<Result<Vec<_>, _>>()?;

        let merged = merge_and_difference(&[indices, sentiment])?;
        for (column, value) in autocorrelations(&merged, 1) {
            info!(column = %column, autocorrelation = ?value, "lag-1 autocorrelation");
        }
        let correlation = correlation_matrix(&merged)?;

        let mut correlations = Vec::new();
        for index in indices.column_names() {
            let x = merged.column(index)?;
            for factor in sentiment.column_names() {
                let y = merged.column(factor)?;
                let bootstrap = if self.config.bootstrap_samples == 0 {
                    None
                } else {
                    bootstrap_correlation_ci(
                        x,
                        y,
                        self.config.bootstrap_samples,
                        BOOTSTRAP_CONFIDENCE,
                        self.config.random_seed,
                    )?
                };
                correlations.push(FactorCorrelation {
                    index: index.to_string(),
                    factor: factor.to_string(),
                    correlation: correlation.get(index, factor),
                    bootstrap,
                    t_test: correlation_t_test(x, y),
                });
            }
        }
        Ok(Regression {
            rolling,
            merged,
            correlation,
            correlations,
        })
    }
}
