// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level pipeline stages, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    LoadMacro,
    Standardize,
    Pca,
    Breakpoints,
    Sentiment,
    Regression,
    Persist,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Self::LoadMacro => "load macro data",
            Self::Standardize => "rolling standardization",
            Self::Pca => "pca",
            Self::Breakpoints => "breakpoint detection",
            Self::Sentiment => "sentiment aggregation",
            Self::Regression => "rolling regression",
            Self::Persist => "persist artifacts",
        }
    }

    /// Whether a failure in this stage aborts the run.
    pub fn is_fatal(self) -> bool {
        !matches!(self, Self::Breakpoints)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result classification for one stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum StageOutcome {
    Ok,
    /// The stage failed but the run continued without its output.
    Degraded(String),
    Failed(String),
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("ok"),
            Self::Degraded(msg) => write!(f, "degraded: {msg}"),
            Self::Failed(msg) => write!(f, "failed: {msg}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    pub outcome: StageOutcome,
}

impl fmt::Display for StageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stage, self.outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::{Stage, StageOutcome, StageReport};

    #[test]
    fn only_breakpoint_stage_is_non_fatal() {
        let non_fatal: Vec<Stage> = [
            Stage::LoadMacro,
            Stage::Standardize,
            Stage::Pca,
            Stage::Breakpoints,
            Stage::Sentiment,
            Stage::Regression,
            Stage::Persist,
        ]
        .into_iter()
        .filter(|s| !s.is_fatal())
        .collect();
        assert_eq!(non_fatal, vec![Stage::Breakpoints]);
    }

    #[test]
    fn report_renders_stage_and_outcome() {
        let report = StageReport {
            stage: Stage::Breakpoints,
            outcome: StageOutcome::Degraded("series too short".to_string()),
        };
        assert_eq!(
            report.to_string(),
            "breakpoint detection: degraded: series too short"
        );
    }
}
