// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod acquire;
pub mod events;
pub mod orchestrator;
pub mod persist;
pub mod table;

pub use acquire::{CachedSource, CsvSnapshotSource, FredSource, MacroSource, merge_monthly};
pub use events::{CsvEventSource, EventSource, read_events};
pub use orchestrator::{
    Artifacts, FactorCorrelation, Pipeline, PipelineFailure, PipelineRun, Summary,
};
pub use persist::persist;
pub use table::{read_panel, read_panel_file, write_panel, write_panel_file};

pub fn crate_name() -> &'static str {
    let _ = cbs_core::crate_name();
    "cbs-pipeline"
}
