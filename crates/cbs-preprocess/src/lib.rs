// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod align;
pub mod rolling;
pub mod sentiment;

pub use align::{AlignConfig, Aligner, FillPolicy, JoinHow};
pub use rolling::{
    RollingStandardizer, RollingWindow, difference_panel, first_difference, rolling_zscore,
};
pub use sentiment::{
    SentimentAggregator, SentimentConfig, SentimentEvent, SentimentSummary, TOTAL,
    summarize_sentiment,
};

pub fn crate_name() -> &'static str {
    let _ = cbs_core::crate_name();
    "cbs-preprocess"
}
