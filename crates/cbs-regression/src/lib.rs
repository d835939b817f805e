// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod analysis;
pub mod engine;
pub mod summary;

pub use analysis::{RollingAnalysis, merge_and_difference, rolling_analysis};
pub use engine::{FactorRegression, RegressionConfig, RollingRegression, RollingStats};
pub use summary::{
    BootstrapCi, CorrelationMatrix, CorrelationTest, autocorrelations, bootstrap_correlation_ci,
    correlation_matrix, correlation_t_test,
};

pub fn crate_name() -> &'static str {
    let _ = cbs_core::crate_name();
    "cbs-regression"
}
