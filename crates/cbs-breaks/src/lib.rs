// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod cost;
pub mod multi;
pub mod pelt;
pub mod regimes;

pub use cost::{CostCache, CostModel};
pub use multi::{BreakpointSummary, detect_multiple};
pub use pelt::{Pelt, PeltConfig, Segmentation};
pub use regimes::{RegimePeriod, regime_periods};

pub fn crate_name() -> &'static str {
    let _ = cbs_core::crate_name();
    "cbs-breaks"
}
