// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod eigen;
pub mod pca;

pub use eigen::{SymmetricEigen, symmetric_eigen};
pub use pca::{LoadingsRow, Pca, PcaResult, VarianceRow, component_name};

pub fn crate_name() -> &'static str {
    let _ = cbs_core::crate_name();
    "cbs-pca"
}
