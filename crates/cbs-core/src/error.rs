// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error taxonomy shared by every stage of the analysis.
#[derive(Debug, Error)]
pub enum CbsError {
    /// An operation received zero rows.
    #[error("empty input: {0}")]
    EmptyInput(String),
    /// Non-positive or otherwise nonsensical window parameter.
    #[error("invalid window: {0}")]
    InvalidWindow(String),
    /// Timestamp axis violates monotonicity or uniqueness.
    #[error("misaligned input: {0}")]
    MisalignedInput(String),
    /// External data source unreachable or returned nothing usable.
    #[error("acquisition failed: {0}")]
    Acquisition(String),
    /// A column the schema requires is absent.
    #[error("missing column: {0}")]
    MissingColumn(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("numerical issue: {0}")]
    NumericalIssue(String),
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: BoxedSource,
    },
}

impl CbsError {
    pub fn empty_input(msg: impl Into<String>) -> Self {
        Self::EmptyInput(msg.into())
    }

    pub fn invalid_window(msg: impl Into<String>) -> Self {
        Self::InvalidWindow(msg.into())
    }

    pub fn misaligned(msg: impl Into<String>) -> Self {
        Self::MisalignedInput(msg.into())
    }

    pub fn acquisition(msg: impl Into<String>) -> Self {
        Self::Acquisition(msg.into())
    }

    pub fn missing_column(msg: impl Into<String>) -> Self {
        Self::MissingColumn(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn numerical_issue(msg: impl Into<String>) -> Self {
        Self::NumericalIssue(msg.into())
    }

    pub fn io(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Io {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Stable machine-readable code for the variant.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyInput(_) => "empty_input",
            Self::InvalidWindow(_) => "invalid_window",
            Self::MisalignedInput(_) => "misaligned_input",
            Self::Acquisition(_) => "acquisition",
            Self::MissingColumn(_) => "missing_column",
            Self::InvalidInput(_) => "invalid_input",
            Self::NumericalIssue(_) => "numerical_issue",
            Self::Io { .. } => "io_error",
        }
    }
}
