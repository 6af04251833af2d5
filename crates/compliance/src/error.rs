//! Compliance error types.

use thiserror::Error;

/// Errors that can occur while reading compliance inputs.
///
/// Note that evaluation itself never fails: when buyer history or the FFL
/// lookup is unavailable the evaluator fails closed and returns a hold
/// verdict instead of an error.
#[derive(Debug, Error)]
pub enum ComplianceError {
    /// The buyer purchase history could not be read.
    #[error("buyer history unavailable: {0}")]
    HistoryUnavailable(String),

    /// The active compliance config could not be read.
    #[error("compliance config unavailable: {0}")]
    ConfigUnavailable(String),
}
