//! Error types for sylva orchestration.

use thiserror::Error;

/// Errors that can occur while loading inputs, invoking the solver, or
/// aggregating results.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in the future without breaking changes.
///
/// Fatal variants (`Config`, `Input`, `OracleUnavailable`, `EmptyMergeSet`,
/// `InvalidFoldCount`) abort the whole invocation; `Oracle` is recorded
/// per-run and never aborts a batch.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ForestError {
    /// Malformed or missing configuration parameter. Reported before any
    /// run starts.
    #[error("config error: {0}")]
    Config(String),

    /// Malformed prize or edge input (bad column count, weight out of
    /// range, duplicate edge).
    #[error("input error: {0}")]
    Input(String),

    /// The external solver could not be located or executed at all.
    /// Reported before any run is dispatched.
    #[error("oracle unavailable: {0}")]
    OracleUnavailable(String),

    /// A single solver invocation failed, timed out, or returned an
    /// unparsable/infeasible response. Recorded per-run.
    #[error("oracle error: {0}")]
    Oracle(String),

    /// Every run in a batch failed; there is nothing to merge.
    #[error("no results to merge")]
    EmptyMergeSet,

    /// Cross-validation fold count outside the usable range.
    #[error("invalid fold count: {0}")]
    InvalidFoldCount(String),

    /// Underlying file-system failure while reading inputs or writing
    /// artifacts.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal invariant violation (programmer error, not user error).
    #[error("internal error: {0}")]
    Internal(String),
}
