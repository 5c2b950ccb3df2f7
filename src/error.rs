use std::fmt;

use thiserror::Error;

use crate::data::loader::SourceFormat;

/// Failures the user can act on. Everything else is plumbing and travels as
/// `anyhow::Error`.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("{0}")]
    Parse(#[from] ParseFailure),

    #[error("the selected filters leave no rows to summarise")]
    EmptyResult,

    #[error("column '{0}' not found")]
    UnknownColumn(String),

    #[error("column '{0}' has no numeric values")]
    NotNumeric(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// One failed loader attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptFailure {
    pub format: SourceFormat,
    pub message: String,
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failed to load as {}: {}", self.format, self.message)
    }
}

/// Every attempted format failed; one message per attempt, in attempt order.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseFailure {
    pub attempts: Vec<AttemptFailure>,
}

impl ParseFailure {
    /// Messages ready to show, one per attempt.
    pub fn messages(&self) -> Vec<String> {
        self.attempts.iter().map(ToString::to_string).collect()
    }
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.messages().join("; "))
    }
}

impl std::error::Error for ParseFailure {}

pub type Result<T, E = DashboardError> = std::result::Result<T, E>;
