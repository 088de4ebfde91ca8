//! Error values flowing through graph construction and build.

/// Failure of a graph construction, build or compute step.
///
/// Validation errors are recoverable: the offending operator is dropped and
/// the caller gets poisoned handles to chain on. Internal errors denote a
/// broken invariant in this crate. Unimplemented is reserved for backend
/// capability gaps.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("invalid graph: {0}")]
    Validation(String),
    #[error("internal error: {0}")]
    Internal(String),
    #[error("unimplemented: {0}")]
    Unimplemented(String),
}

impl GraphError {
    pub fn is_validation(&self) -> bool {
        matches!(self, GraphError::Validation(_))
    }

    /// The message the error was raised with.
    pub fn message(&self) -> &str {
        match self {
            GraphError::Validation(m) | GraphError::Internal(m) | GraphError::Unimplemented(m) => m,
        }
    }
}

pub type GraphResult<T> = Result<T, GraphError>;
