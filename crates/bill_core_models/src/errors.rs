//! Model-level error types

use thiserror::Error;

/// Errors raised while constructing or validating model types
#[derive(Debug, Error)]
pub enum ModelError {
    /// Amount failed validation (negative, non-finite)
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// A financial invariant did not hold
    #[error("Financial invariant violated: {0}")]
    InvariantViolation(String),

    /// Required field missing or empty
    #[error("Missing required data: {0}")]
    MissingData(String),
}

/// Result type for model operations
pub type ModelResult<T> = Result<T, ModelError>;
