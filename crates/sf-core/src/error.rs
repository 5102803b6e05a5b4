//! Core error types.
//!
//! Source and model failures never become errors here; those degrade to
//! fallbacks inside the engines. The only condition the core surfaces as
//! `Err` is missing required input.

use thiserror::Error;

/// Missing or unusable required input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Empty input: {0}")]
    EmptyInput(String),
}

/// Result type for operations that validate their input.
pub type ValidationResult<T> = Result<T, ValidationError>;
