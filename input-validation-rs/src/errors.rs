//! Error handling for the validation library
//!
//! Every validator reports a [`ValidationError`] naming the offending field.
//! Several failures on one request are collected into a composite error.

use std::fmt;
use thiserror::Error;

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Enum representing different validation error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Input is too long (e.g., string, array)
    #[error("Input exceeds maximum length: {0}")]
    TooLong(String),

    /// Input is too short or empty
    #[error("Input is shorter than minimum length: {0}")]
    TooShort(String),

    /// Input is outside numeric range
    #[error("Value is outside allowed range: {0}")]
    OutOfRange(String),

    /// Input validation failed for regex pattern
    #[error("Pattern match failed: {0}")]
    PatternMismatch(String),

    /// Composite validation error (multiple errors)
    #[error("{0}")]
    Composite(CompositeError),
}

/// Container for multiple validation errors
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeError {
    pub errors: Vec<ValidationError>,
}

impl fmt::Display for CompositeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation errors: ", self.errors.len())?;
        for (idx, err) in self.errors.iter().enumerate() {
            if idx > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl ValidationError {
    /// Collapses a list of errors: `None` when empty, the error itself when
    /// there is one, a composite otherwise
    pub fn collect<I>(errors: I) -> Option<Self>
    where
        I: IntoIterator<Item = ValidationError>,
    {
        let mut errors: Vec<ValidationError> = errors.into_iter().collect();
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(ValidationError::Composite(CompositeError { errors })),
        }
    }

    /// Flattened list of individual failures
    pub fn details(&self) -> Vec<String> {
        match self {
            ValidationError::Composite(composite) => composite.errors.iter().map(|e| e.to_string()).collect(),
            other => vec![other.to_string()],
        }
    }
}
