//! Numeric validators

use crate::errors::{ValidationError, ValidationResult};

/// Validate that a numeric value is within a range (inclusive)
pub fn between<T>(field: &str, value: T, min: T, max: T) -> ValidationResult<()>
where
    T: PartialOrd + std::fmt::Display,
{
    // Written so that NaN fails the check
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange(format!(
            "{} must be between {} and {}, got {}",
            field, min, max, value
        )))
    }
}
