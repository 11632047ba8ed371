//! String validators

use regex::Regex;

use crate::errors::{ValidationError, ValidationResult};

/// Validate that a string is not empty after trimming
pub fn not_blank(field: &str, s: &str) -> ValidationResult<()> {
    if s.trim().is_empty() {
        Err(ValidationError::TooShort(format!("{} must not be empty", field)))
    } else {
        Ok(())
    }
}

/// Validate that a string has at most `max` characters
pub fn max_chars(field: &str, s: &str, max: usize) -> ValidationResult<()> {
    let count = s.chars().count();
    if count > max {
        Err(ValidationError::TooLong(format!(
            "{} has {} characters, maximum is {}",
            field, count, max
        )))
    } else {
        Ok(())
    }
}

/// Validate that a string matches a pattern
pub fn matches_pattern(field: &str, s: &str, pattern: &Regex) -> ValidationResult<()> {
    if pattern.is_match(s) {
        Ok(())
    } else {
        Err(ValidationError::PatternMismatch(format!(
            "{} does not match {}",
            field,
            pattern.as_str()
        )))
    }
}

/// Validate that a collection has at most `max` items
pub fn max_items<T>(field: &str, items: &[T], max: usize) -> ValidationResult<()> {
    if items.len() > max {
        Err(ValidationError::TooLong(format!(
            "{} has {} items, maximum is {}",
            field,
            items.len(),
            max
        )))
    } else {
        Ok(())
    }
}
