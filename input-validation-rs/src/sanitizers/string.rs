//! String sanitization utilities

use super::SanitizeResult;
use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    // Keeps tab, newline and carriage return
    static ref CONTROL_CHARS_REGEX: Regex = Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]").unwrap();
    static ref ZERO_WIDTH_REGEX: Regex = Regex::new(r"[\u{200B}-\u{200D}\u{2060}\u{FEFF}]").unwrap();
}

/// Remove control characters from a string
pub fn remove_control_chars(input: &str) -> SanitizeResult<String> {
    let sanitized = CONTROL_CHARS_REGEX.replace_all(input, "");
    if sanitized == input {
        SanitizeResult::unmodified(input.to_string())
    } else {
        SanitizeResult::modified(sanitized.into_owned(), Some("Removed control characters".to_string()))
    }
}

/// Remove zero-width characters often used to split trigger words
pub fn remove_zero_width(input: &str) -> SanitizeResult<String> {
    let sanitized = ZERO_WIDTH_REGEX.replace_all(input, "");
    if sanitized == input {
        SanitizeResult::unmodified(input.to_string())
    } else {
        SanitizeResult::modified(sanitized.into_owned(), Some("Removed zero-width characters".to_string()))
    }
}

/// Normalize Unicode text (NFC form)
pub fn normalize_unicode(input: &str) -> SanitizeResult<String> {
    let normalized = input.nfc().collect::<String>();
    if normalized == input {
        SanitizeResult::unmodified(input.to_string())
    } else {
        SanitizeResult::modified(normalized, Some("Normalized Unicode characters".to_string()))
    }
}

/// Trim whitespace from beginning and end
pub fn trim_whitespace(input: &str) -> SanitizeResult<String> {
    let trimmed = input.trim();
    if trimmed == input {
        SanitizeResult::unmodified(input.to_string())
    } else {
        SanitizeResult::modified(trimmed.to_string(), Some("Trimmed whitespace".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_control_chars_keeps_newlines() {
        let result = remove_control_chars("line one\nline\u{0000} two\t!");
        assert!(result.was_modified);
        assert_eq!(result.sanitized, "line one\nline two\t!");
    }

    #[test]
    fn test_remove_zero_width() {
        let result = remove_zero_width("ig\u{200B}nore");
        assert_eq!(result.sanitized, "ignore");
        assert!(!remove_zero_width("ignore").was_modified);
    }

    #[test]
    fn test_normalize_unicode() {
        let result = normalize_unicode("cafe\u{0301}");
        assert!(result.was_modified);
        assert_eq!(result.sanitized, "caf\u{00e9}");
    }
}
