//! Input sanitization utilities
//!
//! String cleanup plus the prompt sanitizer that classifies command text by
//! risk before it is sent to an AI model.

pub mod prompt;
pub mod string;

pub use prompt::{PromptSanitizer, RiskLevel, SanitizedPrompt};
pub use string::*;

/// Sanitization result containing the sanitized content and information
/// about whether changes were made during sanitization
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizeResult<T> {
    pub sanitized: T,
    pub was_modified: bool,
    pub details: Option<String>,
}

impl<T> SanitizeResult<T> {
    /// Create a result with unmodified content
    pub fn unmodified(content: T) -> Self {
        Self {
            sanitized: content,
            was_modified: false,
            details: None,
        }
    }

    /// Create a result with modified content
    pub fn modified(content: T, details: Option<String>) -> Self {
        Self {
            sanitized: content,
            was_modified: true,
            details,
        }
    }
}

/// Runs string sanitizers in sequence, merging their details
pub fn chain_sanitizers(input: &str, sanitizers: &[fn(&str) -> SanitizeResult<String>]) -> SanitizeResult<String> {
    let mut result = SanitizeResult::unmodified(input.to_string());
    let mut all_details = Vec::new();

    for sanitizer in sanitizers {
        let step = sanitizer(&result.sanitized);
        result.sanitized = step.sanitized;
        if step.was_modified {
            result.was_modified = true;
            all_details.extend(step.details);
        }
    }

    if !all_details.is_empty() {
        result.details = Some(all_details.join("; "));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_sanitizers() {
        let result = chain_sanitizers("  hello\u{0007} world  ", &[remove_control_chars, trim_whitespace]);
        assert!(result.was_modified);
        assert_eq!(result.sanitized, "hello world");
        let details = result.details.unwrap();
        assert!(details.contains("control characters"));
        assert!(details.contains("whitespace"));

        let clean = chain_sanitizers("clean text", &[remove_control_chars, trim_whitespace]);
        assert!(!clean.was_modified);
        assert_eq!(clean.details, None);
    }
}
