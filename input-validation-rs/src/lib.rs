//! # Input Validation Library
//!
//! Validation and sanitization of command requests entering the gateway.
//!
//! ## Features
//!
//! - Wire-constraint validation for command requests
//! - String cleanup (control characters, zero-width characters, Unicode NFC)
//! - Prompt-injection risk classification with a strict-mode veto

mod errors;
pub mod sanitizers;
pub mod validators;

pub use errors::{CompositeError, ValidationError, ValidationResult};
pub use sanitizers::{PromptSanitizer, RiskLevel, SanitizeResult, SanitizedPrompt};
pub use validators::validate_command_request;
