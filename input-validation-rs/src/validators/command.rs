//! Command request validation
//!
//! Wire constraints for commands accepted by the gateway. The model enum is
//! enforced when the request is deserialized.

use lazy_static::lazy_static;
use regex::Regex;
use shared_types::CommandRequest;

use super::{all_of, between, matches_pattern, max_chars, max_items, not_blank};
use crate::errors::ValidationResult;

/// Maximum command text length in characters
pub const MAX_COMMAND_CHARS: usize = 32_000;
/// Maximum number of attached files
pub const MAX_FILE_IDS: usize = 10;
/// Maximum tokens a command may request
pub const MAX_TOKENS: u32 = 16_384;
pub const MIN_TEMPERATURE: f32 = 0.0;
pub const MAX_TEMPERATURE: f32 = 2.0;
/// Maximum system prompt length in characters
pub const MAX_SYSTEM_PROMPT_CHARS: usize = 8_000;

lazy_static! {
    static ref SESSION_ID_REGEX: Regex = Regex::new(r"^sess_[A-Za-z0-9]+$").unwrap();
    static ref FILE_ID_REGEX: Regex = Regex::new(r"^[A-Za-z0-9_\-]{1,128}$").unwrap();
}

/// Validates a command request, reporting every violated constraint
pub fn validate_command_request(request: &CommandRequest) -> ValidationResult<()> {
    let mut checks = vec![
        not_blank("command", &request.command_text),
        max_chars("command", &request.command_text, MAX_COMMAND_CHARS),
        max_items("fileIds", &request.file_ids, MAX_FILE_IDS),
        between("maxTokens", request.max_tokens, 1, MAX_TOKENS),
        between("temperature", request.temperature, MIN_TEMPERATURE, MAX_TEMPERATURE),
    ];

    if let Some(session_id) = &request.session_id {
        checks.push(matches_pattern("sessionId", session_id, &SESSION_ID_REGEX));
    }
    if let Some(system_prompt) = &request.system_prompt {
        checks.push(max_chars("systemPrompt", system_prompt, MAX_SYSTEM_PROMPT_CHARS));
    }
    for file_id in &request.file_ids {
        checks.push(matches_pattern("fileIds[]", file_id, &FILE_ID_REGEX));
    }

    all_of(checks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ValidationError;

    fn request() -> CommandRequest {
        CommandRequest::new("Explain this stack trace")
    }

    #[test]
    fn test_valid_request() {
        let mut req = request().with_files(["f1", "f2"]);
        req.session_id = Some("sess_Abc123".to_string());
        assert!(validate_command_request(&req).is_ok());
    }

    #[test]
    fn test_command_length_limit() {
        let mut req = request();
        req.command_text = "a".repeat(MAX_COMMAND_CHARS);
        assert!(validate_command_request(&req).is_ok());

        req.command_text.push('a');
        assert!(matches!(validate_command_request(&req), Err(ValidationError::TooLong(_))));
    }

    #[test]
    fn test_session_id_pattern() {
        let mut req = request();
        req.session_id = Some("session-1".to_string());
        assert!(matches!(
            validate_command_request(&req),
            Err(ValidationError::PatternMismatch(_))
        ));

        req.session_id = Some("sess_".to_string());
        assert!(validate_command_request(&req).is_err());
    }

    #[test]
    fn test_file_id_limit() {
        let req = request().with_files((0..11).map(|i| format!("f{}", i)));
        assert!(matches!(validate_command_request(&req), Err(ValidationError::TooLong(_))));
    }

    #[test]
    fn test_collects_multiple_failures() {
        let mut req = request();
        req.command_text = "   ".to_string();
        req.max_tokens = 20_000;
        req.temperature = 2.5;

        match validate_command_request(&req) {
            Err(ValidationError::Composite(composite)) => assert_eq!(composite.errors.len(), 3),
            other => panic!("expected composite error, got {:?}", other),
        }
    }
}
