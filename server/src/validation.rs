//! Boundary validation. Every externally reachable operation runs these
//! checks before touching the synthesis API, the converter, or the database.

use serde_json::json;

use crate::error::ApiError;
use tts_core::{Voice, DEFAULT_SPEED, MAX_SPEED, MIN_SPEED};

/// Maximum text length the synthesis API accepts.
pub const MAX_TEXT_LENGTH: usize = 4096;
pub const MAX_FILE_NAME_LENGTH: usize = 255;
pub const MAX_INSTRUCTIONS_LENGTH: usize = 1000;

/// Validate prompt text; returns the trimmed text.
pub fn validate_text(text: &str) -> Result<String, ApiError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation("Text cannot be empty"));
    }
    if trimmed.chars().count() > MAX_TEXT_LENGTH {
        return Err(ApiError::validation_with_details(
            format!("Text exceeds maximum length of {MAX_TEXT_LENGTH} characters"),
            json!({ "length": trimmed.chars().count(), "maxLength": MAX_TEXT_LENGTH }),
        ));
    }
    Ok(trimmed.to_string())
}

/// Validate the voice parameter against the fixed set.
pub fn validate_voice(voice: &str) -> Result<Voice, ApiError> {
    voice.parse::<Voice>().map_err(|_| {
        ApiError::validation_with_details(
            format!("Invalid voice. Must be one of: {}", Voice::valid_names()),
            json!({ "providedVoice": voice }),
        )
    })
}

/// Validate the speed parameter; `None` falls back to the default.
pub fn validate_speed(speed: Option<f64>) -> Result<f64, ApiError> {
    let Some(speed) = speed else {
        return Ok(DEFAULT_SPEED);
    };
    if !speed.is_finite() {
        return Err(ApiError::validation("Speed must be a number"));
    }
    if !(MIN_SPEED..=MAX_SPEED).contains(&speed) {
        return Err(ApiError::validation_with_details(
            format!("Speed must be between {MIN_SPEED} and {MAX_SPEED}"),
            json!({ "providedSpeed": speed, "minSpeed": MIN_SPEED, "maxSpeed": MAX_SPEED }),
        ));
    }
    Ok(speed)
}

/// Validate an optional client-supplied filename. Rejects path traversal
/// and control characters before any file operation happens.
pub fn validate_file_name(file_name: Option<&str>) -> Result<Option<String>, ApiError> {
    let Some(name) = file_name else {
        return Ok(None);
    };
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.len() > MAX_FILE_NAME_LENGTH {
        return Err(ApiError::validation(format!(
            "Filename is too long (max {MAX_FILE_NAME_LENGTH} characters)"
        )));
    }
    let invalid = trimmed
        .chars()
        .any(|c| matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') || c.is_control());
    if invalid || trimmed.contains("..") {
        return Err(ApiError::validation_with_details(
            "Filename contains invalid characters",
            json!({ "fileName": trimmed }),
        ));
    }
    Ok(Some(trimmed.to_string()))
}

/// Validate voice instructions for advanced mode; returns the trimmed text.
pub fn validate_instructions(instructions: &str) -> Result<String, ApiError> {
    let trimmed = instructions.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation("Instructions cannot be empty"));
    }
    if trimmed.chars().count() > MAX_INSTRUCTIONS_LENGTH {
        return Err(ApiError::validation_with_details(
            format!("Instructions are too long (max {MAX_INSTRUCTIONS_LENGTH} characters)"),
            json!({ "length": trimmed.chars().count() }),
        ));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_is_trimmed_and_bounded() {
        assert_eq!(validate_text("  hello  ").unwrap(), "hello");
        assert!(validate_text("   ").is_err());
        assert!(validate_text(&"a".repeat(4097)).is_err());
        assert!(validate_text(&"a".repeat(4096)).is_ok());
    }

    #[test]
    fn voice_must_be_in_fixed_set() {
        assert_eq!(validate_voice("alloy").unwrap().as_str(), "alloy");
        assert!(validate_voice("hal9000").is_err());
    }

    #[test]
    fn speed_defaults_and_bounds() {
        assert_eq!(validate_speed(None).unwrap(), 1.0);
        assert_eq!(validate_speed(Some(0.25)).unwrap(), 0.25);
        assert_eq!(validate_speed(Some(4.0)).unwrap(), 4.0);
        assert!(validate_speed(Some(0.2)).is_err());
        assert!(validate_speed(Some(4.5)).is_err());
        assert!(validate_speed(Some(f64::NAN)).is_err());
    }

    #[test]
    fn file_name_rejects_traversal() {
        assert!(validate_file_name(Some("../../etc/passwd")).is_err());
        assert!(validate_file_name(Some("a/b.wav")).is_err());
        assert!(validate_file_name(Some("greeting\x00.wav")).is_err());
        assert_eq!(
            validate_file_name(Some("main_menu_v1.wav")).unwrap().as_deref(),
            Some("main_menu_v1.wav")
        );
        assert_eq!(validate_file_name(None).unwrap(), None);
        assert_eq!(validate_file_name(Some("  ")).unwrap(), None);
    }

    #[test]
    fn file_name_length_cap() {
        let long = format!("{}.wav", "a".repeat(260));
        assert!(validate_file_name(Some(&long)).is_err());
    }

    #[test]
    fn instructions_are_bounded() {
        assert_eq!(validate_instructions(" speak slowly ").unwrap(), "speak slowly");
        assert!(validate_instructions("").is_err());
        assert!(validate_instructions(&"x".repeat(1001)).is_err());
    }
}
