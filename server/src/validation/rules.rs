//! Common validation rules shared across request payloads.

use validator::ValidationError;

/// Validates a pause reason code.
///
/// Requirements:
/// - Only alphanumeric characters and underscores
/// - 1-50 characters in length
///
/// Codes are normalized to uppercase before they are stored, so the check is
/// case-insensitive.
pub fn validate_reason_code(code: &str) -> Result<(), ValidationError> {
    if code.is_empty() || code.len() > 50 {
        return Err(ValidationError::new("reason_code_invalid_length"));
    }

    if !code.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(ValidationError::new("reason_code_invalid_characters"));
    }

    Ok(())
}

/// Validates an agent extension.
///
/// Requirements:
/// - Only alphanumeric characters
/// - 1-20 characters in length
pub fn validate_extension(extension: &str) -> Result<(), ValidationError> {
    if extension.is_empty() || extension.len() > 20 {
        return Err(ValidationError::new("extension_invalid_length"));
    }

    if !extension.chars().all(char::is_alphanumeric) {
        return Err(ValidationError::new("extension_invalid_characters"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_code_rejects_empty() {
        let result = validate_reason_code("");
        assert!(result.is_err());
    }

    #[test]
    fn reason_code_rejects_special_characters() {
        let result = validate_reason_code("BREAK TIME");
        assert!(result.is_err());
        let result = validate_reason_code("BREAK-2");
        assert!(result.is_err());
    }

    #[test]
    fn reason_code_accepts_underscores_and_mixed_case() {
        assert!(validate_reason_code("BREAK_2").is_ok());
        assert!(validate_reason_code("lunch").is_ok());
    }

    #[test]
    fn extension_rejects_over_length() {
        let long = "1".repeat(21);
        assert!(validate_extension(&long).is_err());
    }

    #[test]
    fn extension_accepts_typical_pbx_values() {
        assert!(validate_extension("1001").is_ok());
        assert!(validate_extension("agent42").is_ok());
    }

    #[test]
    fn extension_rejects_interface_syntax() {
        assert!(validate_extension("PJSIP/1001").is_err());
    }
}
