//! Validation helpers for DTOs.

use validator::ValidationError;

/// Validates that a username only uses lowercase ASCII letters, digits and underscores.
///
/// # Examples
///
/// ```ignore
/// validate_username("quiz_master42") // Ok
/// validate_username("QuizMaster")    // Err - uppercase
/// validate_username("quiz master")   // Err - space
/// ```
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if !username
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        let mut err = ValidationError::new("username_format");
        err.message = Some(
            "Username must contain only lowercase letters, digits and underscores".into(),
        );
        return Err(err);
    }

    Ok(())
}

/// Rejects strings made only of whitespace.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        return Err(err);
    }
    Ok(())
}

/// Rejects answer lists containing a blank choice.
pub fn validate_choices(choices: &[String]) -> Result<(), ValidationError> {
    if let Some(position) = choices.iter().position(|choice| choice.trim().is_empty()) {
        let mut err = ValidationError::new("blank_choice");
        err.message = Some(format!("Choice {position} must not be blank").into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_username_valid() {
        assert!(validate_username("quiz_master42").is_ok());
        assert!(validate_username("abc").is_ok());
    }

    #[test]
    fn test_validate_username_invalid_format() {
        assert!(validate_username("QuizMaster").is_err()); // uppercase
        assert!(validate_username("quiz master").is_err()); // space
        assert!(validate_username("quiz-master").is_err()); // dash
        assert!(validate_username("élodie").is_err()); // non ascii
    }

    #[test]
    fn test_validate_not_blank() {
        assert!(validate_not_blank("Owls").is_ok());
        assert!(validate_not_blank("   ").is_err());
        assert!(validate_not_blank("").is_err());
    }

    #[test]
    fn test_validate_choices() {
        assert!(validate_choices(&["Paris".into(), "Lyon".into()]).is_ok());
        assert!(validate_choices(&["Paris".into(), " ".into()]).is_err());
    }
}
