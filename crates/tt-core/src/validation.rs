//! Input validators for names and descriptions.
//!
//! Lengths are measured on the untrimmed input; emptiness on the trimmed one.

use crate::types::ValidationError;

/// Maximum length of a client, project or task name.
pub const MAX_NAME_LENGTH: usize = 255;

/// Maximum length of a time entry description.
pub const MAX_DESCRIPTION_LENGTH: usize = 1000;

fn validate_name<'a>(input: &'a str, field: &'static str) -> Result<&'a str, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    let actual = input.chars().count();
    if actual > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field,
            max: MAX_NAME_LENGTH,
            actual,
        });
    }
    Ok(trimmed)
}

/// Validates a client name, returning it trimmed.
pub fn validate_client_name(input: &str) -> Result<&str, ValidationError> {
    validate_name(input, "client name")
}

/// Validates a project name, returning it trimmed.
pub fn validate_project_name(input: &str) -> Result<&str, ValidationError> {
    validate_name(input, "project name")
}

/// Validates a task name, returning it trimmed.
pub fn validate_task_name(input: &str) -> Result<&str, ValidationError> {
    validate_name(input, "task name")
}

/// Validates an optional description.
///
/// Blank descriptions are valid and normalize to `None`.
pub fn validate_description(input: &str) -> Result<Option<&str>, ValidationError> {
    let actual = input.chars().count();
    if actual > MAX_DESCRIPTION_LENGTH {
        return Err(ValidationError::TooLong {
            field: "description",
            max: MAX_DESCRIPTION_LENGTH,
            actual,
        });
    }
    let trimmed = input.trim();
    Ok((!trimmed.is_empty()).then_some(trimmed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_at_limit_is_valid() {
        let name = "a".repeat(255);
        assert_eq!(validate_client_name(&name).unwrap(), name);
    }

    #[test]
    fn name_over_limit_is_invalid() {
        let name = "a".repeat(256);
        assert_eq!(
            validate_project_name(&name),
            Err(ValidationError::TooLong {
                field: "project name",
                max: 255,
                actual: 256,
            })
        );
    }

    #[test]
    fn whitespace_name_is_invalid() {
        assert_eq!(
            validate_task_name("   \t "),
            Err(ValidationError::Empty { field: "task name" })
        );
    }

    #[test]
    fn length_counts_untrimmed_input() {
        let name = format!(" {} ", "a".repeat(254));
        assert!(validate_client_name(&name).is_err());
    }

    #[test]
    fn name_is_trimmed() {
        assert_eq!(validate_client_name("  Acme  ").unwrap(), "Acme");
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        let name = "é".repeat(255);
        assert!(validate_client_name(&name).is_ok());
    }

    #[test]
    fn description_boundaries() {
        assert!(validate_description(&"d".repeat(1000)).is_ok());
        assert!(validate_description(&"d".repeat(1001)).is_err());
        assert_eq!(validate_description("").unwrap(), None);
        assert_eq!(validate_description("   ").unwrap(), None);
        assert_eq!(validate_description(" notes ").unwrap(), Some("notes"));
    }
}
