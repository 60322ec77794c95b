use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9 ]*$").expect("valid name pattern"));

/// A user input that fails a precondition. Recovered by rejecting the action.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{0} is required.")]
    Required(String),
    #[error("The name \"{0}\" should not start with a number or contain special characters.")]
    InvalidName(String),
}

pub fn validate_required(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required(field.to_string()));
    }
    Ok(())
}

/// A name starts with a letter and contains only letters, digits and spaces.
pub fn validate_name(value: &str) -> Result<(), ValidationError> {
    validate_required("Name", value)?;
    if !NAME_PATTERN.is_match(value) {
        return Err(ValidationError::InvalidName(value.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_names() {
        assert_eq!(validate_name("Welcome Mail 2"), Ok(()));
        assert_eq!(validate_name("a"), Ok(()));
    }

    #[test]
    fn rejects_empty_names() {
        assert_eq!(
            validate_name("   "),
            Err(ValidationError::Required("Name".into()))
        );
    }

    #[test]
    fn rejects_leading_digits_and_symbols() {
        assert!(matches!(
            validate_name("2nd reminder"),
            Err(ValidationError::InvalidName(_))
        ));
        assert!(matches!(
            validate_name("Promo!"),
            Err(ValidationError::InvalidName(_))
        ));
        assert_eq!(
            validate_name("Promo!").unwrap_err().to_string(),
            "The name \"Promo!\" should not start with a number or contain special characters."
        );
    }
}
