use bigdecimal::{BigDecimal, Zero};
use std::fmt;

pub const ID_MAX_LEN: usize = 128;
pub const NOTE_MAX_LEN: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| ch.is_whitespace() || !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

/// Ids of users, channels, videos and transactions: non-empty, bounded, no
/// whitespace or control characters.
pub fn validate_id(field: &'static str, value: &str) -> ValidationResult {
    validate_required(field, value)?;
    validate_max_len(field, value, ID_MAX_LEN)?;

    if value.chars().any(|ch| ch.is_whitespace() || ch.is_control()) {
        return Err(ValidationError::new(
            field,
            "must not contain whitespace or control characters",
        ));
    }

    Ok(())
}

/// Zero is a legal no-op amount; only negatives are rejected.
pub fn validate_non_negative_amount(amount: &BigDecimal) -> ValidationResult {
    if amount < &BigDecimal::zero() {
        return Err(ValidationError::new("amount", "must not be negative"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn validates_required_field() {
        assert!(validate_required("field", "value").is_ok());
        assert!(validate_required("field", "   ").is_err());
    }

    #[test]
    fn validates_max_len() {
        assert!(validate_max_len("field", "abc", 3).is_ok());
        assert!(validate_max_len("field", "abcd", 3).is_err());
    }

    #[test]
    fn sanitizes_string() {
        assert_eq!(sanitize_string("  hello\tworld  "), "hello world");
        assert_eq!(sanitize_string("single"), "single");
        assert_eq!(sanitize_string(" \n "), "");
        assert_eq!(sanitize_string("ab\u{0000}cd\u{0007}"), "abcd");
        assert_eq!(sanitize_string("lost\nduring\r\noutage"), "lost during outage");
    }

    #[test]
    fn validates_ids() {
        assert!(validate_id("actor_id", "user-42").is_ok());
        assert!(validate_id("actor_id", "").is_err());
        assert!(validate_id("actor_id", "user 42").is_err());
        assert!(validate_id("actor_id", &"x".repeat(ID_MAX_LEN + 1)).is_err());
    }

    #[test]
    fn validates_non_negative_amount() {
        let positive = BigDecimal::from_str("1.23").expect("valid decimal");
        let zero = BigDecimal::from(0);
        let negative = BigDecimal::from_str("-0.01").expect("valid decimal");

        assert!(validate_non_negative_amount(&positive).is_ok());
        assert!(validate_non_negative_amount(&zero).is_ok());
        assert!(validate_non_negative_amount(&negative).is_err());
    }
}
