//! Input validation utilities

use once_cell::sync::Lazy;
use regex::Regex;
use validator::ValidationError;

/// Lowercase identifier used for status codes and role names
static IDENTIFIER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z][a-z0-9_]*$").unwrap()
});

static USERNAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z][a-zA-Z0-9._-]*$").unwrap()
});

static HEX_COLOR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^#[0-9a-fA-F]{6}$").unwrap()
});

pub fn is_identifier(value: &str) -> bool {
    !value.is_empty() && value.len() <= 50 && IDENTIFIER_REGEX.is_match(value)
}

pub fn is_username(value: &str) -> bool {
    value.len() >= 3 && value.len() <= 50 && USERNAME_REGEX.is_match(value)
}

pub fn is_hex_color(value: &str) -> bool {
    HEX_COLOR_REGEX.is_match(value)
}

/// `validator` hook for identifier fields
pub fn validate_identifier(value: &str) -> Result<(), ValidationError> {
    if is_identifier(value) {
        Ok(())
    } else {
        Err(ValidationError::new("identifier")
            .with_message("must be lowercase letters, digits or underscores".into()))
    }
}

pub fn validate_username(value: &str) -> Result<(), ValidationError> {
    if is_username(value) {
        Ok(())
    } else {
        Err(ValidationError::new("username")
            .with_message("must start with a letter and contain only letters, digits, '.', '_' or '-'".into()))
    }
}

/// `validator` hook for `#RRGGBB` colors
pub fn validate_hex_color(value: &str) -> Result<(), ValidationError> {
    if is_hex_color(value) {
        Ok(())
    } else {
        Err(ValidationError::new("hex_color").with_message("must be #RRGGBB".into()))
    }
}

fn non_blank_min(value: &str, min: usize, code: &'static str) -> Result<(), ValidationError> {
    if value.trim().chars().count() >= min {
        Ok(())
    } else {
        Err(ValidationError::new(code)
            .with_message(format!("must have at least {} non-blank characters", min).into()))
    }
}

/// Report titles are stored trimmed, so the minimum applies to the trimmed text
pub fn validate_title(value: &str) -> Result<(), ValidationError> {
    non_blank_min(value, 3, "title")
}

pub fn validate_description(value: &str) -> Result<(), ValidationError> {
    non_blank_min(value, 1, "description")
}

/// Password policy check, returns the reason on failure
pub fn check_password(password: &str, min_length: usize) -> Result<(), String> {
    if password.chars().count() < min_length {
        return Err(format!(
            "Password must be at least {} characters",
            min_length
        ));
    }
    if password.trim().is_empty() {
        return Err("Password cannot be blank".to_string());
    }
    Ok(())
}
