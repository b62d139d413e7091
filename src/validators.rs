/// Input validators for account fields
/// Features:
/// 1. DoS Protection: Input length limits
/// 2. Normalisation: trimmed, lowercased lookup keys
/// 3. Phishing Protection: Email validation

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ValidationError;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MIN_EMAIL_LENGTH: usize = 5;
const MIN_USERNAME_LENGTH: usize = 3;
const MAX_USERNAME_LENGTH: usize = 32;
const MAX_NAME_LENGTH: usize = 256;
const MAX_PASSWORD_LENGTH: usize = 72; // bcrypt input limit

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).unwrap();

    static ref USERNAME_REGEX: Regex = Regex::new(r"^[a-z0-9._-]+$").unwrap();
}

/// Validates and normalises an email address (trimmed, lowercased)
pub fn parse_email(email: &str) -> Result<String, ValidationError> {
    let normalised = email.trim().to_lowercase();

    if normalised.is_empty() {
        return Err(ValidationError::EmptyField("email"));
    }
    if normalised.len() < MIN_EMAIL_LENGTH {
        return Err(ValidationError::TooShort("email", MIN_EMAIL_LENGTH));
    }
    if normalised.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email", MAX_EMAIL_LENGTH));
    }
    if !EMAIL_REGEX.is_match(&normalised) {
        return Err(ValidationError::InvalidFormat("email"));
    }
    if has_suspicious_email_patterns(&normalised) {
        return Err(ValidationError::SuspiciousContent("email"));
    }

    Ok(normalised)
}

/// Validates and normalises a username (trimmed, lowercased)
pub fn parse_username(username: &str) -> Result<String, ValidationError> {
    let normalised = username.trim().to_lowercase();

    if normalised.is_empty() {
        return Err(ValidationError::EmptyField("username"));
    }
    if normalised.len() < MIN_USERNAME_LENGTH {
        return Err(ValidationError::TooShort("username", MIN_USERNAME_LENGTH));
    }
    if normalised.len() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::TooLong("username", MAX_USERNAME_LENGTH));
    }
    // `@` would make the name indistinguishable from an email at login
    if !USERNAME_REGEX.is_match(&normalised) {
        return Err(ValidationError::InvalidFormat("username"));
    }

    Ok(normalised)
}

/// Validates a display name (trimmed, case preserved)
pub fn parse_full_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("fullName"));
    }
    if trimmed.len() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong("fullName", MAX_NAME_LENGTH));
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(ValidationError::SuspiciousContent("fullName"));
    }

    Ok(trimmed.to_string())
}

/// Checks a new password is present and within bcrypt's input limit
pub fn check_password(password: &str) -> Result<(), ValidationError> {
    if password.trim().is_empty() {
        return Err(ValidationError::EmptyField("password"));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong("password", MAX_PASSWORD_LENGTH));
    }
    Ok(())
}

/// Detects suspicious patterns in email addresses that might indicate phishing
fn has_suspicious_email_patterns(email: &str) -> bool {
    if let Some(at_pos) = email.find('@') {
        if email[..at_pos].len() > 64 {
            return true;
        }
    }
    email.matches('@').count() != 1 || email.contains('\0')
}
